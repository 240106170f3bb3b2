use serde::{Deserialize, Serialize};

/// Visibility tag shared by every entry readable outside its home channel.
pub const TAG_PUBLIC: &str = "agent_data:public";
/// Prefix of the per-channel visibility tag for private-channel entries.
pub const TAG_CHANNEL_PREFIX: &str = "agent_data:ch:";

/// Retrieval weight of a memory; multiplies the relevance score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn multiplier(&self) -> f64 {
        match self {
            Priority::High => 1.3,
            Priority::Medium => 1.0,
            Priority::Low => 0.7,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A stored scratch-space / memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
    /// User-facing tags; the visibility tag is appended automatically.
    pub tags: Vec<String>,
    pub channel_id: Option<String>,
    pub channel_is_private: bool,
    pub user_id: Option<String>,
    pub post_id: Option<String>,
    pub priority: Priority,
    pub created_at: String,
    pub updated_at: String,
}

impl MemoryEntry {
    /// The auto-assigned visibility tag for this entry.
    ///
    /// Private-channel entries stay scoped to their channel; everything else
    /// is readable wherever public retrieval is allowed.
    pub fn visibility_tag(&self) -> String {
        visibility_tag(self.channel_id.as_deref(), self.channel_is_private)
    }
}

/// Compute the visibility tag for a channel context.
pub fn visibility_tag(channel_id: Option<&str>, is_private: bool) -> String {
    match channel_id {
        Some(id) if is_private => format!("{TAG_CHANNEL_PREFIX}{id}"),
        _ => TAG_PUBLIC.to_string(),
    }
}

/// Tags a retrieval from `channel` may match.
///
/// Private channels see only their own entries; public channels see public
/// entries plus their own; channel-less contexts (scheduled jobs) see public
/// entries only.
pub fn retrieval_tags(channel_id: Option<&str>, is_private: bool) -> Vec<String> {
    match channel_id {
        Some(id) if is_private => vec![format!("{TAG_CHANNEL_PREFIX}{id}")],
        Some(id) => vec![
            TAG_PUBLIC.to_string(),
            format!("{TAG_CHANNEL_PREFIX}{id}"),
        ],
        None => vec![TAG_PUBLIC.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_channels_get_scoped_tags() {
        assert_eq!(visibility_tag(Some("dm-1"), true), "agent_data:ch:dm-1");
        assert_eq!(visibility_tag(Some("town"), false), "agent_data:public");
        assert_eq!(visibility_tag(None, false), "agent_data:public");
    }

    #[test]
    fn retrieval_from_private_channel_is_narrow() {
        assert_eq!(retrieval_tags(Some("dm-1"), true), vec!["agent_data:ch:dm-1"]);
        let public = retrieval_tags(Some("town"), false);
        assert!(public.contains(&"agent_data:public".to_string()));
    }

    #[test]
    fn priority_multipliers() {
        assert_eq!(Priority::High.multiplier(), 1.3);
        assert_eq!(Priority::Medium.multiplier(), 1.0);
        assert_eq!(Priority::Low.multiplier(), 0.7);
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
    }
}
