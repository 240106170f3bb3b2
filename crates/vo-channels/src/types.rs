use serde::{Deserialize, Serialize};

/// Registry-row snapshot of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub type_name: String,
    pub is_group: bool,
    pub is_private: bool,
}

/// Identity of a channel participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUser {
    pub id: String,
    pub name: String,
}
