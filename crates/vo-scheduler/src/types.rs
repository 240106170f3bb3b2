use serde::{Deserialize, Serialize};

/// Prefix of every scheduler-owned event type name.
pub const TEMPUS_JOB_PREFIX: &str = "tempus_job:";

/// The synthetic event type a job fires: `tempus_job:<job name>`.
pub fn job_event_type_name(job_name: &str) -> String {
    format!("{TEMPUS_JOB_PREFIX}{job_name}")
}

/// A persisted cron job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Unique job name; also the suffix of its event type.
    pub name: String,
    /// Five-field cron expression.
    pub cron: String,
    /// Handler prompt evaluated when the job fires.
    pub prompt: String,
    /// Channel the handler streams to.
    pub channel_id: String,
    /// IANA timezone the expression is evaluated in. UTC when absent.
    pub timezone: Option<String>,
    pub created_at: String,
    /// ISO-8601 instant of the most recent fire, if any.
    pub last_fire: Option<String>,
    /// ISO-8601 instant of the next planned fire, if any.
    pub next_fire: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_name_carries_the_prefix() {
        assert_eq!(job_event_type_name("daily"), "tempus_job:daily");
    }
}
