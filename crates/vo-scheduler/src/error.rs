use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("job not found: {name}")]
    JobNotFound { name: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("registry error: {0}")]
    Registry(#[from] vo_registry::RegistryError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
