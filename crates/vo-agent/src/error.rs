use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("session error: {0}")]
    Session(#[from] vo_sessions::SessionError),

    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("channel delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
