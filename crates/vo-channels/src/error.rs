use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel send failed: {0}")]
    Send(String),

    #[error("channel is closed: {id}")]
    Closed { id: String },

    #[error("streaming not started on channel {id}")]
    StreamNotStarted { id: String },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
