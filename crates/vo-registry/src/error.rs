use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("event type not found: {name}")]
    EventTypeNotFound { name: String },

    #[error("channel not found: {id}")]
    ChannelNotFound { id: String },

    #[error("handler not found: {id}")]
    HandlerNotFound { id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
