use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("event queue is closed")]
    QueueClosed,

    #[error("event source error: {0}")]
    Source(String),

    #[error("registry error: {0}")]
    Registry(#[from] vo_registry::RegistryError),
}

pub type Result<T> = std::result::Result<T, RouterError>;
