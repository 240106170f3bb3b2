use thiserror::Error;

/// Errors from session log operations.
///
/// A log-read failure is fatal to the turn that needed it, never to the
/// process; index failures are absorbed by the store (the SQLite log is
/// authoritative) and do not appear here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
