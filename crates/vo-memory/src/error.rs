use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("entry not found: {key}")]
    NotFound { key: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search error: {0}")]
    Search(#[from] vo_search::SearchError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
