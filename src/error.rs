//! Error types for the collaboration engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CollaborationError>;

#[derive(Error, Debug)]
pub enum CollaborationError {

    // =============================
    // Pipeline Errors
    // =============================

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Data provider error: {0}")]
    DataProvider(String),

    #[error("Profile aggregation error: {0}")]
    Aggregation(String),

    #[error("Text generation error: {0}")]
    Generation(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Iteration cap reached at {0}")]
    IterationCapReached(u32),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for CollaborationError {
    fn from(e: sqlx::Error) -> Self {
        CollaborationError::Database(e.to_string())
    }
}
