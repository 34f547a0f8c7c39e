//! Error types for the live query server.

use thiserror::Error;

/// Boxed error produced by a user-supplied query or action callable.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Query already registered: {0}")]
    QueryExists(String),

    #[error("Action already registered: {0}")]
    ActionExists(String),

    #[error("Query '{name}' failed: {source}")]
    QueryFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Action '{name}' failed: {source}")]
    ActionFailed {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
