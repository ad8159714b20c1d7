//! Error types for store operations

use thiserror::Error;

/// Errors from store access
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or HTTP error talking to the store endpoint
    #[error("store communication error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the endpoint
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Malformed SPARQL results document
    #[error("unexpected results document: {0}")]
    Results(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while sinking paged results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Retries exhausted on a transient failure
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
