//! Error types for reconciliation

use thiserror::Error;

/// Errors from reconciliation runs
#[derive(Debug, Error)]
pub enum HealError {
    /// Store access failed
    #[error("store error: {0}")]
    Store(#[from] pubgraph_store::StoreError),

    /// Spill file I/O failed
    #[error("spill I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A spill file line did not decode as a triple
    #[error("corrupt spill record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HealError>;
