//! Error types for incremental processing

use thiserror::Error;

/// Errors from cascade resolution and folding
#[derive(Debug, Error)]
pub enum DeltaError {
    /// Store access failed
    #[error("store error: {0}")]
    Store(#[from] pubgraph_store::StoreError),
}

pub type Result<T> = std::result::Result<T, DeltaError>;
