//! Error types for the service layer

use thiserror::Error;

/// Errors from job handling and stream processing
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store access failed
    #[error("store error: {0}")]
    Store(#[from] pubgraph_store::StoreError),

    /// Incremental processing failed
    #[error("delta error: {0}")]
    Delta(#[from] pubgraph_delta::DeltaError),

    /// Reconciliation failed
    #[error("heal error: {0}")]
    Heal(#[from] pubgraph_heal::HealError),

    /// Result container I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream worker is gone and its queue closed
    #[error("stream queue closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
