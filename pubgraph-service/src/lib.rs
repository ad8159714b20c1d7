//! Job handling and the single-writer gate for publication-graph streams
//!
//! All mutation of one publication graph funnels through one consuming
//! worker fed by a bounded channel; its at-most-one-active-job invariant is
//! the only lock the engine needs. Reconciliation jobs and tasks live in the
//! store (created by an external scheduler, consumed and transitioned here),
//! and every healing or initial-sync run leaves an immutable result
//! container behind for audit.
//!
//! - [`job`]: job/task records, status transitions, durable error records
//! - [`result`]: result-container triple dumps
//! - [`gate`]: the per-stream worker and its admission states
//! - [`sink`]: handoff of folded changes to the external packaging
//!   collaborator

pub mod error;
pub mod gate;
pub mod job;
pub mod result;
pub mod sink;

pub use error::{Result, ServiceError};
pub use gate::{Command, GateState, StreamConfig, StreamHandle, StreamWorker};
pub use job::{JobKind, JobStatus, JobStore, ScheduledJob};
pub use result::{ResultContainer, ResultStore};
pub use sink::{DeltaSink, NoopDeltaSink};
