//! Reconciliation ("healing") of the publication graph
//!
//! Recomputes, per exported property, what the publication graph should
//! contain from source truth and what it currently contains, and applies the
//! set difference. Used to bootstrap a new consumer (initial sync) and to
//! correct drift (healing).
//!
//! Two interchangeable diff strategies exist behind [`DiffProvider`]:
//! in-memory key-set filtering for ordinary volumes, and an external-memory
//! spill/sort/merge pipeline for exports large enough that in-memory diffing
//! would exhaust the process. Accumulation across properties is a file
//! append, never array concatenation, so the memory bound holds end to end.
//!
//! Unlike incremental folding, reconciliation compares exact lexical triple
//! forms; the dumps it diffs both come from the same store and are already
//! canonical.

pub mod engine;
pub mod error;
pub mod external;
pub mod memory;
pub mod provider;
pub mod spill;

pub use engine::{HealConfig, HealEngine, HealOutcome, HealStats};
pub use error::{HealError, Result};
pub use external::ExternalDiff;
pub use memory::InMemoryDiff;
pub use provider::{DiffProvider, DiffStats};
pub use spill::{SpillReader, SpillWriter};
