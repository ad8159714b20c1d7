//! The pluggable diff provider seam

use crate::error::Result;
use crate::spill::SpillWriter;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// Counts from one diff computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: usize,
    pub removals: usize,
}

impl DiffStats {
    pub fn merge(&mut self, other: DiffStats) {
        self.additions += other.additions;
        self.removals += other.removals;
    }
}

/// Computes the symmetric difference of two triple dumps.
///
/// `source` and `published` are spill files of the same property's triples
/// from source truth and from the publication graph. Additions (source-only
/// records) and removals (published-only records) are appended to the given
/// accumulators, so one provider call per property folds into a single
/// run-wide pair of output files.
#[async_trait]
pub trait DiffProvider: Debug + Send + Sync {
    async fn diff(
        &self,
        source: &Path,
        published: &Path,
        additions_out: &mut SpillWriter,
        removals_out: &mut SpillWriter,
    ) -> Result<DiffStats>;
}
