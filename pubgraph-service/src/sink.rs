//! Handoff of folded changes to the packaging collaborator
//!
//! The engine's net publication-graph changes also feed an external
//! packaging/cataloging step. Its format is not defined here; the sink just
//! receives each folded batch tagged with the graph it applies to.

use crate::error::Result;
use async_trait::async_trait;
use pubgraph_core::ChangeSet;
use std::fmt::Debug;

/// Receives every applied net change for external packaging
#[async_trait]
pub trait DeltaSink: Debug + Send + Sync {
    async fn publish(&self, publication_graph: &str, folded: &ChangeSet) -> Result<()>;
}

/// Discards everything; the default when no packaging collaborator is wired
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDeltaSink;

#[async_trait]
impl DeltaSink for NoopDeltaSink {
    async fn publish(&self, _publication_graph: &str, _folded: &ChangeSet) -> Result<()> {
        Ok(())
    }
}
