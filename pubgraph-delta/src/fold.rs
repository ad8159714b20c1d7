//! Folding a changeset to its net effect against live store state
//!
//! An insert of a triple the publication graph already holds is a no-op, as
//! is a delete of a triple it does not hold. Both are dropped here. The
//! decision is made by store-side ASK, never by comparing lexical forms:
//! upstream change feeds do not guarantee canonical literals (fractional
//! second precision varies, for one), while the store treats such variants
//! as logically equal.

use crate::error::Result;
use pubgraph_core::triple::Triple;
use pubgraph_core::ChangeSet;
use pubgraph_store::sparql::{render_triple, render_uri};
use pubgraph_store::{RequestOptions, SparqlGateway};
use std::collections::HashSet;
use std::sync::Arc;

/// Collapses a changeset against current publication-graph state
#[derive(Debug, Clone)]
pub struct ChangeFolder {
    gateway: Arc<dyn SparqlGateway>,
}

impl ChangeFolder {
    pub fn new(gateway: Arc<dyn SparqlGateway>) -> Self {
        Self { gateway }
    }

    /// Net effective change: inserts that are new, deletes that exist.
    ///
    /// A triple appearing on both sides cancels out before any store check;
    /// inserting and deleting the same lexical triple is no change at all.
    /// Folding is idempotent: applying the result and folding it again
    /// yields an empty changeset.
    pub async fn fold(
        &self,
        changeset: &ChangeSet,
        publication_graph: &str,
        opts: &RequestOptions,
    ) -> Result<ChangeSet> {
        let insert_keys: HashSet<String> =
            changeset.inserts.iter().map(Triple::lexical_key).collect();
        let delete_keys: HashSet<String> =
            changeset.deletes.iter().map(Triple::lexical_key).collect();

        let mut folded = ChangeSet::default();
        for triple in &changeset.inserts {
            if delete_keys.contains(&triple.lexical_key()) {
                continue;
            }
            if !self.exists(triple, publication_graph, opts).await? {
                folded.inserts.push(triple.clone());
            }
        }
        for triple in &changeset.deletes {
            if insert_keys.contains(&triple.lexical_key()) {
                continue;
            }
            if self.exists(triple, publication_graph, opts).await? {
                folded.deletes.push(triple.clone());
            }
        }
        folded.dedup();
        tracing::debug!(
            inserts_in = changeset.inserts.len(),
            deletes_in = changeset.deletes.len(),
            inserts_out = folded.inserts.len(),
            deletes_out = folded.deletes.len(),
            "changeset folded"
        );
        Ok(folded)
    }

    async fn exists(
        &self,
        triple: &Triple,
        graph: &str,
        opts: &RequestOptions,
    ) -> Result<bool> {
        let query = format!(
            "ASK {{ GRAPH {} {{ {} }} }}",
            render_uri(graph),
            render_triple(triple)
        );
        Ok(self.gateway.ask(&query, opts).await?)
    }
}
