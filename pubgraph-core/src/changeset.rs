//! Insert/delete batches from the change feed
//!
//! A delta payload is an ordered sequence of changesets; ordering across the
//! sequence is meaningful and each changeset is processed in submission
//! order.

use crate::triple::Triple;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One atomic source change: a batch of inserted and deleted triples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub inserts: Vec<Triple>,
    #[serde(default)]
    pub deletes: Vec<Triple>,
}

/// An ordered delta payload as delivered by the change feed
pub type DeltaPayload = Vec<ChangeSet>;

impl ChangeSet {
    pub fn new(inserts: Vec<Triple>, deletes: Vec<Triple>) -> Self {
        Self { inserts, deletes }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// Fold another changeset's triples into this one
    pub fn extend(&mut self, other: ChangeSet) {
        self.inserts.extend(other.inserts);
        self.deletes.extend(other.deletes);
    }

    /// All URIs mentioned as a subject or as a URI-valued object.
    ///
    /// These are the type-resolution candidates for a changeset: any of them
    /// may be a resource whose publication membership is affected.
    pub fn mentioned_uris(&self) -> HashSet<String> {
        let mut uris = HashSet::new();
        for triple in self.inserts.iter().chain(self.deletes.iter()) {
            uris.insert(triple.subject.clone());
            if let Some(obj) = triple.object_uri() {
                uris.insert(obj.to_string());
            }
        }
        uris
    }

    /// Deduplicate by lexical key, preserving first-seen order
    pub fn dedup(&mut self) {
        fn dedup_side(triples: &mut Vec<Triple>) {
            let mut seen = HashSet::new();
            triples.retain(|t| seen.insert(t.lexical_key()));
        }
        dedup_side(&mut self.inserts);
        dedup_side(&mut self.deletes);
    }
}
