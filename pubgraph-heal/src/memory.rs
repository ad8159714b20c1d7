//! In-memory diff provider, the default for ordinary volumes

use crate::error::Result;
use crate::provider::{DiffProvider, DiffStats};
use crate::spill::{SpillReader, SpillWriter};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

/// Key-set diff: both sides fully loaded, each filtered against the other's
/// lexical keys. Linear time and linear memory in the dump sizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryDiff;

#[async_trait]
impl DiffProvider for InMemoryDiff {
    async fn diff(
        &self,
        source: &Path,
        published: &Path,
        additions_out: &mut SpillWriter,
        removals_out: &mut SpillWriter,
    ) -> Result<DiffStats> {
        let source_triples = SpillReader::open(source)?.read_all()?;
        let published_triples = SpillReader::open(published)?.read_all()?;

        let source_keys: HashSet<String> =
            source_triples.iter().map(|t| t.lexical_key()).collect();
        let published_keys: HashSet<String> =
            published_triples.iter().map(|t| t.lexical_key()).collect();

        let mut stats = DiffStats::default();
        let mut emitted: HashSet<String> = HashSet::new();
        for triple in &source_triples {
            let key = triple.lexical_key();
            if !published_keys.contains(&key) && emitted.insert(key) {
                additions_out.append(triple)?;
                stats.additions += 1;
            }
        }
        emitted.clear();
        for triple in &published_triples {
            let key = triple.lexical_key();
            if !source_keys.contains(&key) && emitted.insert(key) {
                removals_out.append(triple)?;
                stats.removals += 1;
            }
        }
        Ok(stats)
    }
}
