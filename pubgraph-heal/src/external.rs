//! External-memory diff provider for large exports
//!
//! In-memory diffing of multi-hundred-thousand-triple exports exhausts the
//! process, so this provider never holds a dump in memory. Both sides are
//! externally sorted by lexical key under a bounded chunk size, then walked
//! in lockstep: records present on one side only stream straight into the
//! accumulators, the way `comm -3` reports lines unique to each file.

use crate::error::Result;
use crate::provider::{DiffProvider, DiffStats};
use crate::spill::{external_sort, SpillReader, SpillWriter};
use async_trait::async_trait;
use pubgraph_core::triple::Triple;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Spill/sort/merge diff with bounded peak memory
#[derive(Debug, Clone)]
pub struct ExternalDiff {
    temp_dir: PathBuf,
    sort_chunk: usize,
}

impl ExternalDiff {
    /// `temp_dir` receives the sorted copies and run files; `sort_chunk` is
    /// the maximum number of records held in memory while sorting.
    pub fn new(temp_dir: impl Into<PathBuf>, sort_chunk: usize) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            sort_chunk: sort_chunk.max(1),
        }
    }
}

/// Cursor that skips duplicate keys within one sorted file
struct SortedCursor {
    reader: SpillReader,
    current: Option<(String, Triple)>,
}

impl SortedCursor {
    fn open(path: &Path) -> Result<Self> {
        let mut cursor = Self {
            reader: SpillReader::open(path)?,
            current: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    fn advance(&mut self) -> Result<()> {
        let previous = self.current.take().map(|(key, _)| key);
        loop {
            match self.reader.next_triple()? {
                None => {
                    self.current = None;
                    return Ok(());
                }
                Some(triple) => {
                    let key = triple.lexical_key();
                    if previous.as_deref() == Some(key.as_str()) {
                        continue;
                    }
                    self.current = Some((key, triple));
                    return Ok(());
                }
            }
        }
    }
}

#[async_trait]
impl DiffProvider for ExternalDiff {
    async fn diff(
        &self,
        source: &Path,
        published: &Path,
        additions_out: &mut SpillWriter,
        removals_out: &mut SpillWriter,
    ) -> Result<DiffStats> {
        let sorted_source = self.temp_dir.join("source.sorted.jsonl");
        let sorted_published = self.temp_dir.join("published.sorted.jsonl");
        external_sort(source, &sorted_source, &self.temp_dir, self.sort_chunk)?;
        external_sort(published, &sorted_published, &self.temp_dir, self.sort_chunk)?;

        let mut left = SortedCursor::open(&sorted_source)?;
        let mut right = SortedCursor::open(&sorted_published)?;
        let mut stats = DiffStats::default();

        enum Step {
            Done,
            EmitLeft,
            EmitRight,
            Matched,
        }

        loop {
            let step = match (&left.current, &right.current) {
                (None, None) => Step::Done,
                (Some(_), None) => Step::EmitLeft,
                (None, Some(_)) => Step::EmitRight,
                (Some((lk, _)), Some((rk, _))) => match lk.cmp(rk) {
                    Ordering::Equal => Step::Matched,
                    Ordering::Less => Step::EmitLeft,
                    Ordering::Greater => Step::EmitRight,
                },
            };
            match step {
                Step::Done => break,
                Step::Matched => {
                    left.advance()?;
                    right.advance()?;
                }
                Step::EmitLeft => {
                    if let Some((_, triple)) = &left.current {
                        additions_out.append(triple)?;
                        stats.additions += 1;
                    }
                    left.advance()?;
                }
                Step::EmitRight => {
                    if let Some((_, triple)) = &right.current {
                        removals_out.append(triple)?;
                        stats.removals += 1;
                    }
                    right.advance()?;
                }
            }
        }

        let _ = std::fs::remove_file(sorted_source);
        let _ = std::fs::remove_file(sorted_published);
        Ok(stats)
    }
}
