//! Result containers: immutable per-run triple dumps
//!
//! Every reconciliation run records what it inserted and removed as two
//! line-oriented triple dump files under a share directory, addressable by
//! `share://` URIs. Written once, never touched again.

use crate::error::Result;
use pubgraph_heal::HealOutcome;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One run's recorded output
#[derive(Debug, Clone)]
pub struct ResultContainer {
    pub uri: String,
    pub id: String,
    pub inserts_path: PathBuf,
    pub removals_path: PathBuf,
    pub inserts_file_uri: String,
    pub removals_file_uri: String,
    pub inserted: usize,
    pub removed: usize,
}

/// Writes result containers under a share directory
#[derive(Debug, Clone)]
pub struct ResultStore {
    share_dir: PathBuf,
}

impl ResultStore {
    pub fn new(share_dir: impl Into<PathBuf>) -> Self {
        Self {
            share_dir: share_dir.into(),
        }
    }

    /// Dump a heal outcome's additions and removals as triple statement
    /// files. Spill records become plain statement lines, one triple each.
    pub fn write(&self, outcome: &HealOutcome) -> Result<ResultContainer> {
        let id = Uuid::new_v4().to_string();
        let inserts_name = format!("{}-inserts.nt", id);
        let removals_name = format!("{}-removals.nt", id);
        let inserts_path = self.share_dir.join(&inserts_name);
        let removals_path = self.share_dir.join(&removals_name);

        dump_statements(outcome.additions_reader()?, &inserts_path)?;
        dump_statements(outcome.removals_reader()?, &removals_path)?;

        Ok(ResultContainer {
            uri: format!("http://redpencil.data.gift/id/dataContainers/{}", id),
            id,
            inserts_file_uri: format!("share://{}", inserts_name),
            removals_file_uri: format!("share://{}", removals_name),
            inserts_path,
            removals_path,
            inserted: outcome.addition_count,
            removed: outcome.removal_count,
        })
    }
}

fn dump_statements(mut reader: pubgraph_heal::SpillReader, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    while let Some(triple) = reader.next_triple()? {
        writeln!(writer, "{}", triple)?;
    }
    writer.flush()?;
    Ok(())
}
