//! Line-oriented triple spill files and external sorting
//!
//! A spill file holds one JSON-encoded triple per line. Sorting happens in
//! bounded memory: the input is cut into runs of at most `chunk` records,
//! each run is sorted by canonical lexical key and written out, and the runs
//! are merged through a min-heap holding one record per run.

use crate::error::Result;
use pubgraph_core::triple::Triple;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only writer for a triple spill file
#[derive(Debug)]
pub struct SpillWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    count: usize,
}

impl SpillWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            count: 0,
        })
    }

    pub fn append(&mut self, triple: &Triple) -> Result<()> {
        serde_json::to_writer(&mut self.writer, triple)?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    pub fn append_all<'a>(&mut self, triples: impl IntoIterator<Item = &'a Triple>) -> Result<()> {
        for triple in triples {
            self.append(triple)?;
        }
        Ok(())
    }

    /// Records written so far
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close, returning the path and final record count.
    pub fn finish(mut self) -> Result<(PathBuf, usize)> {
        self.writer.flush()?;
        Ok((self.path, self.count))
    }
}

/// Sequential reader over a triple spill file
#[derive(Debug)]
pub struct SpillReader {
    lines: std::io::Lines<BufReader<File>>,
}

impl SpillReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }

    /// Next record, `None` at end of file.
    pub fn next_triple(&mut self) -> Result<Option<Triple>> {
        match self.lines.next() {
            None => Ok(None),
            Some(line) => {
                let line = line?;
                Ok(Some(serde_json::from_str(&line)?))
            }
        }
    }

    /// Up to `n` records; fewer (possibly zero) at end of file.
    pub fn read_batch(&mut self, n: usize) -> Result<Vec<Triple>> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match self.next_triple()? {
                Some(triple) => batch.push(triple),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Drain the rest of the file into memory. Only for bounded inputs.
    pub fn read_all(&mut self) -> Result<Vec<Triple>> {
        let mut all = Vec::new();
        while let Some(triple) = self.next_triple()? {
            all.push(triple);
        }
        Ok(all)
    }
}

/// Sort `input` into `output` by canonical lexical key, holding at most
/// `chunk` records in memory at a time. Run files land in `temp_dir`.
pub fn external_sort(input: &Path, output: &Path, temp_dir: &Path, chunk: usize) -> Result<()> {
    let chunk = chunk.max(1);
    let runs = write_sorted_runs(input, temp_dir, chunk)?;
    merge_runs(&runs, output)?;
    for run in runs {
        // Spill space is reclaimed eagerly; the workspace dir cleanup is
        // only a backstop.
        let _ = std::fs::remove_file(run);
    }
    Ok(())
}

fn write_sorted_runs(input: &Path, temp_dir: &Path, chunk: usize) -> Result<Vec<PathBuf>> {
    let mut reader = SpillReader::open(input)?;
    let mut runs = Vec::new();
    loop {
        let mut batch = reader.read_batch(chunk)?;
        if batch.is_empty() {
            break;
        }
        batch.sort_by(|a, b| a.lexical_key().cmp(&b.lexical_key()));
        let run_path = temp_dir.join(format!("run-{:04}.jsonl", runs.len()));
        let mut writer = SpillWriter::create(&run_path)?;
        writer.append_all(&batch)?;
        writer.finish()?;
        runs.push(run_path);
    }
    Ok(runs)
}

struct HeapEntry {
    key: String,
    triple: Triple,
    run: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run == other.run
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, the merge wants the smallest
        // key first
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.run.cmp(&self.run))
    }
}

fn merge_runs(runs: &[PathBuf], output: &Path) -> Result<()> {
    let mut writer = SpillWriter::create(output)?;
    let mut readers: Vec<SpillReader> = Vec::with_capacity(runs.len());
    for run in runs {
        readers.push(SpillReader::open(run)?);
    }

    let mut heap = BinaryHeap::new();
    for (run, reader) in readers.iter_mut().enumerate() {
        if let Some(triple) = reader.next_triple()? {
            heap.push(HeapEntry {
                key: triple.lexical_key(),
                triple,
                run,
            });
        }
    }
    while let Some(entry) = heap.pop() {
        writer.append(&entry.triple)?;
        if let Some(next) = readers[entry.run].next_triple()? {
            heap.push(HeapEntry {
                key: next.lexical_key(),
                triple: next,
                run: entry.run,
            });
        }
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::triple::Term;
    use tempfile::tempdir;

    fn t(n: usize) -> Triple {
        Triple::new(
            format!("http://ex.org/s{:04}", n),
            "http://ex.org/p",
            Term::literal(format!("v{}", n)),
        )
    }

    #[test]
    fn test_writer_reader_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.jsonl");

        let mut writer = SpillWriter::create(&path).unwrap();
        writer.append_all(&[t(1), t(2), t(3)]).unwrap();
        let (path, count) = writer.finish().unwrap();
        assert_eq!(count, 3);

        let mut reader = SpillReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), vec![t(1), t(2), t(3)]);
    }

    #[test]
    fn test_read_batch_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.jsonl");
        let mut writer = SpillWriter::create(&path).unwrap();
        writer.append_all(&[t(1), t(2), t(3), t(4), t(5)]).unwrap();
        writer.finish().unwrap();

        let mut reader = SpillReader::open(&path).unwrap();
        assert_eq!(reader.read_batch(2).unwrap().len(), 2);
        assert_eq!(reader.read_batch(2).unwrap().len(), 2);
        assert_eq!(reader.read_batch(2).unwrap().len(), 1);
        assert!(reader.read_batch(2).unwrap().is_empty());
    }

    #[test]
    fn test_external_sort_with_tiny_chunks_matches_full_sort() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.jsonl");
        let output = dir.path().join("sorted.jsonl");

        // Reverse order across many runs
        let mut writer = SpillWriter::create(&input).unwrap();
        let mut expected: Vec<Triple> = (0..100).map(t).collect();
        for triple in expected.iter().rev() {
            writer.append(triple).unwrap();
        }
        writer.finish().unwrap();

        external_sort(&input, &output, dir.path(), 7).unwrap();

        expected.sort_by(|a, b| a.lexical_key().cmp(&b.lexical_key()));
        let sorted = SpillReader::open(&output).unwrap().read_all().unwrap();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_external_sort_empty_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.jsonl");
        let output = dir.path().join("sorted.jsonl");
        SpillWriter::create(&input).unwrap().finish().unwrap();

        external_sort(&input, &output, dir.path(), 10).unwrap();
        assert!(SpillReader::open(&output)
            .unwrap()
            .read_all()
            .unwrap()
            .is_empty());
    }
}
