//! The reconciliation engine
//!
//! For every property the export configuration requires (plus the implicit
//! rdf:type), the engine dumps the source-truth triple set and the currently
//! published triple set to spill files, diffs them through a provider chosen
//! by volume, and folds every property's diff into one run-wide pair of
//! addition/removal files. Applying streams those files back in bounded
//! batches.
//!
//! The source set for a property is the union of every entry's contribution:
//! a triple justified by any entry stays published. Diffing per property
//! rather than per entry keeps one entry's reconciliation from clawing back
//! triples another entry legitimately exports.

use crate::error::Result;
use crate::external::ExternalDiff;
use crate::memory::InMemoryDiff;
use crate::provider::{DiffProvider, DiffStats};
use crate::spill::{SpillReader, SpillWriter};
use pubgraph_core::config::PathSegment;
use pubgraph_core::vocab::rdf;
use pubgraph_core::{ExportConfig, ExportConfigEntry};
use pubgraph_store::sparql::{graph_filter_clause, path_reach_clause, render_filter, render_uri};
use pubgraph_store::{BatchedExecutor, RequestOptions, UpdateOp};
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;

/// Tuning for a reconciliation run
#[derive(Debug, Clone)]
pub struct HealConfig {
    /// Per-side record count at which the external-memory provider takes
    /// over from the in-memory one
    pub external_threshold: usize,
    /// Records held in memory at a time while externally sorting
    pub sort_chunk: usize,
    /// Spill space; the system temp directory when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            external_threshold: 100_000,
            sort_chunk: 50_000,
            work_dir: None,
        }
    }
}

/// Totals of one applied reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealStats {
    pub inserted: usize,
    pub removed: usize,
}

/// The computed net difference, backed by spill files.
///
/// Holds its spill workspace alive; the files disappear when the outcome is
/// dropped, so audit dumps must be copied out before then.
#[derive(Debug)]
pub struct HealOutcome {
    pub additions: PathBuf,
    pub removals: PathBuf,
    pub addition_count: usize,
    pub removal_count: usize,
    _workspace: TempDir,
}

impl HealOutcome {
    pub fn additions_reader(&self) -> Result<SpillReader> {
        SpillReader::open(&self.additions)
    }

    pub fn removals_reader(&self) -> Result<SpillReader> {
        SpillReader::open(&self.removals)
    }

    pub fn is_empty(&self) -> bool {
        self.addition_count == 0 && self.removal_count == 0
    }
}

/// Recomputes full publication-graph membership from source truth
#[derive(Debug)]
pub struct HealEngine {
    executor: BatchedExecutor,
    config: HealConfig,
}

impl HealEngine {
    pub fn new(executor: BatchedExecutor, config: HealConfig) -> Self {
        Self { executor, config }
    }

    /// Compute the net `{additions, removals}` without touching the store.
    pub async fn compute(
        &self,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<HealOutcome> {
        let workspace = match &self.config.work_dir {
            Some(dir) => tempfile::Builder::new().prefix("heal-").tempdir_in(dir)?,
            None => tempfile::Builder::new().prefix("heal-").tempdir()?,
        };
        let mut additions = SpillWriter::create(workspace.path().join("additions.jsonl"))?;
        let mut removals = SpillWriter::create(workspace.path().join("removals.jsonl"))?;
        let mut totals = DiffStats::default();

        for (index, predicate) in exported_predicates(config).iter().enumerate() {
            let source_path = workspace.path().join(format!("p{:03}.source.jsonl", index));
            let published_path = workspace.path().join(format!("p{:03}.published.jsonl", index));

            let source_count = self
                .dump_source(predicate, config, &source_path, opts)
                .await?;
            let published_count = self
                .dump_published(predicate, config, &published_path, opts)
                .await?;

            let large = source_count.max(published_count) > self.config.external_threshold;
            let stats = if large {
                ExternalDiff::new(workspace.path(), self.config.sort_chunk)
                    .diff(&source_path, &published_path, &mut additions, &mut removals)
                    .await?
            } else {
                InMemoryDiff
                    .diff(&source_path, &published_path, &mut additions, &mut removals)
                    .await?
            };
            tracing::info!(
                predicate = %predicate,
                source = source_count,
                published = published_count,
                additions = stats.additions,
                removals = stats.removals,
                external = large,
                "property reconciled"
            );
            totals.merge(stats);

            let _ = std::fs::remove_file(&source_path);
            let _ = std::fs::remove_file(&published_path);
        }

        let (additions, addition_count) = additions.finish()?;
        let (removals, removal_count) = removals.finish()?;
        debug_assert_eq!(totals.additions, addition_count);
        debug_assert_eq!(totals.removals, removal_count);
        Ok(HealOutcome {
            additions,
            removals,
            addition_count,
            removal_count,
            _workspace: workspace,
        })
    }

    /// Apply a computed outcome: removals first, then additions, streamed in
    /// bounded batches.
    pub async fn apply(
        &self,
        outcome: &HealOutcome,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<HealStats> {
        let page = match self.executor.batch_size() {
            0 => 1_000,
            n => n,
        };

        let mut reader = outcome.removals_reader()?;
        loop {
            let chunk = reader.read_batch(page)?;
            if chunk.is_empty() {
                break;
            }
            self.executor
                .batched_update(&chunk, &config.publication_graph, UpdateOp::Delete, opts)
                .await?;
        }

        let mut reader = outcome.additions_reader()?;
        loop {
            let chunk = reader.read_batch(page)?;
            if chunk.is_empty() {
                break;
            }
            self.executor
                .batched_update(&chunk, &config.publication_graph, UpdateOp::Insert, opts)
                .await?;
        }

        Ok(HealStats {
            inserted: outcome.addition_count,
            removed: outcome.removal_count,
        })
    }

    /// Full run: compute, then apply.
    pub async fn reconcile(
        &self,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<(HealOutcome, HealStats)> {
        let outcome = self.compute(config, opts).await?;
        let stats = self.apply(&outcome, config, opts).await?;
        Ok((outcome, stats))
    }

    async fn dump_source(
        &self,
        predicate: &str,
        config: &ExportConfig,
        path: &std::path::Path,
        opts: &RequestOptions,
    ) -> Result<usize> {
        let mut writer = SpillWriter::create(path)?;
        for entry in &config.export {
            for body in source_bodies(predicate, entry, config) {
                self.executor
                    .batched_query_pages(&body, opts, |page| {
                        writer.append_all(&page).map_err(io::Error::other)
                    })
                    .await?;
            }
        }
        let (_, count) = writer.finish()?;
        Ok(count)
    }

    async fn dump_published(
        &self,
        predicate: &str,
        config: &ExportConfig,
        path: &std::path::Path,
        opts: &RequestOptions,
    ) -> Result<usize> {
        let body = format!(
            "VALUES ?predicate {{ {} }}\nGRAPH {} {{ ?subject ?predicate ?object . }}",
            render_uri(predicate),
            render_uri(&config.publication_graph)
        );
        let mut writer = SpillWriter::create(path)?;
        self.executor
            .batched_query_pages(&body, opts, |page| {
                writer.append_all(&page).map_err(io::Error::other)
            })
            .await?;
        let (_, count) = writer.finish()?;
        Ok(count)
    }
}

/// Distinct predicates the configuration exports, rdf:type first.
fn exported_predicates(config: &ExportConfig) -> Vec<String> {
    let mut predicates = vec![rdf::TYPE.to_string()];
    for entry in &config.export {
        for property in &entry.properties {
            let predicate = property.predicate();
            if !predicates.iter().any(|p| p == predicate) {
                predicates.push(predicate.to_string());
            }
        }
    }
    predicates
}

/// WHERE bodies for one entry's contribution to a property's source set.
///
/// Empty when the entry does not export the predicate. rdf:type contributes
/// the declared type only, unless the entry exports rdf:type as an open
/// property.
fn source_bodies(predicate: &str, entry: &ExportConfigEntry, config: &ExportConfig) -> Vec<String> {
    if predicate == rdf::TYPE {
        let open = !entry.strict_type_export
            && entry
                .properties
                .iter()
                .any(|p| matches!(p, PathSegment::Forward(uri) if uri == rdf::TYPE));
        return vec![type_source_body(entry, config, !open)];
    }

    entry
        .properties
        .iter()
        .filter(|p| p.predicate() == predicate)
        .map(|segment| {
            // Inverse properties carry the in-scope resource in object
            // position, so the path anchors there.
            let anchor = if segment.is_inverse() {
                "object"
            } else {
                "subject"
            };
            property_source_body(predicate, anchor, entry, config)
        })
        .collect()
}

fn type_source_body(entry: &ExportConfigEntry, config: &ExportConfig, restrict: bool) -> String {
    let mut clauses = vec![format!("VALUES ?predicate {{ {} }}", render_uri(rdf::TYPE))];
    if restrict {
        clauses.push(format!(
            "VALUES ?object {{ {} }}",
            render_uri(&entry.type_uri)
        ));
    }
    clauses.extend(source_graph_clauses(entry, config, "subject"));
    clauses.join("\n")
}

fn property_source_body(
    predicate: &str,
    path_anchor: &str,
    entry: &ExportConfigEntry,
    config: &ExportConfig,
) -> String {
    let mut clauses = vec![format!("VALUES ?predicate {{ {} }}", render_uri(predicate))];
    clauses.extend(source_graph_clauses(entry, config, path_anchor));
    clauses.join("\n")
}

/// The shared tail: graph pattern, graph filter, publication-graph
/// exclusion, additional filter, concept-scheme reachability.
fn source_graph_clauses(
    entry: &ExportConfigEntry,
    config: &ExportConfig,
    path_anchor: &str,
) -> Vec<String> {
    let mut clauses = vec![
        "GRAPH ?graph { ?subject ?predicate ?object . }".to_string(),
        graph_filter_clause(&entry.graphs_filter, &config.publication_graph),
    ];
    if !entry.graphs_filter.is_empty() {
        // Explicit filters could in principle match the publication graph;
        // triples living only there are never source truth.
        clauses.push(format!(
            "FILTER(?graph != {})",
            render_uri(&config.publication_graph)
        ));
    }
    if let Some(filter) = &entry.additional_filter {
        clauses.push(render_filter(filter));
    }
    if !entry.path_to_concept_scheme.is_empty() {
        let scheme = config.concept_scheme.as_deref().unwrap_or_default();
        clauses.push(path_reach_clause(
            path_anchor,
            &entry.path_to_concept_scheme,
            scheme,
        ));
    }
    clauses.retain(|c| !c.is_empty());
    clauses
}
