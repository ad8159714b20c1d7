//! Cascade propagation: closure of resources whose publication membership a
//! changeset affects
//!
//! One changed triple can complete or sever another resource's path to the
//! concept scheme. The propagator walks that dependency fan-out with an
//! explicit work-list and a visited set keyed by `(uri, entry)`, so deep or
//! cyclic relation graphs cost one pass per involved resource and the run
//! always terminates.

use crate::error::Result;
use crate::export::ResourceExporter;
use crate::resolve::{TypeCache, TypeResolver};
use crate::scope::ScopeResolver;
use pubgraph_core::config::PathSegment;
use pubgraph_core::triple::Triple;
use pubgraph_core::vocab::rdf;
use pubgraph_core::{ChangeSet, ExportConfig, ExportConfigEntry};
use pubgraph_store::{BatchedExecutor, RequestOptions, SparqlGateway};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Resolves the publication-graph effect of one changeset
#[derive(Debug, Clone)]
pub struct CascadePropagator {
    types: TypeResolver,
    scope: ScopeResolver,
    exporter: ResourceExporter,
}

impl CascadePropagator {
    pub fn new(gateway: Arc<dyn SparqlGateway>, executor: BatchedExecutor) -> Self {
        Self {
            types: TypeResolver::new(gateway.clone()),
            scope: ScopeResolver::new(gateway),
            exporter: ResourceExporter::new(executor),
        }
    }

    /// Gross insert and delete sets for the publication graph.
    ///
    /// Deletes resolve first: they read the publication graph's previous
    /// state, while inserts read source truth, which already includes the
    /// changeset by the time the change feed delivers it.
    pub async fn propagate(
        &self,
        changeset: &ChangeSet,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<ChangeSet> {
        let deletes = self.propagate_deletes(changeset, config, opts).await?;
        let inserts = self.propagate_inserts(changeset, config, opts).await?;
        let mut out = ChangeSet::new(inserts, deletes);
        out.dedup();
        tracing::debug!(
            inserts = out.inserts.len(),
            deletes = out.deletes.len(),
            "cascade resolved"
        );
        Ok(out)
    }

    async fn propagate_inserts(
        &self,
        changeset: &ChangeSet,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<Vec<Triple>> {
        if changeset.inserts.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&Triple> = changeset.inserts.iter().collect();
        let cache = self
            .types
            .resolve(&mentioned_uris(&changeset.inserts), &refs, config, opts)
            .await?;

        let mut out: Vec<Triple> = Vec::new();
        let mut visited: HashSet<(String, usize)> = HashSet::new();
        let mut scope_memo: HashMap<(String, usize), bool> = HashMap::new();
        let mut worklist: VecDeque<(String, usize)> = VecDeque::new();

        // Direct accepts: triples that qualify on their own under an entry
        // of their subject (or, for inverse properties, their object).
        for triple in &changeset.inserts {
            for &ei in cache.entries_for(&triple.subject) {
                let entry = config.entry(ei);
                if is_declared_type_triple(triple, entry) || is_forward_property(triple, entry) {
                    if entry.additional_filter.is_some() {
                        // The filter can depend on sibling triples, so the
                        // whole resource is re-exported instead.
                        worklist.push_back((triple.subject.clone(), ei));
                    } else if self
                        .memoized_scope(&triple.subject, ei, config, opts, &mut scope_memo)
                        .await?
                    {
                        out.push(triple.clone());
                    }
                }
            }
            if let Some(object) = triple.object_uri() {
                for &ei in cache.entries_for(object) {
                    let entry = config.entry(ei);
                    if has_inverse_property(entry, &triple.predicate) {
                        if entry.additional_filter.is_some() {
                            worklist.push_back((object.to_string(), ei));
                        } else if self
                            .memoized_scope(object, ei, config, opts, &mut scope_memo)
                            .await?
                        {
                            out.push(triple.clone());
                        }
                    }
                }
            }
        }

        // Relation triples may have completed other resources' paths.
        for pair in impacted_resources(&changeset.inserts, &cache, config) {
            worklist.push_back(pair);
        }

        while let Some((uri, ei)) = worklist.pop_front() {
            if !visited.insert((uri.clone(), ei)) {
                continue;
            }
            let entry = config.entry(ei);
            if !self.scope.is_in_scope(&uri, entry, config, opts).await? {
                continue;
            }
            let exported = self
                .exporter
                .export_resource(&uri, entry, config, false, opts)
                .await?;
            if exported.is_empty() {
                continue;
            }

            // The export may contain relation triples that complete further
            // paths; resolve them against a cache built from these triples
            // only and keep walking.
            let exported_refs: Vec<&Triple> = exported.iter().collect();
            let fresh_cache = self
                .types
                .resolve(&mentioned_uris(&exported), &exported_refs, config, opts)
                .await?;
            for pair in impacted_resources(&exported, &fresh_cache, config) {
                if !visited.contains(&pair) {
                    worklist.push_back(pair);
                }
            }
            out.extend(exported);
        }
        Ok(out)
    }

    async fn propagate_deletes(
        &self,
        changeset: &ChangeSet,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<Vec<Triple>> {
        if changeset.deletes.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&Triple> = changeset.deletes.iter().collect();
        let cache = self
            .types
            .resolve(&mentioned_uris(&changeset.deletes), &refs, config, opts)
            .await?;

        let mut out: Vec<Triple> = Vec::new();
        let mut visited: HashSet<(String, usize)> = HashSet::new();
        let mut worklist: VecDeque<(String, usize)> = VecDeque::new();

        // Both ends of every deleted triple are removal candidates: a
        // deleted relation can strip the justification from either side.
        for triple in &changeset.deletes {
            for &ei in cache.entries_for(&triple.subject) {
                worklist.push_back((triple.subject.clone(), ei));
            }
            if let Some(object) = triple.object_uri() {
                for &ei in cache.entries_for(object) {
                    worklist.push_back((object.to_string(), ei));
                }
            }
        }

        while let Some((uri, ei)) = worklist.pop_front() {
            if !visited.insert((uri.clone(), ei)) {
                continue;
            }
            let entry = config.entry(ei);

            let published = self
                .exporter
                .export_resource(&uri, entry, config, true, opts)
                .await?;
            if published.is_empty() {
                continue;
            }

            // Post-delete source state decides what survives; out of scope
            // means nothing does.
            let retained = if self.scope.is_in_scope(&uri, entry, config, opts).await? {
                self.exporter
                    .export_resource(&uri, entry, config, false, opts)
                    .await?
            } else {
                Vec::new()
            };
            let retained_keys: HashSet<String> =
                retained.iter().map(Triple::lexical_key).collect();
            let removals: Vec<Triple> = published
                .into_iter()
                .filter(|t| !retained_keys.contains(&t.lexical_key()))
                .collect();
            if removals.is_empty() {
                continue;
            }

            // Removed relations cascade to their endpoints.
            let removal_refs: Vec<&Triple> = removals.iter().collect();
            let fresh_cache = self
                .types
                .resolve(&mentioned_uris(&removals), &removal_refs, config, opts)
                .await?;
            for triple in &removals {
                for &ej in fresh_cache.entries_for(&triple.subject) {
                    if !visited.contains(&(triple.subject.clone(), ej)) {
                        worklist.push_back((triple.subject.clone(), ej));
                    }
                }
                if let Some(object) = triple.object_uri() {
                    for &ej in fresh_cache.entries_for(object) {
                        if !visited.contains(&(object.to_string(), ej)) {
                            worklist.push_back((object.to_string(), ej));
                        }
                    }
                }
            }
            out.extend(removals);
        }
        Ok(out)
    }

    async fn memoized_scope(
        &self,
        uri: &str,
        entry_index: usize,
        config: &ExportConfig,
        opts: &RequestOptions,
        memo: &mut HashMap<(String, usize), bool>,
    ) -> Result<bool> {
        let key = (uri.to_string(), entry_index);
        if let Some(&answer) = memo.get(&key) {
            return Ok(answer);
        }
        let answer = self
            .scope
            .is_in_scope(uri, config.entry(entry_index), config, opts)
            .await?;
        memo.insert(key, answer);
        Ok(answer)
    }
}

fn mentioned_uris(triples: &[Triple]) -> HashSet<String> {
    let mut uris = HashSet::new();
    for triple in triples {
        uris.insert(triple.subject.clone());
        if let Some(object) = triple.object_uri() {
            uris.insert(object.to_string());
        }
    }
    uris
}

fn is_declared_type_triple(triple: &Triple, entry: &ExportConfigEntry) -> bool {
    triple.predicate == rdf::TYPE && triple.object_uri() == Some(entry.type_uri.as_str())
}

fn is_forward_property(triple: &Triple, entry: &ExportConfigEntry) -> bool {
    entry
        .properties
        .iter()
        .any(|p| matches!(p, PathSegment::Forward(uri) if *uri == triple.predicate))
}

fn has_inverse_property(entry: &ExportConfigEntry, predicate: &str) -> bool {
    entry
        .properties
        .iter()
        .any(|p| matches!(p, PathSegment::Inverse(uri) if uri == predicate))
}

/// Resources whose membership a set of triples may have changed.
///
/// For a triple `s p o` with a URI object:
/// - `s` is impacted under an entry whose concept-scheme path starts with
///   the forward segment `p`: the triple may have completed that path.
/// - `o` is impacted under an entry whose path starts with the inverse
///   segment `^p`: the triple is an incoming `p` edge.
/// - `o` is impacted under a "child" entry whose path is `^p` prepended to
///   one of `s`'s entry paths: the object hangs off the subject's chain.
fn impacted_resources(
    triples: &[Triple],
    cache: &TypeCache,
    config: &ExportConfig,
) -> Vec<(String, usize)> {
    let mut impacted: Vec<(String, usize)> = Vec::new();
    let mut seen: HashSet<(String, usize)> = HashSet::new();
    let mut push = |impacted: &mut Vec<(String, usize)>, uri: &str, ei: usize| {
        if seen.insert((uri.to_string(), ei)) {
            impacted.push((uri.to_string(), ei));
        }
    };

    for triple in triples {
        let Some(object) = triple.object_uri() else {
            continue;
        };

        for &ei in cache.entries_for(&triple.subject) {
            let path = &config.entry(ei).path_to_concept_scheme;
            if matches!(path.first(), Some(PathSegment::Forward(p)) if *p == triple.predicate) {
                push(&mut impacted, &triple.subject, ei);
            }
        }
        for &ei in cache.entries_for(object) {
            let path = &config.entry(ei).path_to_concept_scheme;
            if matches!(path.first(), Some(PathSegment::Inverse(p)) if *p == triple.predicate) {
                push(&mut impacted, object, ei);
            }
        }
        // Child-entry rule: object's path = ^p + subject's path
        for &parent in cache.entries_for(&triple.subject) {
            let parent_path = &config.entry(parent).path_to_concept_scheme;
            for &child in cache.entries_for(object) {
                let child_path = &config.entry(child).path_to_concept_scheme;
                if child_path.len() == parent_path.len() + 1
                    && matches!(&child_path[0], PathSegment::Inverse(p) if *p == triple.predicate)
                    && child_path[1..] == parent_path[..]
                {
                    push(&mut impacted, object, child);
                }
            }
        }
    }
    impacted
}
