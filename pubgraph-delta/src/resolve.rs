//! Type resolution: mapping changeset URIs onto export configuration entries
//!
//! A URI is a release candidate when at least one of its rdf:types matches
//! the type of an export configuration entry. Types are gathered from three
//! places: the source store, the publication graph (needed for deletions,
//! where source data may already be gone), and rdf:type triples inside the
//! changeset itself. Unmatched types are dropped silently.

use crate::error::Result;
use pubgraph_core::triple::Triple;
use pubgraph_core::vocab::rdf;
use pubgraph_core::ExportConfig;
use pubgraph_store::sparql::render_uri;
use pubgraph_store::{RequestOptions, SparqlGateway};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How many URIs go into one VALUES block
const VALUES_CHUNK: usize = 250;

/// Resolved release candidates for one changeset.
///
/// A URI may map to several entries: it can carry multiple matching types,
/// and one type can have multiple configuration entries.
#[derive(Debug, Default, Clone)]
pub struct TypeCache {
    by_uri: HashMap<String, Vec<usize>>,
}

impl TypeCache {
    /// Entry indices applicable to `uri`
    pub fn entries_for(&self, uri: &str) -> &[usize] {
        self.by_uri.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_uri.len()
    }

    fn add(&mut self, uri: &str, entry_index: usize) {
        let entries = self.by_uri.entry(uri.to_string()).or_default();
        if !entries.contains(&entry_index) {
            entries.push(entry_index);
        }
    }
}

/// Resolves rdf:types for candidate URIs against store and changeset
#[derive(Debug, Clone)]
pub struct TypeResolver {
    gateway: Arc<dyn SparqlGateway>,
}

impl TypeResolver {
    pub fn new(gateway: Arc<dyn SparqlGateway>) -> Self {
        Self { gateway }
    }

    /// Build the type cache for `candidates`.
    ///
    /// `changeset_triples` are scanned for rdf:type assertions; they count as
    /// types even when neither store has them (a freshly inserted resource).
    pub async fn resolve(
        &self,
        candidates: &HashSet<String>,
        changeset_triples: &[&Triple],
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<TypeCache> {
        let mut cache = TypeCache::default();
        if candidates.is_empty() {
            return Ok(cache);
        }

        let mut typed: Vec<(String, String)> = Vec::new();

        // Types asserted inside the changeset itself
        for triple in changeset_triples {
            if triple.predicate == rdf::TYPE && candidates.contains(&triple.subject) {
                if let Some(type_uri) = triple.object_uri() {
                    typed.push((triple.subject.clone(), type_uri.to_string()));
                }
            }
        }

        let uris: Vec<&String> = candidates.iter().collect();
        for chunk in uris.chunks(VALUES_CHUNK) {
            let values: Vec<String> = chunk.iter().map(|u| render_uri(u)).collect();
            let values = values.join(" ");

            // Source store, any graph except the publication graph
            let source_query = format!(
                "SELECT DISTINCT ?subject ?type WHERE {{\n\
                 VALUES ?subject {{ {} }}\n\
                 GRAPH ?graph {{ ?subject {} ?type . }}\n\
                 FILTER(?graph != {})\n\
                 }}",
                values,
                render_uri(rdf::TYPE),
                render_uri(&config.publication_graph)
            );
            typed.extend(self.typed_rows(&source_query, opts).await?);

            // Publication graph, so deletions of already-gone source data
            // still resolve
            let published_query = format!(
                "SELECT DISTINCT ?subject ?type WHERE {{\n\
                 VALUES ?subject {{ {} }}\n\
                 GRAPH {} {{ ?subject {} ?type . }}\n\
                 }}",
                values,
                render_uri(&config.publication_graph),
                render_uri(rdf::TYPE)
            );
            typed.extend(self.typed_rows(&published_query, opts).await?);
        }

        for (uri, type_uri) in typed {
            for entry_index in config.entries_for_type(&type_uri) {
                cache.add(&uri, entry_index);
            }
        }
        tracing::debug!(
            candidates = candidates.len(),
            release_candidates = cache.len(),
            "type resolution finished"
        );
        Ok(cache)
    }

    async fn typed_rows(
        &self,
        query: &str,
        opts: &RequestOptions,
    ) -> Result<Vec<(String, String)>> {
        let rows = self.gateway.select(query, opts).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let subject = row.get("subject")?.as_uri()?.to_string();
                let type_uri = row.get("type")?.as_uri()?.to_string();
                Some((subject, type_uri))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::config::{ExportConfigEntry, PathSegment};
    use pubgraph_core::triple::Term;
    use pubgraph_store::testing::StubGateway;

    fn config() -> ExportConfig {
        ExportConfig {
            concept_scheme: None,
            export: vec![
                ExportConfigEntry {
                    type_uri: "http://ex.org/Person".to_string(),
                    properties: vec![PathSegment::parse("http://ex.org/name")],
                    path_to_concept_scheme: vec![],
                    graphs_filter: vec![],
                    additional_filter: None,
                    strict_type_export: false,
                },
                ExportConfigEntry {
                    type_uri: "http://ex.org/Person".to_string(),
                    properties: vec![PathSegment::parse("http://ex.org/age")],
                    path_to_concept_scheme: vec![],
                    graphs_filter: vec![],
                    additional_filter: None,
                    strict_type_export: false,
                },
            ],
            publication_graph: "http://ex.org/graphs/public".to_string(),
        }
    }

    fn type_row(subject: &str, type_uri: &str) -> pubgraph_store::Binding {
        [
            ("subject".to_string(), Term::uri(subject)),
            ("type".to_string(), Term::uri(type_uri)),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_changeset_types_resolve_without_store_data() {
        let gateway = Arc::new(StubGateway::new());
        let resolver = TypeResolver::new(gateway);

        let type_triple = Triple::new(
            "http://ex.org/p1",
            rdf::TYPE,
            Term::uri("http://ex.org/Person"),
        );
        let candidates: HashSet<String> = ["http://ex.org/p1".to_string()].into();
        let cache = resolver
            .resolve(
                &candidates,
                &[&type_triple],
                &config(),
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        // Both Person entries apply
        assert_eq!(cache.entries_for("http://ex.org/p1"), &[0, 1]);
    }

    #[tokio::test]
    async fn test_store_types_and_unmatched_types_dropped() {
        let gateway = Arc::new(StubGateway::new());
        gateway.on_select(
            &["FILTER(?graph != <http://ex.org/graphs/public>)"],
            vec![
                type_row("http://ex.org/p1", "http://ex.org/Person"),
                type_row("http://ex.org/x1", "http://ex.org/Unconfigured"),
            ],
        );
        let resolver = TypeResolver::new(gateway);

        let candidates: HashSet<String> =
            ["http://ex.org/p1".to_string(), "http://ex.org/x1".to_string()].into();
        let cache = resolver
            .resolve(&candidates, &[], &config(), &RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(cache.entries_for("http://ex.org/p1"), &[0, 1]);
        assert!(cache.entries_for("http://ex.org/x1").is_empty());
    }

    #[tokio::test]
    async fn test_publication_graph_types_resolve_deletes() {
        let gateway = Arc::new(StubGateway::new());
        gateway.on_select(
            &["GRAPH <http://ex.org/graphs/public>"],
            vec![type_row("http://ex.org/gone", "http://ex.org/Person")],
        );
        let resolver = TypeResolver::new(gateway);

        let candidates: HashSet<String> = ["http://ex.org/gone".to_string()].into();
        let cache = resolver
            .resolve(&candidates, &[], &config(), &RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(cache.entries_for("http://ex.org/gone"), &[0, 1]);
    }
}
