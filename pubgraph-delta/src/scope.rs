//! Scope decisions: is a resource currently eligible for publication?
//!
//! A resource is in scope under an entry when at least one of its triples
//! lives in an accepted graph, the entry's additional filter holds, and the
//! concept-scheme path (when configured) is reachable. Pure existence check,
//! one ASK per decision.

use crate::error::Result;
use pubgraph_core::{ExportConfig, ExportConfigEntry};
use pubgraph_store::sparql::{concept_scheme_clause, graph_filter_clause, render_filter, render_uri};
use pubgraph_store::{RequestOptions, SparqlGateway};
use std::sync::Arc;

/// Decides publication eligibility for single resources
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    gateway: Arc<dyn SparqlGateway>,
}

impl ScopeResolver {
    pub fn new(gateway: Arc<dyn SparqlGateway>) -> Self {
        Self { gateway }
    }

    /// True when `uri` currently qualifies for publication under `entry`.
    pub async fn is_in_scope(
        &self,
        uri: &str,
        entry: &ExportConfigEntry,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<bool> {
        let query = scope_query(uri, entry, config);
        Ok(self.gateway.ask(&query, opts).await?)
    }
}

/// Render the ASK query for one scope decision.
///
/// The subject is bound through VALUES so the entry's filter expression sees
/// the same `?subject`/`?predicate`/`?object`/`?graph` bindings the triple
/// pattern produces. The concept-scheme path is matched outside the GRAPH
/// block: a path may legitimately cross graphs.
pub(crate) fn scope_query(uri: &str, entry: &ExportConfigEntry, config: &ExportConfig) -> String {
    let mut clauses = vec![
        format!("VALUES ?subject {{ {} }}", render_uri(uri)),
        "GRAPH ?graph { ?subject ?predicate ?object . }".to_string(),
        graph_filter_clause(&entry.graphs_filter, &config.publication_graph),
    ];
    if let Some(filter) = &entry.additional_filter {
        clauses.push(render_filter(filter));
    }
    if !entry.path_to_concept_scheme.is_empty() {
        // validate() guarantees a concept scheme exists when paths are used
        let scheme = config.concept_scheme.as_deref().unwrap_or_default();
        clauses.push(concept_scheme_clause(&entry.path_to_concept_scheme, scheme));
    }
    format!("ASK {{\n{}\n}}", clauses.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgraph_core::config::{FilterExpr, FilterVar, GraphFilter, PathSegment};
    use pubgraph_core::triple::Term;
    use pubgraph_store::testing::StubGateway;

    fn config_with(entry: ExportConfigEntry) -> ExportConfig {
        ExportConfig {
            concept_scheme: Some("http://ex.org/scheme".to_string()),
            export: vec![entry],
            publication_graph: "http://ex.org/graphs/public".to_string(),
        }
    }

    fn entry() -> ExportConfigEntry {
        ExportConfigEntry {
            type_uri: "http://ex.org/Person".to_string(),
            properties: vec![PathSegment::parse("http://ex.org/name")],
            path_to_concept_scheme: vec![
                PathSegment::parse("http://ex.org/holds"),
                PathSegment::parse("http://ex.org/inScheme"),
            ],
            graphs_filter: vec![GraphFilter::Exact("http://ex.org/graphs/src".to_string())],
            additional_filter: Some(FilterExpr::Ne(
                FilterVar::Subject,
                Term::uri("http://ex.org/hidden"),
            )),
            strict_type_export: false,
        }
    }

    #[test]
    fn test_scope_query_contains_all_constraints() {
        let e = entry();
        let cfg = config_with(e.clone());
        let query = scope_query("http://ex.org/p1", &e, &cfg);

        assert!(query.starts_with("ASK {"));
        assert!(query.contains("VALUES ?subject { <http://ex.org/p1> }"));
        assert!(query.contains("?graph = <http://ex.org/graphs/src>"));
        assert!(query.contains("FILTER(?subject != <http://ex.org/hidden>)"));
        assert!(query.contains(
            "?subject <http://ex.org/holds>/<http://ex.org/inScheme> <http://ex.org/scheme> ."
        ));
    }

    #[test]
    fn test_scope_query_empty_path_omits_reachability() {
        let mut e = entry();
        e.path_to_concept_scheme.clear();
        e.additional_filter = None;
        e.graphs_filter.clear();
        let cfg = config_with(e.clone());
        let query = scope_query("http://ex.org/p1", &e, &cfg);

        assert!(query.contains("FILTER(?graph != <http://ex.org/graphs/public>)"));
        assert!(!query.contains("http://ex.org/scheme"));
    }

    #[tokio::test]
    async fn test_is_in_scope_asks_the_store() {
        let gateway = Arc::new(StubGateway::new());
        gateway.on_ask(&["<http://ex.org/p1>"], true);
        let resolver = ScopeResolver::new(gateway.clone());

        let e = entry();
        let cfg = config_with(e.clone());
        assert!(resolver
            .is_in_scope("http://ex.org/p1", &e, &cfg, &RequestOptions::default())
            .await
            .unwrap());
        assert!(!resolver
            .is_in_scope("http://ex.org/p2", &e, &cfg, &RequestOptions::default())
            .await
            .unwrap());
        assert_eq!(gateway.asks().len(), 2);
    }
}
