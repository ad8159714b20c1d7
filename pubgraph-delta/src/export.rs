//! Resource export: the triples one resource contributes to the publication
//! graph under one configuration entry
//!
//! Reading from the source store applies the entry's graph and additional
//! filters; reading from the publication graph applies none, because there
//! the question is "what is currently published", not "what qualifies".

use crate::error::Result;
use pubgraph_core::config::PathSegment;
use pubgraph_core::triple::{Term, Triple};
use pubgraph_core::vocab::rdf;
use pubgraph_core::{ExportConfig, ExportConfigEntry};
use pubgraph_store::sparql::{graph_filter_clause, render_filter, render_uri};
use pubgraph_store::{BatchedExecutor, RequestOptions};
use std::collections::HashSet;

/// Materializes per-resource export triple sets
#[derive(Debug, Clone)]
pub struct ResourceExporter {
    executor: BatchedExecutor,
}

impl ResourceExporter {
    pub fn new(executor: BatchedExecutor) -> Self {
        Self { executor }
    }

    /// The full triple set `uri` contributes under `entry`.
    ///
    /// With `from_publication_graph` the result reflects what is currently
    /// published for the resource; otherwise what source truth would
    /// publish. The declared type triple is always part of a source-side
    /// export. `strict_type_export` keeps rdf:type out of the property loop
    /// so no second, ambiguous type assertion can appear.
    pub async fn export_resource(
        &self,
        uri: &str,
        entry: &ExportConfigEntry,
        config: &ExportConfig,
        from_publication_graph: bool,
        opts: &RequestOptions,
    ) -> Result<Vec<Triple>> {
        let mut out: Vec<Triple> = Vec::new();

        if from_publication_graph {
            out.extend(self.published_type_triples(uri, entry, config, opts).await?);
        } else {
            out.push(declared_type_triple(uri, entry));
            if !entry.strict_type_export && has_rdf_type_property(entry) {
                let body = property_where(uri, rdf::TYPE, false, entry, config, false);
                out.extend(self.executor.batched_query(&body, opts).await?);
            }
        }

        for property in &entry.properties {
            if property.predicate() == rdf::TYPE {
                // Handled above for both sides
                continue;
            }
            let body = property_where(
                uri,
                property.predicate(),
                property.is_inverse(),
                entry,
                config,
                from_publication_graph,
            );
            out.extend(self.executor.batched_query(&body, opts).await?);
        }

        dedup_triples(&mut out);
        Ok(out)
    }

    /// Type triples currently published for `uri`.
    ///
    /// Restricted to the declared type unless the entry exports rdf:type as
    /// an open property, in which case every published type belongs to this
    /// entry's footprint.
    async fn published_type_triples(
        &self,
        uri: &str,
        entry: &ExportConfigEntry,
        config: &ExportConfig,
        opts: &RequestOptions,
    ) -> Result<Vec<Triple>> {
        let body = property_where(uri, rdf::TYPE, false, entry, config, true);
        let mut triples = self.executor.batched_query(&body, opts).await?;
        let open_type_export = !entry.strict_type_export && has_rdf_type_property(entry);
        if !open_type_export {
            triples.retain(|t| t.object_uri() == Some(entry.type_uri.as_str()));
        }
        Ok(triples)
    }
}

fn has_rdf_type_property(entry: &ExportConfigEntry) -> bool {
    entry
        .properties
        .iter()
        .any(|p| matches!(p, PathSegment::Forward(uri) if uri == rdf::TYPE))
}

fn declared_type_triple(uri: &str, entry: &ExportConfigEntry) -> Triple {
    Triple::new(uri, rdf::TYPE, Term::uri(entry.type_uri.clone()))
}

/// WHERE body for one property fetch.
///
/// Inverse properties bind the resource in object position; the matched
/// triples are emitted unchanged, with the related entity as subject.
fn property_where(
    uri: &str,
    predicate: &str,
    inverse: bool,
    entry: &ExportConfigEntry,
    config: &ExportConfig,
    from_publication_graph: bool,
) -> String {
    let mut clauses = Vec::new();
    if inverse {
        clauses.push(format!("VALUES ?object {{ {} }}", render_uri(uri)));
    } else {
        clauses.push(format!("VALUES ?subject {{ {} }}", render_uri(uri)));
    }
    clauses.push(format!("VALUES ?predicate {{ {} }}", render_uri(predicate)));

    if from_publication_graph {
        clauses.push(format!(
            "GRAPH {} {{ ?subject ?predicate ?object . }}",
            render_uri(&config.publication_graph)
        ));
    } else {
        clauses.push("GRAPH ?graph { ?subject ?predicate ?object . }".to_string());
        clauses.push(graph_filter_clause(
            &entry.graphs_filter,
            &config.publication_graph,
        ));
        if let Some(filter) = &entry.additional_filter {
            clauses.push(render_filter(filter));
        }
    }
    clauses.join("\n")
}

fn dedup_triples(triples: &mut Vec<Triple>) {
    let mut seen = HashSet::new();
    triples.retain(|t| seen.insert(t.lexical_key()));
}
