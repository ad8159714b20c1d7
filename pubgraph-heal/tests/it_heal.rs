//! Reconciliation runs against a scripted gateway

use pubgraph_core::config::{ExportConfigEntry, PathSegment};
use pubgraph_core::triple::{Term, Triple};
use pubgraph_core::vocab::rdf;
use pubgraph_core::ExportConfig;
use pubgraph_heal::{HealConfig, HealEngine, HealStats};
use pubgraph_store::testing::StubGateway;
use pubgraph_store::{BatchedExecutor, RequestOptions};
use std::sync::Arc;
use std::time::Duration;

const PUB: &str = "http://ex.org/graphs/public";
const PERSON: &str = "http://ex.org/Person";
const NAME: &str = "http://ex.org/name";

fn config() -> ExportConfig {
    ExportConfig {
        concept_scheme: None,
        export: vec![ExportConfigEntry {
            type_uri: PERSON.to_string(),
            properties: vec![PathSegment::parse(NAME)],
            path_to_concept_scheme: vec![],
            graphs_filter: vec![],
            additional_filter: None,
            strict_type_export: false,
        }],
        publication_graph: PUB.to_string(),
    }
}

fn engine(gateway: Arc<StubGateway>, work_dir: &std::path::Path) -> HealEngine {
    let executor = BatchedExecutor::new(gateway, 0, Duration::ZERO);
    HealEngine::new(
        executor,
        HealConfig {
            external_threshold: 100_000,
            sort_chunk: 1_000,
            work_dir: Some(work_dir.to_path_buf()),
        },
    )
}

fn type_triple(s: &str) -> Triple {
    Triple::new(s, rdf::TYPE, Term::uri(PERSON))
}

fn name_triple(s: &str, v: &str) -> Triple {
    Triple::new(s, NAME, Term::literal(v))
}

/// source {T1,T2,T3} versus published {T2,T3,T4} yields additions {T1} and
/// removals {T4}, across both the type and the name property.
#[tokio::test]
async fn test_reconcile_applies_set_difference() {
    let gateway = Arc::new(StubGateway::new());
    // Source truth: p1 and p2 are People, p1 has a name
    gateway.on_select_triples(
        &["VALUES ?object { <http://ex.org/Person> }"],
        &[type_triple("http://ex.org/p1"), type_triple("http://ex.org/p2")],
    );
    gateway.on_select_triples(
        &[
            "VALUES ?predicate { <http://ex.org/name> }",
            "FILTER(?graph",
        ],
        &[name_triple("http://ex.org/p1", "Ann")],
    );
    // Published: p2 and a stale p4, plus a stale name for p2
    gateway.on_select_triples(
        &[
            "GRAPH <http://ex.org/graphs/public>",
            "22-rdf-syntax-ns#type>",
        ],
        &[type_triple("http://ex.org/p2"), type_triple("http://ex.org/p4")],
    );
    gateway.on_select_triples(
        &[
            "GRAPH <http://ex.org/graphs/public>",
            "VALUES ?predicate { <http://ex.org/name> }",
        ],
        &[name_triple("http://ex.org/p2", "Stale")],
    );

    let dir = tempfile::tempdir().unwrap();
    let engine = engine(gateway.clone(), dir.path());
    let (outcome, stats) = engine
        .reconcile(&config(), &RequestOptions::initial_sync())
        .await
        .unwrap();

    assert_eq!(
        stats,
        HealStats {
            inserted: 2,
            removed: 2
        }
    );
    let additions = outcome.additions_reader().unwrap().read_all().unwrap();
    let removals = outcome.removals_reader().unwrap().read_all().unwrap();
    assert!(additions.contains(&type_triple("http://ex.org/p1")));
    assert!(additions.contains(&name_triple("http://ex.org/p1", "Ann")));
    assert!(removals.contains(&type_triple("http://ex.org/p4")));
    assert!(removals.contains(&name_triple("http://ex.org/p2", "Stale")));

    // Removals are applied before additions
    let updates = gateway.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].starts_with("DELETE DATA"));
    assert!(updates[0].contains("<http://ex.org/p4>"));
    assert!(updates[1].starts_with("INSERT DATA"));
    assert!(updates[1].contains("<http://ex.org/p1>"));
}

/// With publication and source in agreement, reconciliation finds nothing
/// and writes nothing: a second run right after a first one is a no-op.
#[tokio::test]
async fn test_reconcile_is_idempotent_when_in_sync() {
    let gateway = Arc::new(StubGateway::new());
    let people = [type_triple("http://ex.org/p1"), type_triple("http://ex.org/p2")];
    let names = [name_triple("http://ex.org/p1", "Ann")];
    gateway.on_select_triples(&["VALUES ?object { <http://ex.org/Person> }"], &people);
    gateway.on_select_triples(
        &[
            "GRAPH <http://ex.org/graphs/public>",
            "22-rdf-syntax-ns#type>",
        ],
        &people,
    );
    gateway.on_select_triples(
        &[
            "VALUES ?predicate { <http://ex.org/name> }",
            "FILTER(?graph",
        ],
        &names,
    );
    gateway.on_select_triples(
        &[
            "GRAPH <http://ex.org/graphs/public>",
            "VALUES ?predicate { <http://ex.org/name> }",
        ],
        &names,
    );

    let dir = tempfile::tempdir().unwrap();
    let engine = engine(gateway.clone(), dir.path());
    let (outcome, stats) = engine
        .reconcile(&config(), &RequestOptions::retryable())
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(stats, HealStats::default());
    assert!(gateway.updates().is_empty());
}
