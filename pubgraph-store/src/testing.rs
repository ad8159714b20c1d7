//! Scripted gateway for tests
//!
//! [`StubGateway`] answers SELECT and ASK queries from substring-matched
//! rules and records every request it sees. It understands just enough of
//! the executor's query shapes to answer count queries and slice LIMIT/OFFSET
//! pages from a registered row set, so batched reads work against it without
//! any real SPARQL evaluation.

use crate::error::{Result, StoreError};
use crate::gateway::{Binding, RequestOptions, SparqlGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use pubgraph_core::triple::{Term, Triple};

/// Build `?subject ?predicate ?object` rows from triples.
pub fn triple_rows(triples: &[Triple]) -> Vec<Binding> {
    triples
        .iter()
        .map(|t| {
            [
                ("subject".to_string(), Term::uri(t.subject.clone())),
                ("predicate".to_string(), Term::uri(t.predicate.clone())),
                ("object".to_string(), t.object.clone()),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}

struct SelectRule {
    needles: Vec<String>,
    rows: Vec<Binding>,
}

struct AskRule {
    needles: Vec<String>,
    answer: bool,
}

/// Scripted in-memory gateway
#[derive(Default)]
pub struct StubGateway {
    select_rules: Mutex<Vec<SelectRule>>,
    ask_rules: Mutex<Vec<AskRule>>,
    select_log: Mutex<Vec<String>>,
    ask_log: Mutex<Vec<String>>,
    update_log: Mutex<Vec<String>>,
    fail_update_needle: Mutex<Option<String>>,
}

impl std::fmt::Debug for StubGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubGateway")
            .field("selects", &self.select_log.lock().len())
            .field("asks", &self.ask_log.lock().len())
            .field("updates", &self.update_log.lock().len())
            .finish()
    }
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer SELECT queries containing all `needles` with `rows`.
    ///
    /// Rules are tried in registration order; the first match wins.
    pub fn on_select(&self, needles: &[&str], rows: Vec<Binding>) {
        self.select_rules.lock().push(SelectRule {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            rows,
        });
    }

    /// Answer matching SELECT queries with triple-shaped rows.
    pub fn on_select_triples(&self, needles: &[&str], triples: &[Triple]) {
        self.on_select(needles, triple_rows(triples));
    }

    /// Answer ASK queries containing all `needles` with `answer`.
    /// Unmatched ASK queries answer `false`.
    pub fn on_ask(&self, needles: &[&str], answer: bool) {
        self.ask_rules.lock().push(AskRule {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            answer,
        });
    }

    /// Fail updates whose text begins with `needle` with a transport error.
    ///
    /// Scoped to the leading operation keyword (e.g. `"DELETE DATA"`) so that
    /// an injected error message echoed into a later `INSERT DATA` does not
    /// itself match the needle.
    pub fn fail_updates_matching(&self, needle: &str) {
        *self.fail_update_needle.lock() = Some(needle.to_string());
    }

    pub fn selects(&self) -> Vec<String> {
        self.select_log.lock().clone()
    }

    pub fn asks(&self) -> Vec<String> {
        self.ask_log.lock().clone()
    }

    pub fn updates(&self) -> Vec<String> {
        self.update_log.lock().clone()
    }

    /// Triples inserted across all logged INSERT DATA updates, by lexical
    /// presence of their statement line.
    pub fn inserted_statement_count(&self) -> usize {
        self.update_log
            .lock()
            .iter()
            .filter(|u| u.starts_with("INSERT DATA"))
            .map(|u| u.lines().filter(|l| l.ends_with(" .")).count())
            .sum()
    }

    fn matching_rows(&self, query: &str) -> Option<Vec<Binding>> {
        let rules = self.select_rules.lock();
        rules
            .iter()
            .find(|rule| rule.needles.iter().all(|n| query.contains(n.as_str())))
            .map(|rule| rule.rows.clone())
    }
}

/// Parse a trailing `LIMIT n OFFSET m` pair, when present.
fn page_window(query: &str) -> Option<(usize, usize)> {
    let limit_pos = query.rfind("LIMIT ")?;
    let rest = &query[limit_pos + "LIMIT ".len()..];
    let mut parts = rest.split_whitespace();
    let limit: usize = parts.next()?.parse().ok()?;
    let offset = match (parts.next(), parts.next()) {
        (Some("OFFSET"), Some(m)) => m.parse().ok()?,
        _ => 0,
    };
    Some((limit, offset))
}

#[async_trait]
impl SparqlGateway for StubGateway {
    async fn select(&self, query: &str, _opts: &RequestOptions) -> Result<Vec<Binding>> {
        self.select_log.lock().push(query.to_string());
        let rows = self.matching_rows(query).unwrap_or_default();

        if query.contains("(COUNT(*) AS ?count)") {
            let count_row: Binding = [("count".to_string(), Term::literal(rows.len().to_string()))]
                .into_iter()
                .collect();
            return Ok(vec![count_row]);
        }
        if let Some((limit, offset)) = page_window(query) {
            return Ok(rows.into_iter().skip(offset).take(limit).collect());
        }
        Ok(rows)
    }

    async fn ask(&self, query: &str, _opts: &RequestOptions) -> Result<bool> {
        self.ask_log.lock().push(query.to_string());
        let rules = self.ask_rules.lock();
        Ok(rules
            .iter()
            .find(|rule| rule.needles.iter().all(|n| query.contains(n.as_str())))
            .map(|rule| rule.answer)
            .unwrap_or(false))
    }

    async fn update(&self, update: &str, _opts: &RequestOptions) -> Result<()> {
        if let Some(needle) = self.fail_update_needle.lock().as_ref() {
            if update.starts_with(needle.as_str()) {
                return Err(StoreError::Transport(format!(
                    "injected failure for update matching '{}'",
                    needle
                )));
            }
        }
        self.update_log.lock().push(update.to_string());
        Ok(())
    }
}
