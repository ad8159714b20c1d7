//! SPARQL gateway trait and HTTP implementation
//!
//! The engine never talks to a triple store directly; everything goes
//! through [`SparqlGateway`]. The HTTP implementation posts form-encoded
//! queries and updates, parses SPARQL JSON results, and retries transient
//! failures with exponential backoff when the caller opted in via
//! [`RequestOptions::may_retry`].

use crate::backoff::Backoff;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use pubgraph_core::triple::{Term, Triple};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Debug;

/// One result row: variable name to bound term
pub type Binding = HashMap<String, Term>;

/// Traffic class of a store request.
///
/// Downstream authorization and observability distinguish bootstrap traffic
/// from ongoing maintenance, so every request carries its class in a scope
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationScope {
    InitialSync,
    #[default]
    Maintenance,
}

/// Header name and values used to tag request scope
#[derive(Debug, Clone)]
pub struct ScopeHeaders {
    pub header: String,
    pub initial_sync: String,
    pub maintenance: String,
}

impl Default for ScopeHeaders {
    fn default() -> Self {
        Self {
            header: "mu-auth-scope".to_string(),
            initial_sync: "http://services.semantic.works/scope/initial-sync".to_string(),
            maintenance: "http://services.semantic.works/scope/publication-maintenance".to_string(),
        }
    }
}

impl ScopeHeaders {
    fn value_for(&self, scope: OperationScope) -> &str {
        match scope {
            OperationScope::InitialSync => &self.initial_sync,
            OperationScope::Maintenance => &self.maintenance,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Caller accepts transient-failure retry
    pub may_retry: bool,
    /// Traffic class, tagged onto the request as a scope header
    pub scope: OperationScope,
    /// Extra headers forwarded verbatim
    pub extra_headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// Retryable maintenance request, the common case for engine traffic
    pub fn retryable() -> Self {
        Self {
            may_retry: true,
            ..Self::default()
        }
    }

    /// Retryable request tagged as initial-sync traffic
    pub fn initial_sync() -> Self {
        Self {
            may_retry: true,
            scope: OperationScope::InitialSync,
            extra_headers: Vec::new(),
        }
    }
}

/// Retry schedule for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Read and write access to a SPARQL endpoint
#[async_trait]
pub trait SparqlGateway: Debug + Send + Sync {
    /// Run a SELECT query and return its rows
    async fn select(&self, query: &str, opts: &RequestOptions) -> Result<Vec<Binding>>;

    /// Run an ASK query
    async fn ask(&self, query: &str, opts: &RequestOptions) -> Result<bool>;

    /// Run an INSERT DATA / DELETE DATA update
    async fn update(&self, update: &str, opts: &RequestOptions) -> Result<()>;
}

/// Convert `?subject ?predicate ?object` rows into triples.
///
/// Rows missing one of the three variables or binding a literal subject or
/// predicate are skipped; the store should never produce them.
pub fn bindings_to_triples(rows: &[Binding]) -> Vec<Triple> {
    rows.iter()
        .filter_map(|row| {
            let subject = row.get("subject")?.as_uri()?.to_string();
            let predicate = row.get("predicate")?.as_uri()?.to_string();
            let object = row.get("object")?.clone();
            Some(Triple::new(subject, predicate, object))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SPARQL JSON results
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(default, rename = "xml:lang")]
    lang: Option<String>,
}

#[derive(Deserialize)]
struct SelectResults {
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Deserialize)]
struct SelectDocument {
    results: SelectResults,
}

#[derive(Deserialize)]
struct AskDocument {
    boolean: bool,
}

impl JsonTerm {
    fn into_term(self) -> Term {
        match self.kind.as_str() {
            "uri" => Term::uri(self.value),
            // Blank node labels pass through unchanged; export configurations
            // only ever match named resources.
            "bnode" => Term::uri(self.value),
            _ => Term::Literal {
                value: self.value,
                datatype: self.datatype,
                lang: self.lang,
            },
        }
    }
}

fn parse_select(body: &str) -> Result<Vec<Binding>> {
    let doc: SelectDocument = serde_json::from_str(body)
        .map_err(|e| StoreError::Results(format!("not a SELECT results document: {}", e)))?;
    Ok(doc
        .results
        .bindings
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(var, term)| (var, term.into_term()))
                .collect()
        })
        .collect())
}

fn parse_ask(body: &str) -> Result<bool> {
    let doc: AskDocument = serde_json::from_str(body)
        .map_err(|e| StoreError::Results(format!("not an ASK results document: {}", e)))?;
    Ok(doc.boolean)
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// HTTP gateway against a SPARQL 1.1 protocol endpoint
#[derive(Debug)]
pub struct HttpSparqlGateway {
    query_endpoint: String,
    update_endpoint: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    scopes: ScopeHeaders,
}

impl HttpSparqlGateway {
    /// Gateway using one endpoint for both queries and updates
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            query_endpoint: endpoint.clone(),
            update_endpoint: endpoint,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            scopes: ScopeHeaders::default(),
        }
    }

    /// Send updates to a separate endpoint
    pub fn with_update_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.update_endpoint = endpoint.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scope_headers(mut self, scopes: ScopeHeaders) -> Self {
        self.scopes = scopes;
        self
    }

    fn is_transient(error: &StoreError) -> bool {
        match error {
            StoreError::Transport(_) => true,
            StoreError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    async fn post_form(
        &self,
        endpoint: &str,
        field: &str,
        text: &str,
        opts: &RequestOptions,
    ) -> Result<String> {
        let mut req = self
            .http
            .post(endpoint)
            .header("Accept", "application/sparql-results+json")
            .header(&self.scopes.header, self.scopes.value_for(opts.scope));
        for (name, value) in &opts.extra_headers {
            req = req.header(name, value);
        }
        let resp = req.form(&[(field, text)]).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Run `request` with the retry schedule when the caller allows it.
    async fn with_retry<F, Fut, T>(&self, opts: &RequestOptions, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if !opts.may_retry {
            return request().await;
        }
        let mut backoff = Backoff::new(self.retry.base_delay_ms, self.retry.max_delay_ms);
        let mut attempt = 0u32;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(e) if Self::is_transient(&e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(StoreError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl SparqlGateway for HttpSparqlGateway {
    async fn select(&self, query: &str, opts: &RequestOptions) -> Result<Vec<Binding>> {
        let body = self
            .with_retry(opts, || {
                self.post_form(&self.query_endpoint, "query", query, opts)
            })
            .await?;
        parse_select(&body)
    }

    async fn ask(&self, query: &str, opts: &RequestOptions) -> Result<bool> {
        let body = self
            .with_retry(opts, || {
                self.post_form(&self.query_endpoint, "query", query, opts)
            })
            .await?;
        parse_ask(&body)
    }

    async fn update(&self, update: &str, opts: &RequestOptions) -> Result<()> {
        self.with_retry(opts, || {
            self.post_form(&self.update_endpoint, "update", update, opts)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_document() {
        let body = r#"{
            "head": {"vars": ["subject", "predicate", "object"]},
            "results": {"bindings": [{
                "subject": {"type": "uri", "value": "http://ex.org/s"},
                "predicate": {"type": "uri", "value": "http://ex.org/p"},
                "object": {"type": "literal", "value": "v", "xml:lang": "en"}
            }]}
        }"#;
        let rows = parse_select(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["subject"], Term::uri("http://ex.org/s"));
        assert_eq!(rows[0]["object"], Term::lang_literal("v", "en"));
    }

    #[test]
    fn test_parse_typed_literal() {
        let body = r#"{
            "results": {"bindings": [{
                "object": {"type": "typed-literal", "value": "3",
                           "datatype": "http://www.w3.org/2001/XMLSchema#integer"}
            }]}
        }"#;
        let rows = parse_select(body).unwrap();
        assert_eq!(
            rows[0]["object"],
            Term::typed_literal("3", "http://www.w3.org/2001/XMLSchema#integer")
        );
    }

    #[test]
    fn test_parse_ask_document() {
        assert!(parse_ask(r#"{"head": {}, "boolean": true}"#).unwrap());
        assert!(!parse_ask(r#"{"head": {}, "boolean": false}"#).unwrap());
        assert!(parse_ask("not json").is_err());
    }

    #[test]
    fn test_bindings_to_triples_skips_incomplete_rows() {
        let full: Binding = [
            ("subject".to_string(), Term::uri("http://ex.org/s")),
            ("predicate".to_string(), Term::uri("http://ex.org/p")),
            ("object".to_string(), Term::literal("v")),
        ]
        .into_iter()
        .collect();
        let missing: Binding = [("subject".to_string(), Term::uri("http://ex.org/s"))]
            .into_iter()
            .collect();
        let literal_subject: Binding = [
            ("subject".to_string(), Term::literal("nope")),
            ("predicate".to_string(), Term::uri("http://ex.org/p")),
            ("object".to_string(), Term::literal("v")),
        ]
        .into_iter()
        .collect();

        let triples = bindings_to_triples(&[full, missing, literal_subject]);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].subject, "http://ex.org/s");
    }
}
