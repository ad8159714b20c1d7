//! Batched execution of large reads and writes
//!
//! Writes are chunked into bounded INSERT DATA / DELETE DATA updates with a
//! pacing delay between chunks; the delay protects the shared store from
//! overload and is not a correctness requirement. Reads are paginated with
//! OFFSET/LIMIT in a fixed row order after an initial count query.

use crate::error::{Result, StoreError};
use crate::gateway::{bindings_to_triples, RequestOptions, SparqlGateway};
use crate::sparql::{render_triple, render_uri};
use pubgraph_core::triple::Triple;
use std::sync::Arc;
use std::time::Duration;

/// Write operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Insert,
    Delete,
}

impl UpdateOp {
    fn keyword(self) -> &'static str {
        match self {
            UpdateOp::Insert => "INSERT DATA",
            UpdateOp::Delete => "DELETE DATA",
        }
    }
}

/// Chunked, paced store access on top of a gateway
#[derive(Debug, Clone)]
pub struct BatchedExecutor {
    gateway: Arc<dyn SparqlGateway>,
    batch_size: usize,
    delay: Duration,
}

impl BatchedExecutor {
    /// `batch_size` of zero disables chunking for reads (one unbounded
    /// query); writes treat zero as one single batch.
    pub fn new(gateway: Arc<dyn SparqlGateway>, batch_size: usize, delay: Duration) -> Self {
        Self {
            gateway,
            batch_size,
            delay,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn SparqlGateway> {
        &self.gateway
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Apply `triples` to `graph` in fixed-size batches.
    ///
    /// Returns the number of update operations issued: exactly
    /// `ceil(len / batch_size)`, zero for an empty input.
    pub async fn batched_update(
        &self,
        triples: &[Triple],
        graph: &str,
        op: UpdateOp,
        opts: &RequestOptions,
    ) -> Result<usize> {
        if triples.is_empty() {
            return Ok(0);
        }
        let chunk_size = if self.batch_size == 0 {
            triples.len()
        } else {
            self.batch_size
        };

        let mut issued = 0;
        for chunk in triples.chunks(chunk_size) {
            if issued > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let statements: Vec<String> = chunk.iter().map(render_triple).collect();
            let update = format!(
                "{} {{ GRAPH {} {{\n{}\n}} }}",
                op.keyword(),
                render_uri(graph),
                statements.join("\n")
            );
            self.gateway.update(&update, opts).await?;
            issued += 1;
        }
        tracing::debug!(
            total = triples.len(),
            batches = issued,
            graph = %graph,
            op = ?op,
            "batched update applied"
        );
        Ok(issued)
    }

    /// Fetch all `?subject ?predicate ?object` rows produced by `where_body`,
    /// paginating in subject/predicate/object order.
    pub async fn batched_query(
        &self,
        where_body: &str,
        opts: &RequestOptions,
    ) -> Result<Vec<Triple>> {
        let base = format!(
            "SELECT DISTINCT ?subject ?predicate ?object WHERE {{\n{}\n}}",
            where_body
        );

        if self.batch_size == 0 {
            let rows = self.gateway.select(&base, opts).await?;
            return Ok(bindings_to_triples(&rows));
        }

        let total = self.count(&base, opts).await?;
        let mut triples = Vec::with_capacity(total);
        let mut offset = 0;
        while offset < total {
            let page = format!(
                "{}\nORDER BY ?subject ?predicate ?object LIMIT {} OFFSET {}",
                base, self.batch_size, offset
            );
            let rows = self.gateway.select(&page, opts).await?;
            triples.extend(bindings_to_triples(&rows));
            offset += self.batch_size;
        }
        Ok(triples)
    }

    /// Like [`BatchedExecutor::batched_query`], but hands each page to
    /// `on_page` instead of accumulating, so peak memory stays proportional
    /// to the page size. Returns the total number of triples seen.
    pub async fn batched_query_pages<F>(
        &self,
        where_body: &str,
        opts: &RequestOptions,
        mut on_page: F,
    ) -> Result<usize>
    where
        F: FnMut(Vec<Triple>) -> std::io::Result<()>,
    {
        let base = format!(
            "SELECT DISTINCT ?subject ?predicate ?object WHERE {{\n{}\n}}",
            where_body
        );

        if self.batch_size == 0 {
            let rows = self.gateway.select(&base, opts).await?;
            let triples = bindings_to_triples(&rows);
            let seen = triples.len();
            on_page(triples)?;
            return Ok(seen);
        }

        let total = self.count(&base, opts).await?;
        let mut seen = 0;
        let mut offset = 0;
        while offset < total {
            let page = format!(
                "{}\nORDER BY ?subject ?predicate ?object LIMIT {} OFFSET {}",
                base, self.batch_size, offset
            );
            let rows = self.gateway.select(&page, opts).await?;
            let triples = bindings_to_triples(&rows);
            seen += triples.len();
            on_page(triples)?;
            offset += self.batch_size;
        }
        Ok(seen)
    }

    async fn count(&self, inner: &str, opts: &RequestOptions) -> Result<usize> {
        let query = format!("SELECT (COUNT(*) AS ?count) WHERE {{ {} }}", inner);
        let rows = self.gateway.select(&query, opts).await?;
        let value = rows
            .first()
            .and_then(|row| row.get("count"))
            .ok_or_else(|| StoreError::Results("count query returned no ?count".to_string()))?;
        match value {
            pubgraph_core::Term::Literal { value, .. } => value
                .parse()
                .map_err(|_| StoreError::Results(format!("unparseable count '{}'", value))),
            other => Err(StoreError::Results(format!(
                "count bound to non-literal {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{triple_rows, StubGateway};
    use pubgraph_core::triple::Term;

    fn triples(n: usize) -> Vec<Triple> {
        (0..n)
            .map(|i| {
                Triple::new(
                    format!("http://ex.org/s{:03}", i),
                    "http://ex.org/p",
                    Term::literal(format!("v{}", i)),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_exact_batch_boundary_issues_exactly_two_updates() {
        let gateway = Arc::new(StubGateway::new());
        let exec = BatchedExecutor::new(gateway.clone(), 100, Duration::ZERO);

        let issued = exec
            .batched_update(
                &triples(200),
                "http://ex.org/graphs/public",
                UpdateOp::Insert,
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(issued, 2);
        assert_eq!(gateway.updates().len(), 2);
    }

    #[tokio::test]
    async fn test_uneven_batches_round_up() {
        let gateway = Arc::new(StubGateway::new());
        let exec = BatchedExecutor::new(gateway.clone(), 100, Duration::ZERO);

        let issued = exec
            .batched_update(
                &triples(201),
                "http://ex.org/graphs/public",
                UpdateOp::Delete,
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(issued, 3);
        assert!(gateway.updates()[0].starts_with("DELETE DATA"));
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_updates() {
        let gateway = Arc::new(StubGateway::new());
        let exec = BatchedExecutor::new(gateway.clone(), 100, Duration::ZERO);

        let issued = exec
            .batched_update(
                &[],
                "http://ex.org/graphs/public",
                UpdateOp::Insert,
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(issued, 0);
        assert!(gateway.updates().is_empty());
    }

    #[tokio::test]
    async fn test_batched_query_paginates_and_concatenates() {
        let gateway = Arc::new(StubGateway::new());
        let data = triples(250);
        gateway.on_select(&["http://ex.org/p"], triple_rows(&data));

        let exec = BatchedExecutor::new(gateway.clone(), 100, Duration::ZERO);
        let fetched = exec
            .batched_query(
                "?subject <http://ex.org/p> ?object .",
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(fetched.len(), 250);
        // One count query plus three pages
        assert_eq!(gateway.selects().len(), 4);
        assert_eq!(fetched[0], data[0]);
        assert_eq!(fetched[249], data[249]);
    }

    #[tokio::test]
    async fn test_zero_batch_size_issues_single_unbounded_read() {
        let gateway = Arc::new(StubGateway::new());
        let data = triples(42);
        gateway.on_select(&["http://ex.org/p"], triple_rows(&data));

        let exec = BatchedExecutor::new(gateway.clone(), 0, Duration::ZERO);
        let fetched = exec
            .batched_query(
                "?subject <http://ex.org/p> ?object .",
                &RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(fetched.len(), 42);
        assert_eq!(gateway.selects().len(), 1);
        assert!(!gateway.selects()[0].contains("LIMIT"));
    }
}
