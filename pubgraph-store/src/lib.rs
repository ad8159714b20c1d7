//! Store access for the publication-graph maintenance engine
//!
//! # Architecture
//!
//! - [`gateway`]: the [`SparqlGateway`] trait and its HTTP implementation,
//!   including transient-failure retry
//! - [`backoff`]: exponential backoff utility used by the retry loop
//! - [`sparql`]: rendering of terms, graph filters, predicate paths and
//!   typed filter expressions into SPARQL text
//! - [`batch`]: the batched executor that chunks writes and paginates reads
//! - [`error`]: error types for store operations
//!
//! Everything above this crate talks to the store exclusively through
//! [`SparqlGateway`], so tests swap in scripted gateways and the engine never
//! notices.

pub mod backoff;
pub mod batch;
pub mod error;
pub mod gateway;
pub mod sparql;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::Backoff;
pub use batch::{BatchedExecutor, UpdateOp};
pub use error::{Result, StoreError};
pub use gateway::{
    bindings_to_triples, Binding, HttpSparqlGateway, OperationScope, RequestOptions, RetryPolicy,
    ScopeHeaders, SparqlGateway,
};
