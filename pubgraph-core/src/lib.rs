//! Core data model for the publication-graph maintenance engine
//!
//! This crate holds the types shared by every other crate in the workspace:
//!
//! - [`triple`]: RDF terms and triples, their canonical lexical serialization,
//!   and the delta-payload wire format
//! - [`changeset`]: insert/delete batches as they arrive from the change feed
//! - [`config`]: the parsed export configuration (type entries, predicate
//!   paths, graph filters, typed filter expressions)
//! - [`vocab`]: RDF and job/task vocabulary IRIs
//!
//! It deliberately contains no store access and no async code; those live in
//! `pubgraph-store` and above.

pub mod changeset;
pub mod config;
pub mod triple;
pub mod vocab;

pub use changeset::{ChangeSet, DeltaPayload};
pub use config::{
    ConfigError, ExportConfig, ExportConfigEntry, FilterExpr, FilterVar, GraphFilter, PathSegment,
    PatternTerm, TriplePattern,
};
pub use triple::{Term, Triple, TripleFormatError};
