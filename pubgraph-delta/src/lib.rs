//! Incremental view maintenance for the publication graph
//!
//! Given a changeset from the source store's change feed, this crate decides
//! which triples enter or leave the publication graph, including cascading
//! effects: one changed triple can make other, unrelated-looking triples
//! newly eligible or ineligible for publication.
//!
//! # Pipeline
//!
//! - [`resolve`]: which export configuration entries apply to the URIs a
//!   changeset mentions
//! - [`scope`]: does a resource currently have a valid path to the concept
//!   scheme, in an eligible graph
//! - [`export`]: the full triple set a resource contributes under one entry
//! - [`cascade`]: closure of affected resources, worklist-driven
//! - [`fold`]: net effective change against live publication-graph state
//!
//! The change feed notifies after the source store has already applied a
//! changeset, so source reads here observe post-change state while the
//! publication graph still holds the previous view. The cascade relies on
//! that ordering.

pub mod cascade;
pub mod error;
pub mod export;
pub mod fold;
pub mod resolve;
pub mod scope;

pub use cascade::CascadePropagator;
pub use error::{DeltaError, Result};
pub use export::ResourceExporter;
pub use fold::ChangeFolder;
pub use resolve::{TypeCache, TypeResolver};
pub use scope::ScopeResolver;
