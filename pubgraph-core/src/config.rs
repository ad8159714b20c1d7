//! Parsed export configuration
//!
//! The engine consumes a configuration that has already been read from
//! whatever file format the host process uses; this module only defines the
//! shape, the load-time validation, and the typed filter expression AST.
//!
//! Filter expressions are deliberately not free-form strings. They bind a
//! fixed set of variables ([`FilterVar`]) so the variable-naming contract
//! between configuration and generated queries is enforced by the type
//! system instead of by convention.

use crate::triple::Term;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Configuration errors, fatal at load time
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An entry declares a path to the concept scheme but none is configured
    #[error("export entry for <{0}> has a concept-scheme path but no concept scheme is configured")]
    MissingConceptScheme(String),

    /// An entry exports no properties
    #[error("export entry for <{0}> declares no properties")]
    EmptyProperties(String),

    /// A graph filter pattern does not compile
    #[error("invalid graph filter pattern '{pattern}': {source}")]
    InvalidGraphPattern {
        pattern: String,
        source: regex::Error,
    },

    /// No export entries at all
    #[error("export configuration contains no entries")]
    NoEntries,
}

/// One step in a predicate path.
///
/// An inverse segment traverses against the triple's natural direction and is
/// written with a `^` prefix in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PathSegment {
    Forward(String),
    Inverse(String),
}

impl PathSegment {
    /// Parse the conventional string form; `^` marks an inverse segment.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('^') {
            Some(uri) => PathSegment::Inverse(uri.to_string()),
            None => PathSegment::Forward(raw.to_string()),
        }
    }

    /// The predicate URI, direction stripped
    pub fn predicate(&self) -> &str {
        match self {
            PathSegment::Forward(uri) | PathSegment::Inverse(uri) => uri,
        }
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, PathSegment::Inverse(_))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Forward(uri) => write!(f, "{}", uri),
            PathSegment::Inverse(uri) => write!(f, "^{}", uri),
        }
    }
}

impl TryFrom<String> for PathSegment {
    type Error = std::convert::Infallible;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Ok(PathSegment::parse(&raw))
    }
}

impl From<PathSegment> for String {
    fn from(seg: PathSegment) -> String {
        seg.to_string()
    }
}

/// Accepts or rejects a source graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFilter {
    /// Literal graph URI match
    Exact(String),
    /// Regex over the graph URI
    Pattern(String),
}

/// Variables a filter expression may bind.
///
/// These are the only variables the generated scope and export queries
/// expose, so a filter cannot reference anything the query does not bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterVar {
    Subject,
    Predicate,
    Object,
    Graph,
}

impl FilterVar {
    /// SPARQL variable name, without the leading `?`
    pub fn name(self) -> &'static str {
        match self {
            FilterVar::Subject => "subject",
            FilterVar::Predicate => "predicate",
            FilterVar::Object => "object",
            FilterVar::Graph => "graph",
        }
    }
}

/// One position of a triple pattern inside an `EXISTS` filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternTerm {
    Var(FilterVar),
    Uri(String),
    Term(Term),
}

/// A triple pattern usable inside an `EXISTS` filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

/// Additional-filter expression AST.
///
/// Rendered to a SPARQL `FILTER` clause by the store crate; construction is
/// data-only so configurations stay serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterExpr {
    Eq(FilterVar, Term),
    Ne(FilterVar, Term),
    Regex(FilterVar, String),
    In(FilterVar, Vec<String>),
    Exists(TriplePattern),
    Not(Box<FilterExpr>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

/// One export configuration entry, anchored on an rdf:type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfigEntry {
    /// The rdf:type this entry applies to
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Exported predicates; inverse segments are re-emitted in forward form
    pub properties: Vec<PathSegment>,
    /// Predicate path from an entity of this type to the concept scheme.
    /// Empty means membership does not depend on reachability.
    #[serde(default)]
    pub path_to_concept_scheme: Vec<PathSegment>,
    /// Source graphs eligible for this entry. Empty accepts any graph
    /// except the publication graph itself.
    #[serde(default)]
    pub graphs_filter: Vec<GraphFilter>,
    /// Extra boolean constraint on candidate triples
    #[serde(default)]
    pub additional_filter: Option<FilterExpr>,
    /// Suppress the implicit type triple when the property loop already
    /// emits an equivalent one
    #[serde(default)]
    pub strict_type_export: bool,
}

/// The full export configuration for one publication graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Concept-scheme root every non-empty path must reach
    #[serde(default)]
    pub concept_scheme: Option<String>,
    /// Export entries, one or more per exported rdf:type
    pub export: Vec<ExportConfigEntry>,
    /// The derived graph this engine maintains
    pub publication_graph: String,
}

impl ExportConfig {
    /// Validate load-time invariants. A failure here must abort startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.export.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        for entry in &self.export {
            if entry.properties.is_empty() {
                return Err(ConfigError::EmptyProperties(entry.type_uri.clone()));
            }
            if !entry.path_to_concept_scheme.is_empty() && self.concept_scheme.is_none() {
                return Err(ConfigError::MissingConceptScheme(entry.type_uri.clone()));
            }
            for filter in &entry.graphs_filter {
                if let GraphFilter::Pattern(pattern) = filter {
                    regex::Regex::new(pattern).map_err(|source| {
                        ConfigError::InvalidGraphPattern {
                            pattern: pattern.clone(),
                            source,
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Indices of entries whose `type_uri` matches
    pub fn entries_for_type(&self, type_uri: &str) -> Vec<usize> {
        self.export
            .iter()
            .enumerate()
            .filter(|(_, e)| e.type_uri == type_uri)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn entry(&self, index: usize) -> &ExportConfigEntry {
        &self.export[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(type_uri: &str) -> ExportConfigEntry {
        ExportConfigEntry {
            type_uri: type_uri.to_string(),
            properties: vec![PathSegment::parse("http://ex.org/name")],
            path_to_concept_scheme: vec![],
            graphs_filter: vec![],
            additional_filter: None,
            strict_type_export: false,
        }
    }

    #[test]
    fn test_path_segment_parse() {
        assert_eq!(
            PathSegment::parse("http://ex.org/p"),
            PathSegment::Forward("http://ex.org/p".to_string())
        );
        assert_eq!(
            PathSegment::parse("^http://ex.org/p"),
            PathSegment::Inverse("http://ex.org/p".to_string())
        );
        assert_eq!(PathSegment::parse("^http://ex.org/p").predicate(), "http://ex.org/p");
    }

    #[test]
    fn test_validate_requires_concept_scheme_for_paths() {
        let mut e = entry("http://ex.org/Person");
        e.path_to_concept_scheme = vec![PathSegment::parse("http://ex.org/inScheme")];
        let cfg = ExportConfig {
            concept_scheme: None,
            export: vec![e],
            publication_graph: "http://ex.org/graphs/public".to_string(),
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingConceptScheme(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_properties() {
        let mut e = entry("http://ex.org/Person");
        e.properties.clear();
        let cfg = ExportConfig {
            concept_scheme: None,
            export: vec![e],
            publication_graph: "http://ex.org/graphs/public".to_string(),
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyProperties(_))));
    }

    #[test]
    fn test_validate_rejects_bad_graph_pattern() {
        let mut e = entry("http://ex.org/Person");
        e.graphs_filter = vec![GraphFilter::Pattern("(unclosed".to_string())];
        let cfg = ExportConfig {
            concept_scheme: None,
            export: vec![e],
            publication_graph: "http://ex.org/graphs/public".to_string(),
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidGraphPattern { .. })
        ));
    }

    #[test]
    fn test_entries_for_type_returns_all_matches() {
        let cfg = ExportConfig {
            concept_scheme: None,
            export: vec![
                entry("http://ex.org/Person"),
                entry("http://ex.org/Mandate"),
                entry("http://ex.org/Person"),
            ],
            publication_graph: "http://ex.org/graphs/public".to_string(),
        };
        assert_eq!(cfg.entries_for_type("http://ex.org/Person"), vec![0, 2]);
        assert_eq!(cfg.entries_for_type("http://ex.org/Nothing"), Vec::<usize>::new());
    }
}
