//! SPARQL text rendering
//!
//! All query assembly funnels through this module. Configuration-supplied
//! values only enter queries through typed renderers ([`render_term`],
//! [`render_filter`], [`graph_filter_clause`], [`render_path`]), never by raw
//! string splicing, so a filter expression cannot escape its clause.

use pubgraph_core::config::{FilterExpr, FilterVar, GraphFilter, PathSegment, PatternTerm};
use pubgraph_core::triple::{escape_literal, Term, Triple};

/// Render a term as a SPARQL/N-Triples token.
pub fn render_term(term: &Term) -> String {
    term.to_string()
}

/// Render a URI token.
pub fn render_uri(uri: &str) -> String {
    format!("<{}>", uri)
}

/// Render a triple as one statement inside a data block.
pub fn render_triple(triple: &Triple) -> String {
    triple.to_string()
}

/// Render a predicate path as a SPARQL property path.
///
/// Inverse segments come out with the `^` operator, so
/// `[Forward(a), Inverse(b)]` renders as `<a>/^<b>`.
pub fn render_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|seg| match seg {
            PathSegment::Forward(uri) => render_uri(uri),
            PathSegment::Inverse(uri) => format!("^{}", render_uri(uri)),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Graph acceptance filter over `?graph`.
///
/// With no configured filters any graph is accepted except the publication
/// graph itself. Otherwise the clause is a disjunction of exact matches and
/// regex matches over the graph URI.
pub fn graph_filter_clause(filters: &[GraphFilter], publication_graph: &str) -> String {
    if filters.is_empty() {
        return format!("FILTER(?graph != {})", render_uri(publication_graph));
    }
    let alternatives: Vec<String> = filters
        .iter()
        .map(|f| match f {
            GraphFilter::Exact(uri) => format!("?graph = {}", render_uri(uri)),
            GraphFilter::Pattern(pattern) => {
                format!("regex(str(?graph), \"{}\")", escape_literal(pattern))
            }
        })
        .collect();
    format!("FILTER({})", alternatives.join(" || "))
}

fn render_var(var: FilterVar) -> String {
    format!("?{}", var.name())
}

fn render_pattern_term(term: &PatternTerm) -> String {
    match term {
        PatternTerm::Var(v) => render_var(*v),
        PatternTerm::Uri(uri) => render_uri(uri),
        PatternTerm::Term(t) => render_term(t),
    }
}

fn render_expr(expr: &FilterExpr) -> String {
    match expr {
        FilterExpr::Eq(var, term) => format!("{} = {}", render_var(*var), render_term(term)),
        FilterExpr::Ne(var, term) => format!("{} != {}", render_var(*var), render_term(term)),
        FilterExpr::Regex(var, pattern) => format!(
            "regex(str({}), \"{}\")",
            render_var(*var),
            escape_literal(pattern)
        ),
        FilterExpr::In(var, uris) => {
            let list: Vec<String> = uris.iter().map(|u| render_uri(u)).collect();
            format!("{} IN ({})", render_var(*var), list.join(", "))
        }
        FilterExpr::Exists(pattern) => format!(
            "EXISTS {{ {} {} {} }}",
            render_pattern_term(&pattern.subject),
            render_pattern_term(&pattern.predicate),
            render_pattern_term(&pattern.object)
        ),
        FilterExpr::Not(inner) => format!("!({})", render_expr(inner)),
        FilterExpr::And(parts) => {
            let rendered: Vec<String> = parts.iter().map(|p| format!("({})", render_expr(p))).collect();
            rendered.join(" && ")
        }
        FilterExpr::Or(parts) => {
            let rendered: Vec<String> = parts.iter().map(|p| format!("({})", render_expr(p))).collect();
            rendered.join(" || ")
        }
    }
}

/// Render a complete `FILTER(...)` clause for an additional filter.
pub fn render_filter(expr: &FilterExpr) -> String {
    format!("FILTER({})", render_expr(expr))
}

/// Path-reachability clause from a variable to the concept scheme.
///
/// `var` is the variable name without the leading `?`. Empty paths impose no
/// constraint and render to an empty string.
pub fn path_reach_clause(var: &str, path: &[PathSegment], concept_scheme: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    format!(
        "?{} {} {} .",
        var,
        render_path(path),
        render_uri(concept_scheme)
    )
}

/// Path-reachability clause from `?subject` to the concept scheme.
pub fn concept_scheme_clause(path: &[PathSegment], concept_scheme: &str) -> String {
    path_reach_clause("subject", path, concept_scheme)
}
