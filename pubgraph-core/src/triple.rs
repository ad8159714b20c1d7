//! RDF terms and triples with canonical lexical serialization
//!
//! Triple equality is defined on the canonical serialized form: two triples
//! are the same only if their N-Triples-shaped renderings match exactly. No
//! datatype or lexical normalization is performed, so `"1"^^xsd:int` and
//! `"01"^^xsd:int` are distinct triples. Structural equality on [`Triple`]
//! coincides with lexical equality because the rendering is injective.
//!
//! The serde representation follows the delta-payload wire format:
//! `{subject: {type: "uri", value}, predicate: {...}, object: {...}}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when decoding wire-format triples
#[derive(Debug, Error)]
pub enum TripleFormatError {
    /// Subject or predicate position held a literal
    #[error("expected a URI in the {0} position, got a literal")]
    NonUriPosition(&'static str),
}

/// A single RDF term: URI reference or literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    Uri {
        value: String,
    },
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
}

impl Term {
    /// URI term
    pub fn uri(value: impl Into<String>) -> Self {
        Term::Uri {
            value: value.into(),
        }
    }

    /// Plain literal without datatype or language tag
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// Typed literal
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    /// Language-tagged literal
    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, Term::Uri { .. })
    }

    /// The URI value, when this term is a URI
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Term::Uri { value } => Some(value),
            Term::Literal { .. } => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri { value } => write!(f, "<{}>", value),
            Term::Literal {
                value,
                datatype,
                lang,
            } => {
                write!(f, "\"{}\"", escape_literal(value))?;
                if let Some(lang) = lang {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{}>", dt)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Escape a literal value for N-Triples / SPARQL rendering.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Wire shape of a triple in delta payloads
#[derive(Serialize, Deserialize)]
struct WireTriple {
    subject: Term,
    predicate: Term,
    object: Term,
}

/// One subject/predicate/object fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireTriple", into = "WireTriple")]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: Term,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }

    /// Canonical lexical form, used as the identity of this triple in diffs
    /// and dump files. One N-Triples statement, no trailing newline.
    pub fn lexical_key(&self) -> String {
        self.to_string()
    }

    /// The object's URI value, when the object is a URI
    pub fn object_uri(&self) -> Option<&str> {
        self.object.as_uri()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}> <{}> {} .",
            self.subject, self.predicate, self.object
        )
    }
}

impl TryFrom<WireTriple> for Triple {
    type Error = TripleFormatError;

    fn try_from(w: WireTriple) -> Result<Self, Self::Error> {
        let subject = match w.subject {
            Term::Uri { value } => value,
            Term::Literal { .. } => return Err(TripleFormatError::NonUriPosition("subject")),
        };
        let predicate = match w.predicate {
            Term::Uri { value } => value,
            Term::Literal { .. } => return Err(TripleFormatError::NonUriPosition("predicate")),
        };
        Ok(Triple {
            subject,
            predicate,
            object: w.object,
        })
    }
}

impl From<Triple> for WireTriple {
    fn from(t: Triple) -> Self {
        WireTriple {
            subject: Term::uri(t.subject),
            predicate: Term::uri(t.predicate),
            object: t.object,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_object_rendering() {
        let t = Triple::new(
            "http://example.org/s",
            "http://example.org/p",
            Term::uri("http://example.org/o"),
        );
        assert_eq!(
            t.lexical_key(),
            "<http://example.org/s> <http://example.org/p> <http://example.org/o> ."
        );
    }

    #[test]
    fn test_literal_rendering_with_datatype_and_lang() {
        let typed = Triple::new(
            "http://example.org/s",
            "http://example.org/p",
            Term::typed_literal("42", "http://www.w3.org/2001/XMLSchema#integer"),
        );
        assert!(typed
            .lexical_key()
            .ends_with("\"42\"^^<http://www.w3.org/2001/XMLSchema#integer> ."));

        let tagged = Triple::new(
            "http://example.org/s",
            "http://example.org/p",
            Term::lang_literal("hallo", "nl"),
        );
        assert!(tagged.lexical_key().ends_with("\"hallo\"@nl ."));
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(escape_literal("a\"b"), "a\\\"b");
        assert_eq!(escape_literal("a\nb"), "a\\nb");
        assert_eq!(escape_literal("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_no_lexical_normalization() {
        let a = Triple::new(
            "http://example.org/s",
            "http://example.org/p",
            Term::typed_literal("2024-01-01T00:00:00Z", "http://www.w3.org/2001/XMLSchema#dateTime"),
        );
        let b = Triple::new(
            "http://example.org/s",
            "http://example.org/p",
            Term::typed_literal(
                "2024-01-01T00:00:00.000Z",
                "http://www.w3.org/2001/XMLSchema#dateTime",
            ),
        );
        // Varying fractional-second precision yields distinct triples here;
        // only store-side checks may treat them as logically equal.
        assert_ne!(a, b);
        assert_ne!(a.lexical_key(), b.lexical_key());
    }

    #[test]
    fn test_wire_roundtrip() {
        let json = r#"{
            "subject": {"type": "uri", "value": "http://example.org/s"},
            "predicate": {"type": "uri", "value": "http://example.org/p"},
            "object": {"type": "literal", "value": "v", "lang": "en"}
        }"#;
        let t: Triple = serde_json::from_str(json).unwrap();
        assert_eq!(t.subject, "http://example.org/s");
        assert_eq!(t.object, Term::lang_literal("v", "en"));

        let back = serde_json::to_value(&t).unwrap();
        assert_eq!(back["subject"]["type"], "uri");
        assert_eq!(back["object"]["lang"], "en");
    }

    #[test]
    fn test_wire_rejects_literal_subject() {
        let json = r#"{
            "subject": {"type": "literal", "value": "nope"},
            "predicate": {"type": "uri", "value": "http://example.org/p"},
            "object": {"type": "uri", "value": "http://example.org/o"}
        }"#;
        assert!(serde_json::from_str::<Triple>(json).is_err());
    }
}
