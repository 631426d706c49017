//! Graph terms: IRIs, blank nodes and literals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known datatype and namespace IRIs.
pub mod vocab {
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

/// An absolute IRI. No normalisation is applied; equality is string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    /// Datatype IRI. Language-tagged literals carry `rdf:langString`.
    pub datatype: Iri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Literal {
    /// A plain `xsd:string` literal.
    pub fn string(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Iri::new(vocab::XSD_STRING),
            language: None,
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<Iri>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    /// A language-tagged string. Tags are stored lower-cased.
    pub fn lang(lexical: impl Into<String>, language: &str) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Iri::new(vocab::RDF_LANG_STRING),
            language: Some(language.to_ascii_lowercase()),
        }
    }
}

/// A node of the data graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Iri { iri: Iri },
    BlankNode { id: String },
    Literal { literal: Literal },
}

impl Node {
    pub fn iri(iri: impl Into<Iri>) -> Self {
        Node::Iri { iri: iri.into() }
    }

    pub fn bnode(id: impl Into<String>) -> Self {
        Node::BlankNode { id: id.into() }
    }

    pub fn literal(literal: Literal) -> Self {
        Node::Literal { literal }
    }

    /// Shorthand for a plain string literal node.
    pub fn string(lexical: impl Into<String>) -> Self {
        Node::Literal {
            literal: Literal::string(lexical),
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<Iri>) -> Self {
        Node::Literal {
            literal: Literal::typed(lexical, datatype),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal { .. })
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Node::Iri { iri } => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Literal { literal } => Some(literal),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Iri { iri } => write!(f, "{iri}"),
            Node::BlankNode { id } => write!(f, "_:{id}"),
            Node::Literal { literal } => match &literal.language {
                Some(lang) => write!(f, "{:?}@{lang}", literal.lexical),
                None if literal.datatype.as_str() == vocab::XSD_STRING => {
                    write!(f, "{:?}", literal.lexical)
                }
                None => write!(f, "{:?}^^{}", literal.lexical, literal.datatype),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_follows_ntriples_conventions() {
        assert_eq!(Node::iri("http://ex.org/a").to_string(), "<http://ex.org/a>");
        assert_eq!(Node::bnode("b0").to_string(), "_:b0");
        assert_eq!(Node::string("Alice").to_string(), "\"Alice\"");
        assert_eq!(
            Node::literal(Literal::lang("chat", "FR")).to_string(),
            "\"chat\"@fr"
        );
        assert_eq!(
            Node::typed("1", vocab::XSD_INTEGER).to_string(),
            "\"1\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn only_literals_are_literals() {
        assert!(Node::string("x").is_literal());
        assert!(!Node::iri("http://ex.org/x").is_literal());
        assert!(!Node::bnode("x").is_literal());
    }
}
