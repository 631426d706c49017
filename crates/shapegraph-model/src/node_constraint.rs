//! Node constraints: predicates over a single value node.
//!
//! These are plain data. Evaluation lives with the validator, which treats a
//! node constraint as a leaf: every populated component must hold (logical
//! AND), and the value set, when present, is a disjunction of its entries.

use serde::{Deserialize, Serialize};

use crate::node::{Iri, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Iri,
    BNode,
    Literal,
    NonLiteral,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_kind: Option<NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Iri>,
    #[serde(default)]
    pub string_facets: StringFacets,
    #[serde(default)]
    pub numeric_facets: NumericFacets,
    /// `None` places no restriction; `Some(vec![])` admits nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ValueSetValue>>,
}

impl NodeConstraint {
    /// The constraint satisfied by every node.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: NodeKind) -> Self {
        Self {
            node_kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn of_datatype(datatype: impl Into<Iri>) -> Self {
        Self {
            datatype: Some(datatype.into()),
            ..Self::default()
        }
    }

    pub fn one_of(values: Vec<ValueSetValue>) -> Self {
        Self {
            values: Some(values),
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, flags: Option<&str>) -> Self {
        self.string_facets.pattern = Some(Pattern {
            pattern: pattern.into(),
            flags: flags.map(str::to_string),
        });
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringFacets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
}

impl StringFacets {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A regular expression facet. Supported flags: `i`, `m`, `s`, `x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericFacets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_inclusive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_exclusive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inclusive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_exclusive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_digits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_digits: Option<u32>,
}

impl NumericFacets {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Stem of a stem range: either a prefix or the wildcard `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum Stem {
    Wildcard,
    Prefix(String),
}

/// Exclusion inside a stem range. Values are compared against the IRI string,
/// the literal's lexical form, or the language tag depending on the range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum Exclusion {
    Value(String),
    Stem(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSetValue {
    /// An explicit IRI or literal.
    Node { node: Node },
    IriStem { stem: String },
    IriStemRange { stem: Stem, exclusions: Vec<Exclusion> },
    LiteralStem { stem: String },
    LiteralStemRange { stem: Stem, exclusions: Vec<Exclusion> },
    Language { tag: String },
    LanguageStem { stem: String },
    LanguageStemRange { stem: Stem, exclusions: Vec<Exclusion> },
}

impl ValueSetValue {
    pub fn node(node: Node) -> Self {
        ValueSetValue::Node { node }
    }
}
