use thiserror::Error;

use crate::ast::{ShapeLabel, TripleLabel};
use crate::interval::Interval;

/// Result type for schema construction.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// A schema that cannot be validated against. Always fatal: no typing is
/// computed for a schema that fails any of these checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("shape label {label} is defined more than once")]
    DuplicateShapeLabel { label: ShapeLabel },

    #[error("triple expression label {label} is defined more than once")]
    DuplicateTripleLabel { label: TripleLabel },

    #[error("definition registered as {label} is labelled {declared}")]
    LabelMismatch {
        label: ShapeLabel,
        declared: ShapeLabel,
    },

    #[error("reference to unknown shape {label}")]
    UnknownShapeLabel { label: ShapeLabel },

    #[error("reference to unknown triple expression {label}")]
    UnknownTripleLabel { label: TripleLabel },

    #[error("malformed cardinality {cardinality:?}: min must not exceed max")]
    MalformedCardinality { cardinality: Interval },

    #[error("triple expression {label} refers to itself")]
    RecursiveTripleExpr { label: TripleLabel },

    #[error("shape {label} refers to itself without going through a triple constraint")]
    ReferenceCycle { label: String },

    #[error("shapes {labels:?} depend on each other through negation")]
    NegationCycle { labels: Vec<String> },

    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("internal schema error: {message}")]
    Internal { message: String },
}
