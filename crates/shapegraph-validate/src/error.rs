use shapegraph_model::{SchemaError, ShapeLabel};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no shape is labelled {label}")]
    UnknownShape { label: ShapeLabel },

    #[error("unsupported feature: {feature}")]
    UnsupportedFeature { feature: String },

    /// A value node was looked up in the typing without ever being seeded.
    /// Indicates a bug in candidate collection, not bad input.
    #[error("no typing entry for {node} against {shape}")]
    EvaluationInconsistency { node: String, shape: String },

    #[error("external shape {label} failed")]
    External {
        label: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("matching {node} against {shape} enumerated more than {limit} bags")]
    BagLimitExceeded {
        node: String,
        shape: String,
        limit: u64,
    },

    #[error("validation cancelled")]
    Cancelled,
}
