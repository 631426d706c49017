//! Abstract syntax of shape and triple expressions.
//!
//! This is the tree a schema parser hands over. Cross references are by label
//! only ([`ShapeExpr::Ref`], [`TripleExpr::Ref`]); they are resolved into
//! index lookups by [`crate::Schema::build`], so recursive and mutually
//! recursive definitions never form ownership cycles.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::node::Iri;
use crate::node_constraint::NodeConstraint;
use crate::property::Property;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeLabel(String);

impl ShapeLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<&str> for ShapeLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripleLabel(String);

impl TripleLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl From<&str> for TripleLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The body of an atomic `Shape`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeDef {
    /// `None` is the empty triple expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<TripleExpr>,
    /// Forward properties whose edges may appear without being matched.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub extra: BTreeSet<Iri>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeExpr {
    And {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<ShapeLabel>,
        exprs: Vec<ShapeExpr>,
    },
    Or {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<ShapeLabel>,
        exprs: Vec<ShapeExpr>,
    },
    Not {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<ShapeLabel>,
        expr: Box<ShapeExpr>,
    },
    Shape {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<ShapeLabel>,
        #[serde(flatten)]
        shape: ShapeDef,
    },
    NodeConstraint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<ShapeLabel>,
        constraint: NodeConstraint,
    },
    /// Reference to another labelled shape expression.
    Ref { target: ShapeLabel },
    /// A shape whose definition is supplied by the caller at validation time.
    External {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<ShapeLabel>,
    },
}

impl ShapeExpr {
    pub fn and(exprs: Vec<ShapeExpr>) -> Self {
        ShapeExpr::And { label: None, exprs }
    }

    pub fn or(exprs: Vec<ShapeExpr>) -> Self {
        ShapeExpr::Or { label: None, exprs }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: ShapeExpr) -> Self {
        ShapeExpr::Not {
            label: None,
            expr: Box::new(expr),
        }
    }

    /// An open shape over `expression`.
    pub fn shape(expression: TripleExpr) -> Self {
        ShapeExpr::Shape {
            label: None,
            shape: ShapeDef {
                expression: Some(expression),
                ..ShapeDef::default()
            },
        }
    }

    pub fn closed_shape(expression: TripleExpr) -> Self {
        ShapeExpr::Shape {
            label: None,
            shape: ShapeDef {
                expression: Some(expression),
                closed: true,
                ..ShapeDef::default()
            },
        }
    }

    pub fn from_def(shape: ShapeDef) -> Self {
        ShapeExpr::Shape { label: None, shape }
    }

    pub fn node_constraint(constraint: NodeConstraint) -> Self {
        ShapeExpr::NodeConstraint {
            label: None,
            constraint,
        }
    }

    pub fn reference(target: impl Into<ShapeLabel>) -> Self {
        ShapeExpr::Ref {
            target: target.into(),
        }
    }

    pub fn external() -> Self {
        ShapeExpr::External { label: None }
    }

    /// Attach a label. A reference cannot carry its own label, so labelling
    /// one wraps it in a single-member `And`.
    pub fn labeled(self, new_label: impl Into<ShapeLabel>) -> Self {
        let new_label = Some(new_label.into());
        match self {
            ShapeExpr::And { exprs, .. } => ShapeExpr::And {
                label: new_label,
                exprs,
            },
            ShapeExpr::Or { exprs, .. } => ShapeExpr::Or {
                label: new_label,
                exprs,
            },
            ShapeExpr::Not { expr, .. } => ShapeExpr::Not {
                label: new_label,
                expr,
            },
            ShapeExpr::Shape { shape, .. } => ShapeExpr::Shape {
                label: new_label,
                shape,
            },
            ShapeExpr::NodeConstraint { constraint, .. } => ShapeExpr::NodeConstraint {
                label: new_label,
                constraint,
            },
            ShapeExpr::External { .. } => ShapeExpr::External { label: new_label },
            reference @ ShapeExpr::Ref { .. } => ShapeExpr::And {
                label: new_label,
                exprs: vec![reference],
            },
        }
    }

    pub fn label(&self) -> Option<&ShapeLabel> {
        match self {
            ShapeExpr::And { label, .. }
            | ShapeExpr::Or { label, .. }
            | ShapeExpr::Not { label, .. }
            | ShapeExpr::Shape { label, .. }
            | ShapeExpr::NodeConstraint { label, .. }
            | ShapeExpr::External { label } => label.as_ref(),
            ShapeExpr::Ref { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TripleExpr {
    EachOf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<TripleLabel>,
        exprs: Vec<TripleExpr>,
    },
    OneOf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<TripleLabel>,
        exprs: Vec<TripleExpr>,
    },
    Constraint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<TripleLabel>,
        property: Property,
        /// `None` accepts any value node.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Box<ShapeExpr>>,
    },
    Repeated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<TripleLabel>,
        expr: Box<TripleExpr>,
        cardinality: Interval,
    },
    Empty {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<TripleLabel>,
    },
    Ref { target: TripleLabel },
}

impl TripleExpr {
    pub fn each_of(exprs: Vec<TripleExpr>) -> Self {
        TripleExpr::EachOf { label: None, exprs }
    }

    pub fn one_of(exprs: Vec<TripleExpr>) -> Self {
        TripleExpr::OneOf { label: None, exprs }
    }

    pub fn constraint(property: Property, value: ShapeExpr) -> Self {
        TripleExpr::Constraint {
            label: None,
            property,
            value: Some(Box::new(value)),
        }
    }

    /// A constraint on `property` with no restriction on the value.
    pub fn any(property: Property) -> Self {
        TripleExpr::Constraint {
            label: None,
            property,
            value: None,
        }
    }

    pub fn empty() -> Self {
        TripleExpr::Empty { label: None }
    }

    pub fn reference(target: impl Into<TripleLabel>) -> Self {
        TripleExpr::Ref {
            target: target.into(),
        }
    }

    pub fn repeat(self, cardinality: Interval) -> Self {
        TripleExpr::Repeated {
            label: None,
            expr: Box::new(self),
            cardinality,
        }
    }

    pub fn optional(self) -> Self {
        self.repeat(Interval::OPT)
    }

    pub fn star(self) -> Self {
        self.repeat(Interval::STAR)
    }

    pub fn plus(self) -> Self {
        self.repeat(Interval::PLUS)
    }

    /// Attach a label. Labelling a reference wraps it in a one-child `EachOf`.
    pub fn labeled(self, new_label: impl Into<TripleLabel>) -> Self {
        let new_label = Some(new_label.into());
        match self {
            TripleExpr::EachOf { exprs, .. } => TripleExpr::EachOf {
                label: new_label,
                exprs,
            },
            TripleExpr::OneOf { exprs, .. } => TripleExpr::OneOf {
                label: new_label,
                exprs,
            },
            TripleExpr::Constraint {
                property, value, ..
            } => TripleExpr::Constraint {
                label: new_label,
                property,
                value,
            },
            TripleExpr::Repeated {
                expr, cardinality, ..
            } => TripleExpr::Repeated {
                label: new_label,
                expr,
                cardinality,
            },
            TripleExpr::Empty { .. } => TripleExpr::Empty { label: new_label },
            reference @ TripleExpr::Ref { .. } => TripleExpr::EachOf {
                label: new_label,
                exprs: vec![reference],
            },
        }
    }

    pub fn label(&self) -> Option<&TripleLabel> {
        match self {
            TripleExpr::EachOf { label, .. }
            | TripleExpr::OneOf { label, .. }
            | TripleExpr::Constraint { label, .. }
            | TripleExpr::Repeated { label, .. }
            | TripleExpr::Empty { label } => label.as_ref(),
            TripleExpr::Ref { .. } => None,
        }
    }
}
