//! Shapegraph validation
//!
//! Decides, for every `(node, shape)` pair reachable from a focus node,
//! whether the node conforms to the shape. The pipeline, leaves first:
//!
//! - `sorbe`: triple expressions rewritten to single-occurrence form
//! - `matcher` and `bag`: edges matched to constraint instances, and the
//!   possible assignments enumerated
//! - `interval`: multiplicity check of one assignment
//! - `evaluate`: boolean combinators, references and atomic shapes
//! - `strata` and `validator`: the stratified refinement loop that removes
//!   pairs until each stratum is stable
//!
//! ```no_run
//! use shapegraph_model::{MemoryGraph, Node, Property, Schema, ShapeExpr, ShapeLabel, TripleExpr};
//! use shapegraph_validate::Validator;
//!
//! # fn main() -> shapegraph_validate::Result<()> {
//! let schema = Schema::build([(
//!     "Person",
//!     ShapeExpr::shape(TripleExpr::any(Property::forward("http://ex.org/name"))),
//! )])?;
//! let mut graph = MemoryGraph::new();
//! graph.add(Node::iri("http://ex.org/alice"), "http://ex.org/name", Node::string("Alice"));
//!
//! let validator = Validator::new(schema, graph)?;
//! assert!(validator.check(&Node::iri("http://ex.org/alice"), &ShapeLabel::new("Person"))?);
//! # Ok(())
//! # }
//! ```

pub mod bag;
pub mod error;
pub mod evaluate;
pub mod interval;
pub mod matcher;
pub mod node_constraint;
pub mod sorbe;
pub mod strata;
pub mod typing;
pub mod validator;

pub use bag::{Bag, BagIterator};
pub use error::{Result, ValidationError};
pub use evaluate::ShapeEvaluator;
pub use interval::interval_of;
pub use matcher::{collect_matching_constraints, neighbourhood, Neighbour};
pub use node_constraint::{NodeConstraintEvaluator, XsdNodeConstraints};
pub use sorbe::{generate, LabelGenerator, Sorbe, SorbeCache};
pub use strata::{compute_strata, Strata};
pub use typing::{NodeId, NodeIndex, Typing};
pub use validator::{Cancellation, ExternalShapes, Validator, ValidatorConfig};
