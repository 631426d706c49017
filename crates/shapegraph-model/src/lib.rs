//! Shapegraph data model
//!
//! Types shared by schema producers and the validator:
//!
//! - `node`, `property`, `graph`: the data graph and how it is read
//! - `ast`: shape and triple expressions as a parser produces them, linked by label
//! - `schema`: the compiled, index-linked arena the validator works on
//! - `interval`: cardinality intervals and their arithmetic
//!
//! Schemas are built once with [`Schema::build`], which rejects malformed or
//! ill-founded definitions up front. A built schema is immutable and can be
//! shared across threads.

pub mod ast;
pub mod error;
pub mod graph;
pub mod interval;
pub mod node;
pub mod node_constraint;
pub mod property;
pub mod schema;

pub use ast::{ShapeDef, ShapeExpr, ShapeLabel, TripleExpr, TripleLabel};
pub use error::{Result, SchemaError};
pub use graph::{Graph, MemoryGraph, Triple};
pub use interval::Interval;
pub use node::{vocab, Iri, Literal, Node};
pub use node_constraint::{
    Exclusion, NodeConstraint, NodeKind, NumericFacets, Pattern, Stem, StringFacets, ValueSetValue,
};
pub use property::{Direction, Property};
pub use schema::{
    CompiledShape, Schema, ShapeFacts, ShapeId, ShapeKind, ShapeNode, TripleId, TripleKind,
    TripleNode,
};
