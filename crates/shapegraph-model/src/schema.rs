//! Compiled schema: an arena of shape and triple expressions.
//!
//! [`Schema::build`] turns the label-linked abstract syntax into two flat
//! tables indexed by [`ShapeId`] and [`TripleId`]. Every cross reference is an
//! index into those tables, so traversal always goes through the schema and
//! recursive definitions are plain integers rather than owning pointers.
//!
//! Build also registers the *rules* of the schema: the shape expressions a
//! typing may hold verdicts for. Rules are every labelled shape expression plus
//! one anonymous rule per triple-constraint value that is not already a
//! reference, so "does `v` satisfy the value of this constraint" is always a
//! `(node, rule)` lookup.

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::ast::{ShapeExpr, ShapeLabel, TripleExpr, TripleLabel};
use crate::error::{Result, SchemaError};
use crate::interval::Interval;
use crate::node::Iri;
use crate::node_constraint::NodeConstraint;
use crate::property::{Direction, Property};

/// Index of a shape expression in the schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ShapeId(u32);

impl ShapeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a triple expression in the schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TripleId(u32);

impl TripleId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShape {
    pub expression: TripleId,
    pub extra: BTreeSet<Iri>,
    pub closed: bool,
}

impl CompiledShape {
    pub fn is_extra(&self, property: &Property) -> bool {
        property.direction == Direction::Forward && self.extra.contains(&property.iri)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    And(Vec<ShapeId>),
    Or(Vec<ShapeId>),
    Not(ShapeId),
    Shape(CompiledShape),
    NodeConstraint(NodeConstraint),
    Ref(ShapeId),
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    pub label: Option<ShapeLabel>,
    pub kind: ShapeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripleKind {
    EachOf(Vec<TripleId>),
    OneOf(Vec<TripleId>),
    /// `value` is always a rule of the schema.
    Constraint { property: Property, value: ShapeId },
    Repeated { expr: TripleId, cardinality: Interval },
    Empty,
    Ref(TripleId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripleNode {
    pub label: Option<TripleLabel>,
    pub kind: TripleKind,
}

/// Per-shape facts computed once at build time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeFacts {
    /// Triple constraints reachable from the shape's expression, references
    /// followed, in depth-first order.
    pub constraints: Vec<TripleId>,
    pub mentioned: BTreeSet<Property>,
    pub uses_inverse: bool,
}

impl ShapeFacts {
    pub fn mentions(&self, property: &Property) -> bool {
        self.mentioned.contains(property)
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    shapes: Vec<ShapeNode>,
    triples: Vec<TripleNode>,
    shape_labels: AHashMap<ShapeLabel, ShapeId>,
    triple_labels: AHashMap<TripleLabel, TripleId>,
    rules: Vec<ShapeId>,
    is_rule: Vec<bool>,
    facts: AHashMap<ShapeId, ShapeFacts>,
    mentioned: BTreeSet<Property>,
    uses_inverse: bool,
}

impl Schema {
    /// Compile `(label, expression)` definitions into a schema.
    ///
    /// Fails on label collisions, unknown references, malformed cardinalities,
    /// recursive triple expression references and shape reference cycles that
    /// never pass through a triple constraint.
    pub fn build<I, L>(definitions: I) -> Result<Schema>
    where
        I: IntoIterator<Item = (L, ShapeExpr)>,
        L: Into<ShapeLabel>,
    {
        let definitions: Vec<ShapeExpr> = definitions
            .into_iter()
            .map(|(label, expr)| {
                let label = label.into();
                match expr.label() {
                    Some(declared) if *declared == label => Ok(expr),
                    Some(declared) => Err(SchemaError::LabelMismatch {
                        label,
                        declared: declared.clone(),
                    }),
                    None => Ok(expr.labeled(label)),
                }
            })
            .collect::<Result<_>>()?;

        let mut builder = Builder::default();
        for expr in &definitions {
            builder.reserve_shape(expr)?;
        }
        for expr in &definitions {
            builder.compile_shape(expr)?;
        }
        let schema = builder.finish()?;
        schema.check_triple_cycles()?;
        schema.check_reference_cycles()?;
        Ok(schema.with_facts())
    }

    pub fn shape(&self, id: ShapeId) -> &ShapeNode {
        &self.shapes[id.index()]
    }

    pub fn triple(&self, id: TripleId) -> &TripleNode {
        &self.triples[id.index()]
    }

    pub fn shape_id(&self, label: &ShapeLabel) -> Option<ShapeId> {
        self.shape_labels.get(label).copied()
    }

    pub fn triple_id(&self, label: &TripleLabel) -> Option<TripleId> {
        self.triple_labels.get(label).copied()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn triple_count(&self) -> usize {
        self.triples.len()
    }

    pub fn shape_ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        (0..self.shapes.len() as u32).map(ShapeId)
    }

    /// Shapes a typing holds verdicts for, in increasing id order.
    pub fn rules(&self) -> &[ShapeId] {
        &self.rules
    }

    pub fn is_rule(&self, id: ShapeId) -> bool {
        self.is_rule[id.index()]
    }

    /// Facts for an atomic `Shape` node; `None` for every other kind.
    pub fn facts(&self, id: ShapeId) -> Option<&ShapeFacts> {
        self.facts.get(&id)
    }

    /// Every property mentioned by any triple constraint of the schema.
    pub fn mentioned_properties(&self) -> &BTreeSet<Property> {
        &self.mentioned
    }

    pub fn uses_inverse(&self) -> bool {
        self.uses_inverse
    }

    /// Human-readable name for diagnostics: the label, or `_:s<n>` for
    /// anonymous expressions.
    pub fn display_label(&self, id: ShapeId) -> String {
        match &self.shape(id).label {
            Some(label) => label.as_str().to_string(),
            None => format!("_:s{}", id.raw()),
        }
    }

    /// Whether the triple expression can match the empty neighbourhood.
    pub fn is_nullable(&self, id: TripleId) -> bool {
        match &self.triple(id).kind {
            TripleKind::EachOf(exprs) => exprs.iter().all(|e| self.is_nullable(*e)),
            TripleKind::OneOf(exprs) => exprs.iter().any(|e| self.is_nullable(*e)),
            TripleKind::Constraint { .. } => false,
            TripleKind::Repeated { expr, cardinality } => {
                cardinality.min == 0 || self.is_nullable(*expr)
            }
            TripleKind::Empty => true,
            TripleKind::Ref(target) => self.is_nullable(*target),
        }
    }

    fn triple_children(&self, id: TripleId) -> Vec<TripleId> {
        match &self.triple(id).kind {
            TripleKind::EachOf(exprs) | TripleKind::OneOf(exprs) => exprs.clone(),
            TripleKind::Repeated { expr, .. } => vec![*expr],
            TripleKind::Ref(target) => vec![*target],
            TripleKind::Constraint { .. } | TripleKind::Empty => Vec::new(),
        }
    }

    fn shape_children(&self, id: ShapeId) -> Vec<ShapeId> {
        match &self.shape(id).kind {
            ShapeKind::And(exprs) | ShapeKind::Or(exprs) => exprs.clone(),
            ShapeKind::Not(expr) | ShapeKind::Ref(expr) => vec![*expr],
            ShapeKind::Shape(_) | ShapeKind::NodeConstraint(_) | ShapeKind::External => Vec::new(),
        }
    }

    fn check_triple_cycles(&self) -> Result<()> {
        let cycle = find_cycle(self.triples.len(), |i| {
            self.triple_children(TripleId(i as u32))
                .into_iter()
                .map(TripleId::index)
                .collect()
        });
        match cycle {
            Some(node) => {
                let id = TripleId(node as u32);
                let label = self
                    .triple(id)
                    .label
                    .clone()
                    .unwrap_or_else(|| TripleLabel::new(format!("_:t{}", id.raw())));
                Err(SchemaError::RecursiveTripleExpr { label })
            }
            None => Ok(()),
        }
    }

    /// Cycles made only of boolean connectives and references would have no
    /// well-founded meaning, and would make direct evaluation diverge.
    fn check_reference_cycles(&self) -> Result<()> {
        let cycle = find_cycle(self.shapes.len(), |i| {
            self.shape_children(ShapeId(i as u32))
                .into_iter()
                .map(ShapeId::index)
                .collect()
        });
        match cycle {
            Some(node) => Err(SchemaError::ReferenceCycle {
                label: self.display_label(ShapeId(node as u32)),
            }),
            None => Ok(()),
        }
    }

    fn with_facts(mut self) -> Self {
        let mut facts = AHashMap::new();
        for id in self.shape_ids() {
            let ShapeKind::Shape(shape) = &self.shape(id).kind else {
                continue;
            };
            let mut constraints = Vec::new();
            self.collect_constraints(shape.expression, &mut constraints);
            let mut mentioned = BTreeSet::new();
            for tc in &constraints {
                if let TripleKind::Constraint { property, .. } = &self.triple(*tc).kind {
                    mentioned.insert(property.clone());
                }
            }
            let uses_inverse = mentioned.iter().any(Property::is_inverse);
            facts.insert(
                id,
                ShapeFacts {
                    constraints,
                    mentioned,
                    uses_inverse,
                },
            );
        }

        self.mentioned = facts
            .values()
            .flat_map(|f| f.mentioned.iter().cloned())
            .collect();
        self.uses_inverse = self.mentioned.iter().any(Property::is_inverse);
        self.facts = facts;
        self
    }

    fn collect_constraints(&self, id: TripleId, out: &mut Vec<TripleId>) {
        if let TripleKind::Constraint { .. } = self.triple(id).kind {
            out.push(id);
            return;
        }
        for child in self.triple_children(id) {
            self.collect_constraints(child, out);
        }
    }
}

/// Iterative three-colour DFS. Returns a node lying on some cycle.
fn find_cycle(len: usize, children: impl Fn(usize) -> Vec<usize>) -> Option<usize> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    let mut colour = vec![Colour::White; len];
    for root in 0..len {
        if colour[root] != Colour::White {
            continue;
        }
        let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, children(root))];
        colour[root] = Colour::Grey;
        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(next) => match colour[next] {
                    Colour::Grey => return Some(next),
                    Colour::White => {
                        colour[next] = Colour::Grey;
                        let next_children = children(next);
                        stack.push((next, next_children));
                    }
                    Colour::Black => {}
                },
                None => {
                    colour[node] = Colour::Black;
                    stack.pop();
                }
            }
        }
    }
    None
}

#[derive(Default)]
struct Builder {
    shapes: Vec<Option<ShapeNode>>,
    triples: Vec<Option<TripleNode>>,
    shape_labels: AHashMap<ShapeLabel, ShapeId>,
    triple_labels: AHashMap<TripleLabel, TripleId>,
    rules: AHashSet<ShapeId>,
}

impl Builder {
    /// Pass 1: give every labelled expression its id so references can be
    /// resolved regardless of definition order.
    fn reserve_shape(&mut self, expr: &ShapeExpr) -> Result<()> {
        if let Some(label) = expr.label() {
            if self.shape_labels.contains_key(label) {
                return Err(SchemaError::DuplicateShapeLabel {
                    label: label.clone(),
                });
            }
            let id = self.push_shape(None);
            self.shape_labels.insert(label.clone(), id);
            self.rules.insert(id);
        }
        match expr {
            ShapeExpr::And { exprs, .. } | ShapeExpr::Or { exprs, .. } => {
                for e in exprs {
                    self.reserve_shape(e)?;
                }
            }
            ShapeExpr::Not { expr, .. } => self.reserve_shape(expr)?,
            ShapeExpr::Shape { shape, .. } => {
                if let Some(te) = &shape.expression {
                    self.reserve_triple(te)?;
                }
            }
            ShapeExpr::NodeConstraint { .. } | ShapeExpr::Ref { .. } | ShapeExpr::External { .. } => {}
        }
        Ok(())
    }

    fn reserve_triple(&mut self, expr: &TripleExpr) -> Result<()> {
        if let Some(label) = expr.label() {
            if self.triple_labels.contains_key(label) {
                return Err(SchemaError::DuplicateTripleLabel {
                    label: label.clone(),
                });
            }
            let id = self.push_triple(None);
            self.triple_labels.insert(label.clone(), id);
        }
        match expr {
            TripleExpr::EachOf { exprs, .. } | TripleExpr::OneOf { exprs, .. } => {
                for e in exprs {
                    self.reserve_triple(e)?;
                }
            }
            TripleExpr::Repeated { expr, .. } => self.reserve_triple(expr)?,
            TripleExpr::Constraint {
                value: Some(value), ..
            } => self.reserve_shape(value)?,
            TripleExpr::Constraint { value: None, .. }
            | TripleExpr::Empty { .. }
            | TripleExpr::Ref { .. } => {}
        }
        Ok(())
    }

    /// Pass 2: fill the arena.
    fn compile_shape(&mut self, expr: &ShapeExpr) -> Result<ShapeId> {
        let id = match expr.label() {
            Some(label) => self.shape_labels[label],
            None => self.push_shape(None),
        };

        let kind = match expr {
            ShapeExpr::And { exprs, .. } => ShapeKind::And(self.compile_shapes(exprs)?),
            ShapeExpr::Or { exprs, .. } => ShapeKind::Or(self.compile_shapes(exprs)?),
            ShapeExpr::Not { expr, .. } => ShapeKind::Not(self.compile_shape(expr)?),
            ShapeExpr::Shape { shape, .. } => {
                let expression = match &shape.expression {
                    Some(te) => self.compile_triple(te)?,
                    None => self.push_triple(Some(TripleNode {
                        label: None,
                        kind: TripleKind::Empty,
                    })),
                };
                ShapeKind::Shape(CompiledShape {
                    expression,
                    extra: shape.extra.clone(),
                    closed: shape.closed,
                })
            }
            ShapeExpr::NodeConstraint { constraint, .. } => {
                ShapeKind::NodeConstraint(constraint.clone())
            }
            ShapeExpr::Ref { target } => ShapeKind::Ref(self.resolve_shape(target)?),
            ShapeExpr::External { .. } => ShapeKind::External,
        };

        self.shapes[id.index()] = Some(ShapeNode {
            label: expr.label().cloned(),
            kind,
        });
        Ok(id)
    }

    fn compile_shapes(&mut self, exprs: &[ShapeExpr]) -> Result<Vec<ShapeId>> {
        exprs.iter().map(|e| self.compile_shape(e)).collect()
    }

    fn compile_triple(&mut self, expr: &TripleExpr) -> Result<TripleId> {
        if let TripleExpr::Ref { target } = expr {
            let target = self.resolve_triple(target)?;
            return Ok(self.push_triple(Some(TripleNode {
                label: None,
                kind: TripleKind::Ref(target),
            })));
        }

        let id = match expr.label() {
            Some(label) => self.triple_labels[label],
            None => self.push_triple(None),
        };

        let kind = match expr {
            TripleExpr::EachOf { exprs, .. } => TripleKind::EachOf(self.compile_triples(exprs)?),
            TripleExpr::OneOf { exprs, .. } => TripleKind::OneOf(self.compile_triples(exprs)?),
            TripleExpr::Constraint {
                property, value, ..
            } => {
                let value = match value.as_deref() {
                    Some(ShapeExpr::Ref { target }) => self.resolve_shape(target)?,
                    Some(value) => self.compile_shape(value)?,
                    None => self.push_shape(Some(ShapeNode {
                        label: None,
                        kind: ShapeKind::NodeConstraint(NodeConstraint::any()),
                    })),
                };
                self.rules.insert(value);
                TripleKind::Constraint {
                    property: property.clone(),
                    value,
                }
            }
            TripleExpr::Repeated {
                expr, cardinality, ..
            } => {
                if cardinality.is_empty() {
                    return Err(SchemaError::MalformedCardinality {
                        cardinality: *cardinality,
                    });
                }
                TripleKind::Repeated {
                    expr: self.compile_triple(expr)?,
                    cardinality: *cardinality,
                }
            }
            TripleExpr::Empty { .. } => TripleKind::Empty,
            TripleExpr::Ref { .. } => {
                return Err(SchemaError::Internal {
                    message: "triple reference reached the compiler".to_string(),
                })
            }
        };

        self.triples[id.index()] = Some(TripleNode {
            label: expr.label().cloned(),
            kind,
        });
        Ok(id)
    }

    fn compile_triples(&mut self, exprs: &[TripleExpr]) -> Result<Vec<TripleId>> {
        exprs.iter().map(|e| self.compile_triple(e)).collect()
    }

    fn resolve_shape(&self, label: &ShapeLabel) -> Result<ShapeId> {
        self.shape_labels
            .get(label)
            .copied()
            .ok_or_else(|| SchemaError::UnknownShapeLabel {
                label: label.clone(),
            })
    }

    fn resolve_triple(&self, label: &TripleLabel) -> Result<TripleId> {
        self.triple_labels
            .get(label)
            .copied()
            .ok_or_else(|| SchemaError::UnknownTripleLabel {
                label: label.clone(),
            })
    }

    fn push_shape(&mut self, node: Option<ShapeNode>) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(node);
        id
    }

    fn push_triple(&mut self, node: Option<TripleNode>) -> TripleId {
        let id = TripleId(self.triples.len() as u32);
        self.triples.push(node);
        id
    }

    fn finish(self) -> Result<Schema> {
        let missing = || SchemaError::Internal {
            message: "reserved expression was never compiled".to_string(),
        };
        let shapes: Vec<ShapeNode> = self
            .shapes
            .into_iter()
            .collect::<Option<_>>()
            .ok_or_else(missing)?;
        let triples: Vec<TripleNode> = self
            .triples
            .into_iter()
            .collect::<Option<_>>()
            .ok_or_else(missing)?;

        let mut is_rule = vec![false; shapes.len()];
        for id in &self.rules {
            is_rule[id.index()] = true;
        }
        let rules = (0..shapes.len() as u32)
            .map(ShapeId)
            .filter(|id| is_rule[id.index()])
            .collect();

        Ok(Schema {
            shapes,
            triples,
            shape_labels: self.shape_labels,
            triple_labels: self.triple_labels,
            rules,
            is_rule,
            facts: AHashMap::new(),
            mentioned: BTreeSet::new(),
            uses_inverse: false,
        })
    }
}
