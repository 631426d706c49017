//! Single-occurrence regular bag expressions.
//!
//! [`generate`] rewrites a triple expression so that every triple constraint
//! occurs at most once and repetition is only expressed by `?`, `*` and `+`.
//! Triple expression references are substituted by fresh copies of their
//! referents; shape references inside constraint values stay references.
//!
//! The result is a flat arena in post-order (children before parents), with
//! constraint instances numbered in depth-first order so each node covers a
//! contiguous range of instance indexes.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use shapegraph_model::{Interval, Property, Schema, ShapeId, TripleId, TripleKind};
use tracing::trace;

/// Label of a node produced by [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntheticLabel(u64);

impl SyntheticLabel {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SyntheticLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:sorbe{}", self.0)
    }
}

/// Monotonic source of [`SyntheticLabel`]s.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    next: u64,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> SyntheticLabel {
        let label = SyntheticLabel(self.next);
        self.next += 1;
        label
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SorbeKind {
    EachOf(Vec<usize>),
    OneOf(Vec<usize>),
    /// One occurrence of a schema triple constraint.
    Constraint { source: TripleId, index: usize },
    /// Cardinality is always `?`, `*` or `+`.
    Repeated { inner: usize, cardinality: Interval },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SorbeNode {
    pub label: SyntheticLabel,
    pub kind: SorbeKind,
    pub nullable: bool,
    /// Constraint instances under this node.
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct Sorbe {
    nodes: Vec<SorbeNode>,
    root: usize,
    constraints: Vec<TripleId>,
    properties: Vec<Property>,
    values: Vec<ShapeId>,
}

impl Sorbe {
    pub fn nodes(&self) -> &[SorbeNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &SorbeNode {
        &self.nodes[index]
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Schema constraint behind instance `index`.
    pub fn source(&self, index: usize) -> TripleId {
        self.constraints[index]
    }

    pub fn property(&self, index: usize) -> &Property {
        &self.properties[index]
    }

    /// Value rule of instance `index`.
    pub fn value(&self, index: usize) -> ShapeId {
        self.values[index]
    }
}

/// Build the SORBE form of `expression`.
pub fn generate(schema: &Schema, expression: TripleId, labels: &mut LabelGenerator) -> Sorbe {
    let mut gen = Generator {
        schema,
        labels,
        nodes: Vec::new(),
        constraints: Vec::new(),
    };
    let root = gen.visit(expression);

    let mut properties = Vec::with_capacity(gen.constraints.len());
    let mut values = Vec::with_capacity(gen.constraints.len());
    for source in &gen.constraints {
        if let TripleKind::Constraint { property, value } = &schema.triple(*source).kind {
            properties.push(property.clone());
            values.push(*value);
        }
    }

    Sorbe {
        nodes: gen.nodes,
        root,
        constraints: gen.constraints,
        properties,
        values,
    }
}

struct Generator<'a> {
    schema: &'a Schema,
    labels: &'a mut LabelGenerator,
    nodes: Vec<SorbeNode>,
    constraints: Vec<TripleId>,
}

impl Generator<'_> {
    fn visit(&mut self, id: TripleId) -> usize {
        let start = self.constraints.len();
        match &self.schema.triple(id).kind {
            TripleKind::EachOf(exprs) => {
                let children: Vec<usize> = exprs.iter().map(|e| self.visit(*e)).collect();
                self.each_of(children, start)
            }
            TripleKind::OneOf(exprs) => {
                let children: Vec<usize> = exprs.iter().map(|e| self.visit(*e)).collect();
                let nullable = children.iter().any(|c| self.nodes[*c].nullable);
                self.push(SorbeKind::OneOf(children), nullable, start)
            }
            TripleKind::Constraint { .. } => {
                let index = self.constraints.len();
                self.constraints.push(id);
                self.push(SorbeKind::Constraint { source: id, index }, false, start)
            }
            TripleKind::Empty => self.push(SorbeKind::Empty, true, start),
            TripleKind::Ref(target) => self.visit(*target),
            TripleKind::Repeated { expr, cardinality } => self.repeated(*expr, *cardinality),
        }
    }

    fn repeated(&mut self, expr: TripleId, cardinality: Interval) -> usize {
        let start = self.constraints.len();

        if cardinality == Interval::OPT || cardinality == Interval::STAR {
            let inner = self.visit(expr);
            return self.push(SorbeKind::Repeated { inner, cardinality }, true, start);
        }

        if cardinality.max.is_none() {
            let inner = self.visit(expr);
            let nullable = self.nodes[inner].nullable;
            // E{m,} of a nullable E is E*: missing repetitions match empty.
            if nullable || cardinality.min == 0 {
                return self.push(
                    SorbeKind::Repeated {
                        inner,
                        cardinality: Interval::STAR,
                    },
                    true,
                    start,
                );
            }
            if cardinality.min == 1 {
                return self.push(
                    SorbeKind::Repeated {
                        inner,
                        cardinality: Interval::PLUS,
                    },
                    false,
                    start,
                );
            }
            // E{m,} = E ... E (m-1 times) E+
            let mut children = vec![inner];
            for _ in 1..cardinality.min - 1 {
                children.push(self.visit(expr));
            }
            let tail = self.visit(expr);
            let tail_start = self.nodes[tail].span.start;
            children.push(self.push(
                SorbeKind::Repeated {
                    inner: tail,
                    cardinality: Interval::PLUS,
                },
                false,
                tail_start,
            ));
            return self.each_of(children, start);
        }

        let min = cardinality.min;
        let max = cardinality.max.unwrap_or(min);
        if max == 0 {
            return self.push(SorbeKind::Empty, true, start);
        }
        if min == 1 && max == 1 {
            return self.visit(expr);
        }

        // E{m,n} = E ... E (m times) E? ... E? (n-m times)
        let mut children = Vec::with_capacity(max as usize);
        for _ in 0..min {
            children.push(self.visit(expr));
        }
        for _ in min..max {
            let copy_start = self.constraints.len();
            let inner = self.visit(expr);
            children.push(self.push(
                SorbeKind::Repeated {
                    inner,
                    cardinality: Interval::OPT,
                },
                true,
                copy_start,
            ));
        }
        self.each_of(children, start)
    }

    fn each_of(&mut self, children: Vec<usize>, start: usize) -> usize {
        let nullable = children.iter().all(|c| self.nodes[*c].nullable);
        self.push(SorbeKind::EachOf(children), nullable, start)
    }

    fn push(&mut self, kind: SorbeKind, nullable: bool, start: usize) -> usize {
        let label = self.labels.fresh();
        self.nodes.push(SorbeNode {
            label,
            kind,
            nullable,
            span: start..self.constraints.len(),
        });
        self.nodes.len() - 1
    }
}

/// Per-shape SORBE forms, generated on first use and then shared.
#[derive(Debug, Default)]
pub struct SorbeCache {
    forms: DashMap<ShapeId, Arc<Sorbe>>,
    labels: Mutex<LabelGenerator>,
}

impl SorbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_generate(&self, schema: &Schema, shape: ShapeId, expression: TripleId) -> Arc<Sorbe> {
        if let Some(form) = self.forms.get(&shape) {
            return Arc::clone(form.value());
        }
        let entry = self.forms.entry(shape).or_insert_with(|| {
            let form = generate(schema, expression, &mut self.labels.lock());
            trace!(
                shape = %schema.display_label(shape),
                nodes = form.nodes.len(),
                constraints = form.constraint_count(),
                "generated SORBE form"
            );
            Arc::new(form)
        });
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegraph_model::{ShapeExpr, ShapeKind, ShapeLabel, TripleExpr};

    fn p(name: &str) -> Property {
        Property::forward(format!("http://ex.org/{name}"))
    }

    fn sorbe_of(expression: TripleExpr) -> Sorbe {
        let schema = Schema::build([("S", ShapeExpr::shape(expression))]).unwrap();
        let id = schema.shape_id(&ShapeLabel::new("S")).unwrap();
        let ShapeKind::Shape(shape) = &schema.shape(id).kind else {
            unreachable!()
        };
        generate(&schema, shape.expression, &mut LabelGenerator::new())
    }

    fn root_kind(sorbe: &Sorbe) -> &SorbeKind {
        &sorbe.node(sorbe.root()).kind
    }

    #[test]
    fn bounded_repetition_expands_into_copies() {
        let sorbe = sorbe_of(TripleExpr::any(p("a")).repeat(Interval::new(2, Some(4))));
        assert_eq!(sorbe.constraint_count(), 4);
        let SorbeKind::EachOf(children) = root_kind(&sorbe) else {
            panic!("expected EachOf");
        };
        assert_eq!(children.len(), 4);
        let optional = children
            .iter()
            .filter(|c| {
                matches!(
                    sorbe.node(**c).kind,
                    SorbeKind::Repeated { cardinality, .. } if cardinality == Interval::OPT
                )
            })
            .count();
        assert_eq!(optional, 2);
    }

    #[test]
    fn unbounded_repetition_ends_in_plus() {
        let sorbe = sorbe_of(TripleExpr::any(p("a")).repeat(Interval::at_least(3)));
        assert_eq!(sorbe.constraint_count(), 3);
        let SorbeKind::EachOf(children) = root_kind(&sorbe) else {
            panic!("expected EachOf");
        };
        let last = sorbe.node(*children.last().unwrap());
        assert!(matches!(
            last.kind,
            SorbeKind::Repeated { cardinality, .. } if cardinality == Interval::PLUS
        ));
    }

    #[test]
    fn plus_over_nullable_becomes_star() {
        let sorbe = sorbe_of(TripleExpr::any(p("a")).optional().plus());
        assert!(matches!(
            root_kind(&sorbe),
            SorbeKind::Repeated { cardinality, .. } if *cardinality == Interval::STAR
        ));
        assert!(sorbe.node(sorbe.root()).nullable);
    }

    #[test]
    fn triple_references_are_copied_per_use() {
        let schema = Schema::build([
            (
                "S",
                ShapeExpr::shape(TripleExpr::each_of(vec![
                    TripleExpr::any(p("a")).labeled("a"),
                    TripleExpr::reference("a"),
                ])),
            ),
        ])
        .unwrap();
        let id = schema.shape_id(&ShapeLabel::new("S")).unwrap();
        let ShapeKind::Shape(shape) = &schema.shape(id).kind else {
            unreachable!()
        };
        let sorbe = generate(&schema, shape.expression, &mut LabelGenerator::new());
        assert_eq!(sorbe.constraint_count(), 2);
        assert_eq!(sorbe.source(0), sorbe.source(1));
    }

    #[test]
    fn spans_cover_constraint_instances() {
        let sorbe = sorbe_of(TripleExpr::each_of(vec![
            TripleExpr::any(p("a")),
            TripleExpr::one_of(vec![TripleExpr::any(p("b")), TripleExpr::any(p("c"))]).star(),
        ]));
        let root = sorbe.node(sorbe.root());
        assert_eq!(root.span, 0..3);
        let SorbeKind::EachOf(children) = &root.kind else {
            panic!("expected EachOf");
        };
        assert_eq!(sorbe.node(children[0]).span, 0..1);
        assert_eq!(sorbe.node(children[1]).span, 1..3);
    }

    #[test]
    fn labels_are_unique_across_forms() {
        let mut labels = LabelGenerator::new();
        let schema = Schema::build([
            ("S", ShapeExpr::shape(TripleExpr::any(p("a")).plus())),
        ])
        .unwrap();
        let id = schema.shape_id(&ShapeLabel::new("S")).unwrap();
        let ShapeKind::Shape(shape) = &schema.shape(id).kind else {
            unreachable!()
        };
        let first = generate(&schema, shape.expression, &mut labels);
        let second = generate(&schema, shape.expression, &mut labels);
        let mut all: Vec<_> = first
            .nodes()
            .iter()
            .chain(second.nodes())
            .map(|n| n.label)
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
