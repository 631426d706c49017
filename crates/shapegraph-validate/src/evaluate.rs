//! Evaluation of one shape expression at one node against a typing snapshot.

use shapegraph_model::{CompiledShape, Graph, Node, Schema, ShapeId, ShapeKind, ShapeLabel};
use tracing::trace;

use crate::bag::{BagIterator, Choice};
use crate::error::{Result, ValidationError};
use crate::interval::interval_of;
use crate::matcher::{collect_matching_constraints, neighbourhood, Neighbour};
use crate::node_constraint::NodeConstraintEvaluator;
use crate::sorbe::SorbeCache;
use crate::typing::Typing;
use crate::validator::{Cancellation, ExternalShapes};

/// Read-only view used during one scan of the refinement loop.
///
/// References are answered from `typing`, never by recursive evaluation,
/// except for literal nodes, which are never seeded and are evaluated
/// directly against the referenced rule.
pub struct ShapeEvaluator<'a, G: Graph + ?Sized> {
    pub schema: &'a Schema,
    pub graph: &'a G,
    pub typing: &'a Typing,
    pub sorbe: &'a SorbeCache,
    pub node_constraints: &'a dyn NodeConstraintEvaluator,
    pub external: Option<&'a dyn ExternalShapes>,
    pub cancellation: &'a Cancellation,
    pub max_bags: Option<u64>,
}

impl<G: Graph + ?Sized> ShapeEvaluator<'_, G> {
    /// Whether `node` satisfies shape expression `shape`.
    pub fn satisfies(&self, node: &Node, shape: ShapeId) -> Result<bool> {
        match &self.schema.shape(shape).kind {
            ShapeKind::And(exprs) => {
                for e in exprs {
                    if !self.satisfies(node, *e)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ShapeKind::Or(exprs) => {
                for e in exprs {
                    if self.satisfies(node, *e)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ShapeKind::Not(expr) => Ok(!self.satisfies(node, *expr)?),
            ShapeKind::Ref(target) => self.conforms(node, *target),
            ShapeKind::NodeConstraint(constraint) => {
                Ok(self.node_constraints.evaluate(node, constraint))
            }
            ShapeKind::Shape(compiled) => self.shape_holds(node, shape, compiled),
            ShapeKind::External => self.external_holds(node, shape),
        }
    }

    /// Verdict of `node` against rule `rule`.
    pub fn conforms(&self, node: &Node, rule: ShapeId) -> Result<bool> {
        if let Some(verdict) = self.typing.verdict_of(node, rule) {
            return Ok(verdict);
        }
        if node.is_literal() {
            return self.satisfies(node, rule);
        }
        Err(ValidationError::EvaluationInconsistency {
            node: node.to_string(),
            shape: self.schema.display_label(rule),
        })
    }

    fn external_holds(&self, node: &Node, shape: ShapeId) -> Result<bool> {
        let label = self.schema.display_label(shape);
        let Some(external) = self.external else {
            return Err(ValidationError::UnsupportedFeature {
                feature: format!("external shape {label} without an external shape provider"),
            });
        };
        external
            .satisfies(node, &ShapeLabel::new(label.clone()))
            .map_err(|source| ValidationError::External { label, source })
    }

    fn shape_holds(&self, node: &Node, shape: ShapeId, compiled: &CompiledShape) -> Result<bool> {
        let Some(facts) = self.schema.facts(shape) else {
            return Err(ValidationError::EvaluationInconsistency {
                node: node.to_string(),
                shape: self.schema.display_label(shape),
            });
        };
        let sorbe = self
            .sorbe
            .get_or_generate(self.schema, shape, compiled.expression);
        let edges = neighbourhood(self.graph, node, facts.uses_inverse);
        let matches = collect_matching_constraints(&edges, &sorbe, |edge: &Neighbour, value| {
            self.conforms(&edge.node, value)
        })?;

        let mut choices: Vec<Vec<Choice>> = Vec::with_capacity(edges.len());
        for (edge, candidates) in edges.iter().zip(matches) {
            let extra = compiled.is_extra(&edge.property);
            if candidates.is_empty() {
                let mentioned = facts.mentions(&edge.property);
                if mentioned && !extra {
                    trace!(node = %node, property = %edge.property, "edge matches no constraint");
                    return Ok(false);
                }
                // Closedness restricts outgoing edges only.
                if compiled.closed && !mentioned && !extra && !edge.property.is_inverse() {
                    trace!(node = %node, property = %edge.property, "edge not allowed by closed shape");
                    return Ok(false);
                }
                continue;
            }
            let mut options: Vec<Choice> = candidates.into_iter().map(Some).collect();
            if extra {
                options.push(None);
            }
            choices.push(options);
        }

        let mut enumerated: u64 = 0;
        let bags = BagIterator::new(sorbe.constraint_count(), &choices)
            .with_cancellation(self.cancellation.clone());
        for bag in bags {
            self.cancellation.check()?;
            enumerated += 1;
            if let Some(limit) = self.max_bags {
                if enumerated > limit {
                    return Err(ValidationError::BagLimitExceeded {
                        node: node.to_string(),
                        shape: self.schema.display_label(shape),
                        limit,
                    });
                }
            }
            if interval_of(&sorbe, &bag).contains(1) {
                return Ok(true);
            }
        }
        // An iterator stopped by cancellation looks exhausted.
        self.cancellation.check()?;
        Ok(false)
    }
}
