//! The refinement-typing driver.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shapegraph_model::{Direction, Graph, Node, Property, Schema, ShapeId, ShapeKind, ShapeLabel};
use tracing::{debug, info_span, trace};

use crate::error::{Result, ValidationError};
use crate::evaluate::ShapeEvaluator;
use crate::node_constraint::{NodeConstraintEvaluator, XsdNodeConstraints};
use crate::sorbe::SorbeCache;
use crate::strata::{compute_strata, Strata};
use crate::typing::{NodeId, NodeIndex, Typing};

/// Caller-supplied semantics for `External` shapes.
pub trait ExternalShapes: Send + Sync {
    fn satisfies(&self, node: &Node, label: &ShapeLabel) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Evaluate the pairs of a scan on the rayon thread pool.
    pub parallel: bool,
    /// Upper bound on bags enumerated for a single `(node, shape)` check.
    pub max_bags_per_check: Option<u64>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_bags_per_check: None,
        }
    }
}

/// Cooperative cancellation flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ValidationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Validates nodes of a graph against a compiled schema.
///
/// Strata, SORBE forms and compiled patterns are shared by every call to
/// [`Validator::validate`]; each call builds its own [`Typing`].
pub struct Validator<G> {
    schema: Arc<Schema>,
    graph: G,
    strata: Strata,
    sorbe: SorbeCache,
    node_constraints: Box<dyn NodeConstraintEvaluator>,
    external: Option<Box<dyn ExternalShapes>>,
    config: ValidatorConfig,
    cancellation: Cancellation,
}

impl<G: Graph> Validator<G> {
    /// Fails when the schema cannot be stratified or holds an invalid
    /// node constraint.
    pub fn new(schema: Schema, graph: G) -> Result<Self> {
        let schema = Arc::new(schema);
        let strata = compute_strata(&schema)?;
        let validator = Self {
            schema,
            graph,
            strata,
            sorbe: SorbeCache::new(),
            node_constraints: Box::new(XsdNodeConstraints::new()),
            external: None,
            config: ValidatorConfig::default(),
            cancellation: Cancellation::new(),
        };
        validator.prepare_node_constraints()?;
        debug!(
            rules = validator.schema.rules().len(),
            strata = validator.strata.count(),
            "validator ready"
        );
        Ok(validator)
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_node_constraints(
        mut self,
        evaluator: impl NodeConstraintEvaluator + 'static,
    ) -> Result<Self> {
        self.node_constraints = Box::new(evaluator);
        self.prepare_node_constraints()?;
        Ok(self)
    }

    pub fn with_external_shapes(mut self, external: impl ExternalShapes + 'static) -> Self {
        self.external = Some(Box::new(external));
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn strata(&self) -> &Strata {
        &self.strata
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    fn prepare_node_constraints(&self) -> Result<()> {
        for id in self.schema.shape_ids() {
            if let ShapeKind::NodeConstraint(constraint) = &self.schema.shape(id).kind {
                self.node_constraints.prepare(constraint)?;
            }
        }
        Ok(())
    }

    /// Whether `focus` conforms to the shape labelled `label`.
    pub fn check(&self, focus: &Node, label: &ShapeLabel) -> Result<bool> {
        Ok(self.validate(focus, label)?.contains(focus, label))
    }

    /// Compute the typing of every node reachable from `focus` against every
    /// rule of the schema.
    pub fn validate(&self, focus: &Node, label: &ShapeLabel) -> Result<Typing> {
        if self.schema.shape_id(label).is_none() {
            return Err(ValidationError::UnknownShape {
                label: label.clone(),
            });
        }
        let span = info_span!("validate", focus = %focus, shape = %label);
        let _guard = span.enter();

        let nodes = self.candidates(focus);
        debug!(candidates = nodes.len(), "collected candidate nodes");
        let mut typing = Typing::new(Arc::clone(&self.schema), nodes);

        for (stratum, rules) in self.strata.layers().enumerate() {
            self.refine(&mut typing, stratum, rules)?;
        }
        Ok(typing)
    }

    /// Greatest fixed point of one stratum. Lower strata are already final.
    fn refine(&self, typing: &mut Typing, stratum: usize, rules: &[ShapeId]) -> Result<()> {
        let node_ids: Vec<NodeId> = typing.nodes().iter().map(|(id, _)| id).collect();
        for node in &node_ids {
            for rule in rules {
                typing.seed(*node, *rule);
            }
        }

        let mut iterations = 0usize;
        let mut removed_total = 0usize;
        loop {
            self.cancellation.check()?;
            iterations += 1;

            let removals = self.scan(typing, rules)?;
            if removals.is_empty() {
                break;
            }
            removed_total += removals.len();
            for (node, rule) in removals {
                trace!(
                    node = %typing.nodes().node(node),
                    shape = %self.schema.display_label(rule),
                    "removed"
                );
                typing.remove(node, rule);
            }
        }

        debug!(
            stratum,
            rules = rules.len(),
            seeded = node_ids.len() * rules.len(),
            iterations,
            removed = removed_total,
            "stratum stable"
        );
        Ok(())
    }

    /// One pass over the pairs of `rules` that still hold, all evaluated
    /// against the same snapshot. Returns the pairs that no longer hold.
    fn scan(&self, typing: &Typing, rules: &[ShapeId]) -> Result<Vec<(NodeId, ShapeId)>> {
        let evaluator = ShapeEvaluator {
            schema: &self.schema,
            graph: &self.graph,
            typing,
            sorbe: &self.sorbe,
            node_constraints: self.node_constraints.as_ref(),
            external: self.external.as_deref(),
            cancellation: &self.cancellation,
            max_bags: self.config.max_bags_per_check,
        };
        let pairs = typing.holding(rules);
        let check = |&(node, rule): &(NodeId, ShapeId)| -> Result<Option<(NodeId, ShapeId)>> {
            let holds = evaluator.satisfies(typing.nodes().node(node), rule)?;
            Ok((!holds).then_some((node, rule)))
        };

        let verdicts: Vec<Option<(NodeId, ShapeId)>> = if self.config.parallel {
            pairs.par_iter().map(check).collect::<Result<_>>()?
        } else {
            pairs.iter().map(check).collect::<Result<_>>()?
        };
        Ok(verdicts.into_iter().flatten().collect())
    }

    /// The focus node plus every non-literal node reachable from it through
    /// properties the schema mentions.
    fn candidates(&self, focus: &Node) -> NodeIndex {
        let mentioned = self.schema.mentioned_properties();
        let directions: &[Direction] = if self.schema.uses_inverse() {
            &[Direction::Forward, Direction::Inverse]
        } else {
            &[Direction::Forward]
        };

        let mut index = NodeIndex::new();
        index.intern(focus);
        let mut visited: AHashSet<Node> = AHashSet::new();
        visited.insert(focus.clone());
        let mut queue = VecDeque::from([focus.clone()]);

        while let Some(node) = queue.pop_front() {
            for direction in directions {
                for (iri, next) in self.graph.neighbours(&node, *direction) {
                    let property = Property {
                        iri,
                        direction: *direction,
                    };
                    if !mentioned.contains(&property) || visited.contains(&next) {
                        continue;
                    }
                    visited.insert(next.clone());
                    if !next.is_literal() {
                        index.intern(&next);
                    }
                    queue.push_back(next);
                }
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegraph_model::{vocab, MemoryGraph, NodeConstraint, ShapeExpr, TripleExpr};

    const EX: &str = "http://ex.org/";

    fn member(i: usize) -> Node {
        Node::iri(format!("{EX}n{i}"))
    }

    /// `n0 -> n1 -> ... -> n{len-1}` over `knows`; every node but the last
    /// has a name.
    fn person_chain(len: usize) -> Validator<MemoryGraph> {
        let schema = Schema::build([(
            "Person",
            ShapeExpr::shape(TripleExpr::each_of(vec![
                TripleExpr::constraint(
                    Property::forward(format!("{EX}name")),
                    ShapeExpr::node_constraint(NodeConstraint::of_datatype(vocab::XSD_STRING)),
                ),
                TripleExpr::constraint(
                    Property::forward(format!("{EX}knows")),
                    ShapeExpr::reference("Person"),
                )
                .star(),
            ])),
        )])
        .unwrap();
        let mut g = MemoryGraph::new();
        for i in 0..len {
            if i + 1 < len {
                g.add(member(i), format!("{EX}knows"), member(i + 1));
                g.add(member(i), format!("{EX}name"), Node::string(format!("member {i}")));
            }
        }
        Validator::new(schema, g)
            .unwrap()
            .with_config(ValidatorConfig {
                parallel: false,
                ..ValidatorConfig::default()
            })
    }

    #[test]
    fn removed_pairs_are_never_reinstated() {
        let validator = person_chain(5);
        let focus = member(0);
        let person = validator.schema.shape_id(&ShapeLabel::new("Person")).unwrap();
        let stratum = validator.strata.stratum_of(person).unwrap();

        let mut typing = Typing::new(Arc::clone(&validator.schema), validator.candidates(&focus));
        for lower in 0..stratum {
            validator
                .refine(&mut typing, lower, validator.strata.layer(lower))
                .unwrap();
        }
        let rules = validator.strata.layer(stratum).to_vec();
        let ids: Vec<NodeId> = typing.nodes().iter().map(|(id, _)| id).collect();
        for id in &ids {
            for rule in &rules {
                typing.seed(*id, *rule);
            }
        }

        let mut holding: AHashSet<(NodeId, ShapeId)> = typing.holding(&rules).into_iter().collect();
        let mut removed: AHashSet<(NodeId, ShapeId)> = AHashSet::new();
        let mut scans = 0;
        loop {
            let removals = validator.scan(&typing, &rules).unwrap();
            scans += 1;
            if removals.is_empty() {
                break;
            }
            for (node, rule) in removals {
                assert!(holding.contains(&(node, rule)), "only holding pairs are removed");
                typing.remove(node, rule);
                removed.insert((node, rule));
            }
            let next: AHashSet<(NodeId, ShapeId)> = typing.holding(&rules).into_iter().collect();
            assert!(next.is_subset(&holding));
            assert!(next.is_disjoint(&removed));
            holding = next;
        }

        // The unnamed tail falls first, then one predecessor per scan.
        assert!(scans >= 5, "took {scans} scans");
        for i in 0..5 {
            assert!(!typing.contains(&member(i), &ShapeLabel::new("Person")));
        }
    }

    #[test]
    fn chain_with_an_unnamed_tail_has_no_people() {
        let validator = person_chain(3);
        let typing = validator
            .validate(&member(0), &ShapeLabel::new("Person"))
            .unwrap();
        assert!(typing.conforming().is_empty());
        assert_eq!(typing.nodes().len(), 3);
    }
}
