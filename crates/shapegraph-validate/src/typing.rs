//! The typing table: which `(node, rule)` pairs currently hold.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use shapegraph_model::{Node, Schema, ShapeId, ShapeLabel};

/// Dense index of a candidate node within one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interns graph nodes to [`NodeId`]s.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    nodes: Vec<Node>,
    ids: AHashMap<Node, NodeId>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, node: &Node) -> NodeId {
        if let Some(id) = self.ids.get(node) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.ids.insert(node.clone(), id);
        id
    }

    pub fn get(&self, node: &Node) -> Option<NodeId> {
        self.ids.get(node).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}

/// Verdicts for every seeded `(node, rule)` pair of one validation run.
///
/// Seeded pairs start out holding. The refinement loop only ever flips them
/// to `false`; a pair that was never seeded has no verdict at all.
#[derive(Debug, Clone)]
pub struct Typing {
    schema: Arc<Schema>,
    nodes: NodeIndex,
    verdicts: AHashMap<(NodeId, ShapeId), bool>,
}

impl Typing {
    pub(crate) fn new(schema: Arc<Schema>, nodes: NodeIndex) -> Self {
        Self {
            schema,
            nodes,
            verdicts: AHashMap::new(),
        }
    }

    /// Whether `node` conforms to the shape labelled `label`.
    pub fn contains(&self, node: &Node, label: &ShapeLabel) -> bool {
        self.verdict(node, label).unwrap_or(false)
    }

    /// `None` when the pair was never considered by the run.
    pub fn verdict(&self, node: &Node, label: &ShapeLabel) -> Option<bool> {
        let shape = self.schema.shape_id(label)?;
        self.verdict_of(node, shape)
    }

    pub fn verdict_of(&self, node: &Node, shape: ShapeId) -> Option<bool> {
        let id = self.nodes.get(node)?;
        self.lookup(id, shape)
    }

    pub fn lookup(&self, node: NodeId, shape: ShapeId) -> Option<bool> {
        self.verdicts.get(&(node, shape)).copied()
    }

    /// Labelled pairs that hold, ordered by node then label.
    pub fn conforming(&self) -> Vec<(Node, ShapeLabel)> {
        let mut out: Vec<(Node, ShapeLabel)> = self
            .verdicts
            .iter()
            .filter(|(_, holds)| **holds)
            .filter_map(|((node, shape), _)| {
                let label = self.schema.shape(*shape).label.clone()?;
                Some((self.nodes.node(*node).clone(), label))
            })
            .collect();
        out.sort();
        out
    }

    /// Number of pairs, labelled or not, that currently hold.
    pub fn len(&self) -> usize {
        self.verdicts.values().filter(|holds| **holds).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pairs that received a verdict.
    pub fn seeded(&self) -> usize {
        self.verdicts.len()
    }

    pub fn nodes(&self) -> &NodeIndex {
        &self.nodes
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn seed(&mut self, node: NodeId, shape: ShapeId) {
        self.verdicts.insert((node, shape), true);
    }

    pub(crate) fn remove(&mut self, node: NodeId, shape: ShapeId) {
        if let Some(holds) = self.verdicts.get_mut(&(node, shape)) {
            *holds = false;
        }
    }

    /// Pairs of `rules` that still hold.
    pub(crate) fn holding(&self, rules: &[ShapeId]) -> Vec<(NodeId, ShapeId)> {
        let mut pairs = Vec::new();
        for (node, _) in self.nodes.iter() {
            for rule in rules {
                if self.lookup(node, *rule) == Some(true) {
                    pairs.push((node, *rule));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegraph_model::{NodeConstraint, ShapeExpr};

    #[test]
    fn interning_is_stable() {
        let mut index = NodeIndex::new();
        let a = index.intern(&Node::iri("ex:a"));
        let b = index.intern(&Node::iri("ex:b"));
        assert_ne!(a, b);
        assert_eq!(index.intern(&Node::iri("ex:a")), a);
        assert_eq!(index.len(), 2);
        assert_eq!(index.node(b), &Node::iri("ex:b"));
    }

    #[test]
    fn removal_is_recorded_as_false() {
        let schema = Arc::new(
            Schema::build([("S", ShapeExpr::node_constraint(NodeConstraint::any()))]).unwrap(),
        );
        let s = schema.shape_id(&ShapeLabel::new("S")).unwrap();
        let mut index = NodeIndex::new();
        let a = index.intern(&Node::iri("ex:a"));
        let mut typing = Typing::new(schema, index);

        assert_eq!(typing.verdict(&Node::iri("ex:a"), &ShapeLabel::new("S")), None);
        typing.seed(a, s);
        assert!(typing.contains(&Node::iri("ex:a"), &ShapeLabel::new("S")));
        assert_eq!(typing.holding(&[s]), vec![(a, s)]);

        typing.remove(a, s);
        assert_eq!(typing.verdict(&Node::iri("ex:a"), &ShapeLabel::new("S")), Some(false));
        assert!(typing.holding(&[s]).is_empty());
        assert_eq!(typing.seeded(), 1);
        assert!(typing.is_empty());
    }
}
