//! Read access to the data graph.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::node::{Iri, Node};
use crate::property::Direction;

/// A data graph the validator can query.
///
/// `neighbours(node, Forward)` yields `(p, o)` for every triple `node p o`;
/// `neighbours(node, Inverse)` yields `(p, s)` for every triple `s p node`.
/// The validator may call this from several threads at once.
pub trait Graph: Sync {
    fn neighbours(&self, node: &Node, direction: Direction) -> Vec<(Iri, Node)>;
}

impl<G: Graph + ?Sized> Graph for &G {
    fn neighbours(&self, node: &Node, direction: Direction) -> Vec<(Iri, Node)> {
        (**self).neighbours(node, direction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Node,
    pub predicate: Iri,
    pub object: Node,
}

impl Triple {
    pub fn new(subject: Node, predicate: impl Into<Iri>, object: Node) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

/// In-memory graph indexed by subject and by object. Duplicate triples are
/// stored once.
#[derive(Debug, Default, Clone)]
pub struct MemoryGraph {
    triples: AHashSet<Triple>,
    outgoing: AHashMap<Node, Vec<(Iri, Node)>>,
    incoming: AHashMap<Node, Vec<(Iri, Node)>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the triple was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }
        self.outgoing
            .entry(triple.subject.clone())
            .or_default()
            .push((triple.predicate.clone(), triple.object.clone()));
        self.incoming
            .entry(triple.object.clone())
            .or_default()
            .push((triple.predicate.clone(), triple.subject.clone()));
        self.triples.insert(triple)
    }

    pub fn add(&mut self, subject: Node, predicate: impl Into<Iri>, object: Node) -> bool {
        self.insert(Triple::new(subject, predicate, object))
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for MemoryGraph {
    fn from_iter<T: IntoIterator<Item = Triple>>(iter: T) -> Self {
        let mut graph = MemoryGraph::new();
        for triple in iter {
            graph.insert(triple);
        }
        graph
    }
}

impl Graph for MemoryGraph {
    fn neighbours(&self, node: &Node, direction: Direction) -> Vec<(Iri, Node)> {
        let index = match direction {
            Direction::Forward => &self.outgoing,
            Direction::Inverse => &self.incoming,
        };
        index.get(node).cloned().unwrap_or_default()
    }
}
