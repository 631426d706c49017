//! Neighbourhoods and edge-to-constraint matching.

use shapegraph_model::{Direction, Graph, Node, Property, ShapeId};

use crate::error::Result;
use crate::sorbe::Sorbe;

/// An edge incident to the focus node, seen from the focus node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbour {
    pub property: Property,
    pub node: Node,
}

/// Outgoing edges of `focus`, followed by its incoming edges when
/// `with_inverse` is set.
pub fn neighbourhood<G: Graph + ?Sized>(graph: &G, focus: &Node, with_inverse: bool) -> Vec<Neighbour> {
    let mut out: Vec<Neighbour> = graph
        .neighbours(focus, Direction::Forward)
        .into_iter()
        .map(|(iri, node)| Neighbour {
            property: Property::forward(iri),
            node,
        })
        .collect();
    if with_inverse {
        out.extend(
            graph
                .neighbours(focus, Direction::Inverse)
                .into_iter()
                .map(|(iri, node)| Neighbour {
                    property: Property::inverse(iri),
                    node,
                }),
        );
    }
    out
}

/// For each edge, the constraint instances of `sorbe` it can be assigned to:
/// same property, and a value node that `accepts` for the instance's value
/// rule.
///
/// `accepts` is consulted at most once per distinct `(edge, value rule)`.
pub fn collect_matching_constraints<F>(
    neighbourhood: &[Neighbour],
    sorbe: &Sorbe,
    mut accepts: F,
) -> Result<Vec<Vec<usize>>>
where
    F: FnMut(&Neighbour, ShapeId) -> Result<bool>,
{
    let mut matches = Vec::with_capacity(neighbourhood.len());
    for edge in neighbourhood {
        let mut decided: Vec<(ShapeId, bool)> = Vec::new();
        let mut candidates = Vec::new();
        for index in 0..sorbe.constraint_count() {
            if sorbe.property(index) != &edge.property {
                continue;
            }
            let value = sorbe.value(index);
            let ok = match decided.iter().find(|(rule, _)| *rule == value) {
                Some((_, ok)) => *ok,
                None => {
                    let ok = accepts(edge, value)?;
                    decided.push((value, ok));
                    ok
                }
            };
            if ok {
                candidates.push(index);
            }
        }
        matches.push(candidates);
    }
    Ok(matches)
}
