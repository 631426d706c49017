//! Multiplicity intervals of a SORBE form under one bag.
//!
//! The interval of an expression is the set of `k` such that the bag,
//! restricted to the expression's constraint instances, splits into exactly
//! `k` matches of it.

use shapegraph_model::Interval;

use crate::bag::Bag;
use crate::sorbe::{Sorbe, SorbeKind};

/// Root interval of `sorbe` for `bag`. The bag satisfies the shape iff the
/// result contains 1.
pub fn interval_of(sorbe: &Sorbe, bag: &Bag) -> Interval {
    // Post-order arena: children are always computed first.
    let mut intervals = Vec::with_capacity(sorbe.nodes().len());
    for node in sorbe.nodes() {
        let interval = match &node.kind {
            SorbeKind::Constraint { index, .. } => Interval::exactly(bag.count(*index)),
            SorbeKind::Empty => Interval::STAR,
            SorbeKind::EachOf(children) => children
                .iter()
                .fold(Interval::STAR, |acc, c| acc.inter(intervals[*c])),
            SorbeKind::OneOf(children) => children
                .iter()
                .fold(Interval::ZERO, |acc, c| acc.add(intervals[*c])),
            SorbeKind::Repeated { inner, cardinality } => {
                let inner_node = sorbe.node(*inner);
                if bag.is_empty_on(inner_node.span.clone()) {
                    if cardinality.min == 0 || inner_node.nullable {
                        Interval::STAR
                    } else {
                        Interval::ZERO
                    }
                } else {
                    intervals[*inner].div(*cardinality)
                }
            }
        };
        intervals.push(interval);
    }
    intervals
        .get(sorbe.root())
        .copied()
        .unwrap_or(Interval::EMPTY)
}
