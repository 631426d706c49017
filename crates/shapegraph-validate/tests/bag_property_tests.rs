use std::collections::BTreeSet;

use proptest::prelude::*;
use shapegraph_validate::bag::{BagIterator, Choice};

/// Every count vector reachable by assigning each edge one of its choices.
fn brute_force(instances: usize, choices: &[Vec<Choice>]) -> BTreeSet<Vec<u32>> {
    let mut out = BTreeSet::new();
    let edges: Vec<&Vec<Choice>> = choices.iter().filter(|c| !c.is_empty()).collect();
    let mut picks = vec![0usize; edges.len()];
    loop {
        let mut counts = vec![0u32; instances];
        for (edge, pick) in edges.iter().zip(&picks) {
            if let Some(index) = edge[*pick] {
                counts[index] += 1;
            }
        }
        out.insert(counts);

        let mut position = 0;
        loop {
            if position == edges.len() {
                return out;
            }
            picks[position] += 1;
            if picks[position] < edges[position].len() {
                break;
            }
            picks[position] = 0;
            position += 1;
        }
    }
}

fn choices(instances: usize) -> impl Strategy<Value = Vec<Vec<Choice>>> {
    let choice = prop_oneof![
        4 => (0..instances).prop_map(Some),
        1 => Just(None),
    ];
    prop::collection::vec(prop::collection::vec(choice, 0..=3), 0..=6)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn iterator_yields_every_distinct_bag_once(
        (instances, choices) in (1usize..=4).prop_flat_map(|n| (Just(n), choices(n))),
    ) {
        let produced: Vec<Vec<u32>> = BagIterator::new(instances, &choices)
            .map(|bag| bag.counts().to_vec())
            .collect();
        let distinct: BTreeSet<Vec<u32>> = produced.iter().cloned().collect();

        prop_assert_eq!(distinct.len(), produced.len(), "duplicate bag produced");
        prop_assert_eq!(distinct, brute_force(instances, &choices));
    }
}
