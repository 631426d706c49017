//! Enumeration of bags: assignments of matched edges to constraint instances.
//!
//! Edges with a single choice are fixed. Edges with the same set of choices
//! are interchangeable, so instead of walking the full product of choices the
//! iterator distributes each group of such edges over its choices
//! (weak compositions) and combines groups odometer-style. Bags are reduced
//! to per-instance counts, which is all interval computation looks at, and
//! each distinct count vector is produced once. Duplicates can only arise
//! when two groups share an instance; otherwise no seen set is kept.

use std::ops::Range;

use ahash::{AHashMap, AHashSet};

use crate::validator::Cancellation;

/// One choice for an edge: a constraint instance, or `None` to leave the
/// edge unassigned (only offered for `extra` properties).
pub type Choice = Option<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bag {
    counts: Vec<u32>,
}

impl Bag {
    pub fn new(counts: Vec<u32>) -> Self {
        Self { counts }
    }

    /// Number of edges assigned to instance `index`.
    pub fn count(&self, index: usize) -> u32 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Whether no edge is assigned to any instance in `span`.
    pub fn is_empty_on(&self, mut span: Range<usize>) -> bool {
        span.all(|index| self.count(index) == 0)
    }
}

#[derive(Debug)]
struct Group {
    choices: Vec<Choice>,
    size: u32,
    parts: Vec<u32>,
}

impl Group {
    fn new(choices: Vec<Choice>, size: u32) -> Self {
        let mut parts = vec![0; choices.len()];
        parts[0] = size;
        Self {
            choices,
            size,
            parts,
        }
    }

    /// Step to the next weak composition of `size`. Returns `false` and
    /// rewinds to the first composition after the last one.
    fn advance(&mut self) -> bool {
        let last = self.parts.len() - 1;
        let tail = std::mem::take(&mut self.parts[last]);
        match (0..last).rev().find(|j| self.parts[*j] > 0) {
            Some(j) => {
                self.parts[j] -= 1;
                self.parts[j + 1] = tail + 1;
                true
            }
            None => {
                self.parts[0] = self.size;
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct BagIterator {
    base: Vec<u32>,
    groups: Vec<Group>,
    /// `None` when no two groups share an instance.
    seen: Option<AHashSet<Vec<u32>>>,
    cancellation: Option<Cancellation>,
    exhausted: bool,
}

impl BagIterator {
    /// `choices[e]` lists the options for edge `e` over `instances` constraint
    /// instances. Edges without options take no part in any bag.
    pub fn new(instances: usize, choices: &[Vec<Choice>]) -> Self {
        let mut base = vec![0u32; instances];
        let mut grouped: AHashMap<Vec<Choice>, u32> = AHashMap::new();
        let mut order: Vec<Vec<Choice>> = Vec::new();

        for options in choices {
            let mut options = options.clone();
            options.sort_unstable();
            options.dedup();
            match options.as_slice() {
                [] => {}
                [Some(index)] => base[*index] += 1,
                [None] => {}
                _ => {
                    let size = grouped.entry(options.clone()).or_insert(0);
                    if *size == 0 {
                        order.push(options);
                    }
                    *size += 1;
                }
            }
        }

        let groups: Vec<Group> = order
            .into_iter()
            .map(|options| {
                let size = grouped.get(&options).copied().unwrap_or(0);
                Group::new(options, size)
            })
            .collect();
        let seen = Self::groups_overlap(&groups).then(AHashSet::new);

        Self {
            base,
            groups,
            seen,
            cancellation: None,
            exhausted: false,
        }
    }

    /// Stop yielding once `cancellation` is triggered, including while
    /// skipping duplicates.
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Whether duplicate count vectors are possible at all.
    pub fn deduplicates(&self) -> bool {
        self.seen.is_some()
    }

    fn groups_overlap(groups: &[Group]) -> bool {
        let mut owner: AHashSet<usize> = AHashSet::new();
        for group in groups {
            for index in group.choices.iter().flatten() {
                if !owner.insert(*index) {
                    return true;
                }
            }
        }
        false
    }

    fn current(&self) -> Vec<u32> {
        let mut counts = self.base.clone();
        for group in &self.groups {
            for (choice, n) in group.choices.iter().zip(&group.parts) {
                if let Some(index) = choice {
                    counts[*index] += n;
                }
            }
        }
        counts
    }

    fn step(&mut self) {
        for group in &mut self.groups {
            if group.advance() {
                return;
            }
        }
        self.exhausted = true;
    }
}

impl Iterator for BagIterator {
    type Item = Bag;

    fn next(&mut self) -> Option<Bag> {
        while !self.exhausted {
            if self
                .cancellation
                .as_ref()
                .is_some_and(Cancellation::is_cancelled)
            {
                self.exhausted = true;
                return None;
            }
            let counts = self.current();
            self.step();
            if let Some(seen) = &mut self.seen {
                if !seen.insert(counts.clone()) {
                    continue;
                }
            }
            return Some(Bag::new(counts));
        }
        None
    }
}
