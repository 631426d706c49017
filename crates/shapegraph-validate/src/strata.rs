//! Stratification of schema rules by their negative dependencies.
//!
//! A rule depends on another when its expression reaches it through a shape
//! reference or a triple-constraint value. The dependency is negative when
//! it sits under an odd number of `NOT`s. Rules in one strongly connected
//! component share a stratum; a negative edge raises the stratum by one.

use ahash::AHashMap;
use shapegraph_model::{Schema, SchemaError, ShapeId, ShapeKind, TripleKind};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    fn flip(self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub target: ShapeId,
    pub polarity: Polarity,
}

/// Rules grouped into evaluation layers. Every rule of layer `k` depends
/// only on rules of layers `< k` or, positively, on rules of layer `k`.
#[derive(Debug, Clone, Default)]
pub struct Strata {
    layers: Vec<Vec<ShapeId>>,
    stratum_of: AHashMap<ShapeId, usize>,
}

impl Strata {
    pub fn count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, stratum: usize) -> &[ShapeId] {
        self.layers.get(stratum).map_or(&[], Vec::as_slice)
    }

    pub fn layers(&self) -> impl Iterator<Item = &[ShapeId]> {
        self.layers.iter().map(Vec::as_slice)
    }

    pub fn stratum_of(&self, rule: ShapeId) -> Option<usize> {
        self.stratum_of.get(&rule).copied()
    }
}

/// Direct dependencies of a rule, in expression order. Nested labelled
/// expressions are rules of their own and appear as targets.
pub fn dependencies(schema: &Schema, rule: ShapeId) -> Vec<Dependency> {
    let mut out = Vec::new();
    collect(schema, rule, Polarity::Positive, true, &mut out);
    out
}

fn collect(schema: &Schema, id: ShapeId, polarity: Polarity, root: bool, out: &mut Vec<Dependency>) {
    if !root && schema.is_rule(id) {
        out.push(Dependency {
            target: id,
            polarity,
        });
        return;
    }
    match &schema.shape(id).kind {
        ShapeKind::And(exprs) | ShapeKind::Or(exprs) => {
            for e in exprs {
                collect(schema, *e, polarity, false, out);
            }
        }
        ShapeKind::Not(expr) => collect(schema, *expr, polarity.flip(), false, out),
        ShapeKind::Ref(target) => out.push(Dependency {
            target: *target,
            polarity,
        }),
        ShapeKind::Shape(_) => {
            let Some(facts) = schema.facts(id) else {
                return;
            };
            for tc in &facts.constraints {
                if let TripleKind::Constraint { value, .. } = schema.triple(*tc).kind {
                    out.push(Dependency {
                        target: value,
                        polarity,
                    });
                }
            }
        }
        ShapeKind::NodeConstraint(_) | ShapeKind::External => {}
    }
}

/// Partition the schema's rules into strata.
///
/// Fails with [`SchemaError::NegationCycle`] when a rule depends on its own
/// component through a negation.
pub fn compute_strata(schema: &Schema) -> Result<Strata> {
    let rules = schema.rules();
    let position: AHashMap<ShapeId, usize> =
        rules.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let edges: Vec<Vec<(usize, Polarity)>> = rules
        .iter()
        .map(|rule| {
            dependencies(schema, *rule)
                .into_iter()
                .filter_map(|d| position.get(&d.target).map(|t| (*t, d.polarity)))
                .collect()
        })
        .collect();

    let sccs = SccFinder::find(&edges);

    let mut component = vec![0usize; rules.len()];
    for (c, scc) in sccs.iter().enumerate() {
        for v in scc {
            component[*v] = c;
        }
    }

    // Tarjan emits components leaves first, so targets are settled before
    // the components depending on them.
    let mut level = vec![0usize; sccs.len()];
    for (c, scc) in sccs.iter().enumerate() {
        let mut stratum = 0;
        for v in scc {
            for (t, polarity) in &edges[*v] {
                let negative = *polarity == Polarity::Negative;
                if component[*t] == c {
                    if negative {
                        let mut labels: Vec<String> =
                            scc.iter().map(|r| schema.display_label(rules[*r])).collect();
                        labels.sort();
                        return Err(SchemaError::NegationCycle { labels }.into());
                    }
                    continue;
                }
                stratum = stratum.max(level[component[*t]] + usize::from(negative));
            }
        }
        level[c] = stratum;
    }

    let mut strata = Strata::default();
    for (i, rule) in rules.iter().enumerate() {
        let k = level[component[i]];
        if strata.layers.len() <= k {
            strata.layers.resize_with(k + 1, Vec::new);
        }
        strata.layers[k].push(*rule);
        strata.stratum_of.insert(*rule, k);
    }
    Ok(strata)
}

struct SccFinder<'a> {
    edges: &'a [Vec<(usize, Polarity)>],
    index: usize,
    stack: Vec<usize>,
    on_stack: Vec<bool>,
    indices: Vec<Option<usize>>,
    lowlinks: Vec<usize>,
    sccs: Vec<Vec<usize>>,
}

impl<'a> SccFinder<'a> {
    fn find(edges: &'a [Vec<(usize, Polarity)>]) -> Vec<Vec<usize>> {
        let n = edges.len();
        let mut finder = Self {
            edges,
            index: 0,
            stack: Vec::new(),
            on_stack: vec![false; n],
            indices: vec![None; n],
            lowlinks: vec![0; n],
            sccs: Vec::new(),
        };
        for v in 0..n {
            if finder.indices[v].is_none() {
                finder.strongconnect(v);
            }
        }
        finder.sccs
    }

    fn strongconnect(&mut self, v: usize) {
        self.indices[v] = Some(self.index);
        self.lowlinks[v] = self.index;
        self.index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        for &(w, _) in &self.edges[v] {
            match self.indices[w] {
                None => {
                    self.strongconnect(w);
                    self.lowlinks[v] = self.lowlinks[v].min(self.lowlinks[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlinks[v] = self.lowlinks[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlinks[v]) == self.indices[v] {
            let mut scc = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            self.sccs.push(scc);
        }
    }
}
