//! Best-first search for mapping chains between kinds
//!
//! A path consumes every call written in the template, in order, through
//! named mappings whose names match the calls. Implicit mappings may be
//! inserted anywhere without consuming a call. Paths are ranked by [`Cost`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, trace};

use crate::registry::{Indices, Kind, Mapping, QualifiedRef};

/// Cost of a path: fewer hops first, then fewer skipped name tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cost {
    pub hops: u32,
    pub score: u32,
}

impl Cost {
    fn add_hop(self, score: u32) -> Self {
        Cost {
            hops: self.hops + 1,
            score: self.score + score,
        }
    }
}

/// One mapping taken by a path
#[derive(Debug, Clone)]
pub struct Hop {
    pub mapping: Arc<Mapping>,
    /// Index of the consumed call, or None for an implicit hop
    pub call: Option<usize>,
}

/// An accepted chain of mappings
#[derive(Debug, Clone)]
pub struct Path {
    pub hops: Vec<Hop>,
    pub tail_kind: Kind,
    pub cost: Cost,
}

/// Hops taken so far, newest first; successors share the prefix of their parent
struct HopNode {
    hop: Hop,
    parent: Option<Rc<HopNode>>,
}

fn collect_hops(mut node: Option<&Rc<HopNode>>) -> Vec<Hop> {
    let mut hops = Vec::new();
    while let Some(current) = node {
        hops.push(current.hop.clone());
        node = current.parent.as_ref();
    }
    hops.reverse();
    hops
}

struct State {
    next_call: usize,
    kind: Kind,
    hops: Option<Rc<HopNode>>,
    cost: Cost,
}

impl State {
    fn then(&self, mapping: Arc<Mapping>, call: Option<usize>, score: u32) -> State {
        let next_call = if call.is_some() {
            self.next_call + 1
        } else {
            self.next_call
        };
        State {
            next_call,
            kind: mapping.target_kind.clone(),
            cost: self.cost.add_hop(score),
            hops: Some(Rc::new(HopNode {
                hop: Hop { mapping, call },
                parent: self.hops.clone(),
            })),
        }
    }
}

/// Heap entry ordered so that `BinaryHeap` pops the cheapest, earliest state
struct Candidate {
    cost: Cost,
    seq: u64,
    state: State,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: lower cost, then lower sequence, is greater
        match other.cost.cmp(&self.cost) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

/// Find paths from `start` that consume all `calls` and end in a kind
/// admitted by `accept`
///
/// Each (call index, kind) pair is expanded once, from its cheapest prefix,
/// and the search stops once no pending state can beat the best accepted
/// path. The first path is therefore the cheapest, ties going to the earliest
/// discovered; the others are the costlier alternatives found on the way and
/// are not exhaustive. An empty result means the calls cannot be resolved
/// from `start`.
pub fn find(
    indices: &Indices,
    calls: &[QualifiedRef],
    start: &Kind,
    accept: impl Fn(&Kind) -> bool,
) -> Vec<Path> {
    let named = indices.named_mappings.read();
    let implicit = indices.implicit_mappings.read();

    let mut seq = 0u64;
    let mut heap = BinaryHeap::new();
    heap.push(Candidate {
        cost: Cost::default(),
        seq,
        state: State {
            next_call: 0,
            kind: start.clone(),
            hops: None,
            cost: Cost::default(),
        },
    });

    let mut closed: HashSet<(usize, Kind)> = HashSet::new();
    let mut accepted: Vec<(u64, Path)> = Vec::new();
    while let Some(Candidate { state, .. }) = heap.pop() {
        let best = accepted.iter().map(|(_, path)| path.cost).min();
        if best.is_some_and(|best| state.cost >= best) {
            break;
        }
        if !closed.insert((state.next_call, state.kind.clone())) {
            continue;
        }
        trace!(
            "expanding {} at call {}/{} with cost {:?}",
            state.kind,
            state.next_call,
            calls.len(),
            state.cost
        );

        let mut successors = Vec::new();
        if let Some(call) = calls.get(state.next_call) {
            for found in named.find(&state.kind, call) {
                successors.push(state.then(found.mapping, Some(state.next_call), found.score));
            }
        }
        for mapping in implicit.get(&state.kind) {
            successors.push(state.then(Arc::clone(mapping), None, 0));
        }

        for successor in successors {
            seq += 1;
            if successor.next_call == calls.len() && accept(&successor.kind) {
                accepted.push((
                    seq,
                    Path {
                        hops: collect_hops(successor.hops.as_ref()),
                        tail_kind: successor.kind,
                        cost: successor.cost,
                    },
                ));
            } else if !closed.contains(&(successor.next_call, successor.kind.clone())) {
                heap.push(Candidate {
                    cost: successor.cost,
                    seq,
                    state: successor,
                });
            }
        }
    }

    accepted.sort_by(|(a_seq, a), (b_seq, b)| a.cost.cmp(&b.cost).then(a_seq.cmp(b_seq)));
    let paths: Vec<Path> = accepted.into_iter().map(|(_, path)| path).collect();

    match paths.first() {
        Some(best) => debug!(
            "resolved {} calls from {} to {} in {} hops (score {}), {} candidates",
            calls.len(),
            start,
            best.tail_kind,
            best.cost.hops,
            best.cost.score,
            paths.len()
        ),
        None => debug!("no path for {} calls from {}", calls.len(), start),
    }

    paths
}
