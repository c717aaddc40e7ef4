//! # Loop Weights
//!
//! Estimates how often each node executes. Every back edge `(latch, header)`,
//! where the header dominates the latch, discovers a natural loop body, and
//! every node of the body has its weight multiplied by a constant factor. A
//! node inside `L` discovered loops thus weighs `factor^L`.

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    cfg::{CfgInfo, CfgNode},
    dominance::Dominance,
};

/// The default multiplier of one loop level.
pub const DEFAULT_LOOP_FACTOR: f64 = 4.0;

pub struct LoopWeights<N>
where
    N: CfgNode,
{
    weights: FxHashMap<N, f64>,
    /// Back edges as `(latch, header)`, in reverse postorder of the latch.
    back_edges: Vec<(N, N)>,
}

impl<N> LoopWeights<N>
where
    N: CfgNode + Hash,
{
    pub fn new(cfg: &CfgInfo<N, N::Region>, dominance: &Dominance<N>, factor: f64) -> Self {
        let mut weights: FxHashMap<N, f64> =
            dominance.rpo().iter().map(|&node| (node, 1.0)).collect();
        let mut back_edges = Vec::new();

        for &latch in dominance.rpo() {
            for &header in cfg.succs(latch).unwrap_or_default() {
                if dominance.dominates(header, latch) {
                    back_edges.push((latch, header));
                }
            }
        }

        for &(latch, header) in back_edges.iter() {
            for node in Self::loop_body(cfg, latch, header) {
                *weights.entry(node).or_insert(1.0) *= factor;
            }
        }

        Self {
            weights,
            back_edges,
        }
    }

    /// Collect the body of a natural loop by walking backwards from the latch
    /// until the header.
    fn loop_body(cfg: &CfgInfo<N, N::Region>, latch: N, header: N) -> FxHashSet<N> {
        let mut body = FxHashSet::default();
        body.insert(header);

        let mut stack = Vec::new();
        if body.insert(latch) {
            stack.push(latch);
        }

        while let Some(node) = stack.pop() {
            for &pred in cfg.preds(node).unwrap_or_default() {
                if body.insert(pred) {
                    stack.push(pred);
                }
            }
        }

        body
    }

    /// The weight of the node, 1.0 for nodes outside the reachable graph.
    pub fn weight(&self, node: N) -> f64 { self.weights.get(&node).copied().unwrap_or(1.0) }

    pub fn back_edges(&self) -> &[(N, N)] { &self.back_edges }
}
