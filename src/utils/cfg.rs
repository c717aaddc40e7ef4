use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::collections::storage::ArenaPtr;

/// A node in a control flow graph.
pub trait CfgNode: ArenaPtr {
    /// The region type associated with the node.
    type Region: CfgRegion<A = Self::A, Node = Self>;

    /// Get the successors of the node.
    ///
    /// Successors can be read off the terminating instructions directly, the
    /// predecessors are only known after [CfgInfo] walks the whole region.
    fn succs(self, arena: &Self::A) -> Vec<Self>;
}

/// A region of nodes with a single entry, e.g., a machine function.
pub trait CfgRegion: ArenaPtr {
    /// The node type associated with the region.
    type Node: CfgNode<A = Self::A, Region = Self> + Hash;

    /// Get the entry node of the region.
    fn entry_node(self, arena: &Self::A) -> Self::Node;

    /// Generate the control flow information for the region.
    fn cfg_info(self, arena: &Self::A) -> CfgInfo<Self::Node, Self> { CfgInfo::new(arena, self) }
}

/// Successor and predecessor lists of the nodes reachable from the entry.
pub struct CfgInfo<N, R>
where
    N: CfgNode,
    R: CfgRegion<A = N::A, Node = N>,
{
    region: R,
    succs: FxHashMap<N, Vec<N>>,
    preds: FxHashMap<N, Vec<N>>,
}

impl<N, R> CfgInfo<N, R>
where
    N: CfgNode + Hash,
    R: CfgRegion<A = N::A, Node = N>,
{
    /// Walk the region from its entry and record every edge once.
    pub fn new(arena: &N::A, region: R) -> Self {
        let mut succs: FxHashMap<N, Vec<N>> = FxHashMap::default();
        let mut preds: FxHashMap<N, Vec<N>> = FxHashMap::default();

        let mut visited = FxHashSet::default();
        let mut worklist = vec![region.entry_node(arena)];

        while let Some(node) = worklist.pop() {
            if !visited.insert(node) {
                continue;
            }

            // reachable nodes always own an entry, even with no edges
            succs.entry(node).or_default();
            preds.entry(node).or_default();

            for succ in node.succs(arena) {
                // a conditional branch may target the fallthrough block, keep
                // a single edge for it
                let node_succs = succs.entry(node).or_default();
                if node_succs.contains(&succ) {
                    continue;
                }
                node_succs.push(succ);
                preds.entry(succ).or_default().push(node);

                if !visited.contains(&succ) {
                    worklist.push(succ);
                }
            }
        }

        Self {
            region,
            succs,
            preds,
        }
    }

    /// Get the successors of a node, `None` if the node is not reachable.
    pub fn succs(&self, node: N) -> Option<&[N]> { self.succs.get(&node).map(Vec::as_slice) }

    /// Get the predecessors of a node, `None` if the node is not reachable.
    ///
    /// Only reachable predecessors are listed.
    pub fn preds(&self, node: N) -> Option<&[N]> { self.preds.get(&node).map(Vec::as_slice) }

    /// Get the region associated with the control flow graph.
    pub fn region(&self) -> R { self.region }

    /// Check if the node can be reached from the entry.
    pub fn is_reachable(&self, node: N) -> bool { self.succs.contains_key(&node) }
}
