//! # Dominance Analysis
//!
//! This module implements the algorithm described in "A Simple, Fast Dominance
//! Algorithm" by Cooper, et al.
//!
//! Only the nodes reachable from the entry take part in the analysis, querying
//! an unreachable node panics.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::{
    cfg::{CfgInfo, CfgNode, CfgRegion},
    dfs::DfsContext,
};

pub struct Dominance<N>
where
    N: CfgNode,
{
    /// The immediate dominator of each node, `None` for the entry.
    idoms: FxHashMap<N, Option<N>>,
    /// The dominance frontier of each node.
    frontiers: FxHashMap<N, Vec<N>>,
    /// Children in the dominator tree, in reverse postorder.
    domtree: FxHashMap<N, Vec<N>>,
    /// The reverse postorder of the CFG.
    rpo: Vec<N>,
}

impl<N> Dominance<N>
where
    N: CfgNode + Hash,
{
    /// Returns the immediate dominator of `node`.
    pub fn idom(&self, node: N) -> Option<N> { self.idoms[&node] }

    /// Returns the dominance frontier of `node`.
    pub fn frontier(&self, node: N) -> &[N] { &self.frontiers[&node] }

    /// Returns the nodes immediately dominated by `node`.
    pub fn children(&self, node: N) -> &[N] { &self.domtree[&node] }

    /// Returns true if `n1` dominates `n2`. Every node dominates itself.
    pub fn dominates(&self, n1: N, n2: N) -> bool {
        let mut finger = Some(n2);
        while let Some(node) = finger {
            if node == n1 {
                return true;
            }
            finger = self.idoms.get(&node).copied().flatten();
        }
        false
    }

    /// Returns true if the node is reachable and thus analyzed.
    pub fn contains(&self, node: N) -> bool { self.idoms.contains_key(&node) }

    pub fn rpo(&self) -> &[N] { &self.rpo }

    fn intersect(
        mut finger1: N,
        mut finger2: N,
        idoms: &FxHashMap<N, Option<N>>,
        postorder: &FxHashMap<N, usize>,
    ) -> N {
        let climb = |finger: N| {
            idoms[&finger].expect("intersecting with a node whose idom is not processed")
        };
        while finger1 != finger2 {
            while postorder[&finger1] < postorder[&finger2] {
                finger1 = climb(finger1);
            }
            while postorder[&finger2] < postorder[&finger1] {
                finger2 = climb(finger2);
            }
        }
        finger1
    }

    /// Compute the dominance information of the region described by `cfg`.
    pub fn new(arena: &N::A, cfg: &CfgInfo<N, N::Region>) -> Self {
        let region = cfg.region();
        let entry = region.entry_node(arena);

        let mut dfs: DfsContext<N> = DfsContext::default();

        let mut postorder = FxHashMap::default();
        let mut rpo = Vec::new();
        let mut idoms = FxHashMap::default();

        for (i, node) in dfs.post_order_iter(arena, region).enumerate() {
            postorder.insert(node, i);
            rpo.push(node);
            idoms.insert(node, None);
        }
        rpo.reverse();

        debug_assert!(rpo.first() == Some(&entry));
        // during the fixpoint the entry is its own dominator, so that
        // `intersect` can stop there
        idoms.insert(entry, Some(entry));

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                let preds = cfg.preds(node).unwrap_or_default();

                let mut new_idom = None;
                for &pred in preds {
                    // skip predecessors not processed yet
                    if idoms[&pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(idom) => Self::intersect(idom, pred, &idoms, &postorder),
                    });
                }

                if idoms[&node] != new_idom {
                    idoms.insert(node, new_idom);
                    changed = true;
                }
            }
        }
        idoms.insert(entry, None);

        let mut domtree: FxHashMap<N, Vec<N>> = FxHashMap::default();
        let mut frontiers: FxHashMap<N, Vec<N>> = FxHashMap::default();
        for &node in rpo.iter() {
            domtree.insert(node, Vec::new());
            frontiers.insert(node, Vec::new());
        }

        for &node in rpo.iter() {
            if let Some(idom) = idoms[&node] {
                domtree.entry(idom).or_default().push(node);
            }
        }

        for &node in rpo.iter() {
            // only join points other than the entry contribute, the entry
            // never appears in a frontier
            let Some(idom) = idoms[&node] else {
                continue;
            };
            let preds = cfg.preds(node).unwrap_or_default();
            if preds.len() <= 1 {
                continue;
            }
            for &pred in preds {
                let mut runner = pred;
                while runner != idom {
                    let frontier = frontiers.entry(runner).or_default();
                    if !frontier.contains(&node) {
                        frontier.push(node);
                    }
                    runner = idoms[&runner].expect("walk passed the entry before the idom");
                }
            }
        }

        Self {
            idoms,
            frontiers,
            domtree,
            rpo,
        }
    }
}
