//! # Depth-First Search on Control Flow Graph
//!
//! A reusable DFS driver that yields enter/leave events, with a post-order
//! adaptor on top of it.

use std::hash::Hash;

use rustc_hash::FxHashSet;

use super::cfg::{CfgNode, CfgRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Enter,
    Leave,
}

/// Reusable DFS state, cleared at the start of every traversal.
pub struct DfsContext<N>
where
    N: CfgNode,
{
    stack: Vec<(Event, N)>,
    visited: FxHashSet<N>,
}

impl<N> Default for DfsContext<N>
where
    N: CfgNode,
{
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            visited: FxHashSet::default(),
        }
    }
}

impl<N> DfsContext<N>
where
    N: CfgNode + Hash,
{
    pub fn iter<'a>(&'a mut self, arena: &'a N::A, region: N::Region) -> DfsIterator<'a, N> {
        self.stack.clear();
        self.visited.clear();
        self.stack.push((Event::Enter, region.entry_node(arena)));
        DfsIterator { arena, dfs: self }
    }

    pub fn post_order_iter<'a>(
        &'a mut self,
        arena: &'a N::A,
        region: N::Region,
    ) -> impl Iterator<Item = N> + 'a {
        self.iter(arena, region)
            .filter_map(|(event, node)| (event == Event::Leave).then_some(node))
    }
}

pub struct DfsIterator<'a, N>
where
    N: CfgNode,
{
    arena: &'a N::A,
    dfs: &'a mut DfsContext<N>,
}

impl<'a, N> Iterator for DfsIterator<'a, N>
where
    N: CfgNode + Hash,
{
    type Item = (Event, N);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (event, node) = self.dfs.stack.pop()?;
            match event {
                Event::Leave => return Some((Event::Leave, node)),
                Event::Enter => {
                    if !self.dfs.visited.insert(node) {
                        // pushed twice before being entered
                        continue;
                    }
                    self.dfs.stack.push((Event::Leave, node));
                    // reversed, so the first successor is entered first
                    let succs = node.succs(self.arena);
                    for succ in succs.into_iter().rev() {
                        if !self.dfs.visited.contains(&succ) {
                            self.dfs.stack.push((Event::Enter, succ));
                        }
                    }
                    return Some((Event::Enter, node));
                }
            }
        }
    }
}
