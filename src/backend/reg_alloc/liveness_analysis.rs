use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    block_defuse_analysis::{self, display_regs},
    RegAllocTarget,
};
use crate::{
    backend::{context::MContext, inst::MInst, regs::Reg, MBlock, MFunc},
    collections::linked_list::LinkedListContainerPtr,
    utils::cfg::{CfgInfo, CfgNode},
};

#[derive(Debug, Clone)]
pub struct BlockInOut<I> {
    pub in_: FxHashMap<MBlock<I>, FxHashSet<Reg>>,
    pub out: FxHashMap<MBlock<I>, FxHashSet<Reg>>,
}

impl<I> Default for BlockInOut<I> {
    fn default() -> Self {
        BlockInOut {
            in_: FxHashMap::default(),
            out: FxHashMap::default(),
        }
    }
}

impl<I> BlockInOut<I>
where
    I: MInst,
{
    pub fn new() -> Self { Self::default() }

    pub fn in_(&self, block: &MBlock<I>) -> Option<&FxHashSet<Reg>> { self.in_.get(block) }

    pub fn out(&self, block: &MBlock<I>) -> Option<&FxHashSet<Reg>> { self.out.get(block) }

    pub fn display<T>(&self, mctx: &MContext<I>, func: MFunc<I>) -> String
    where
        T: RegAllocTarget<I = I>,
    {
        let mut s = String::new();

        for block in func.iter(mctx) {
            s.push_str(&format!("{} in: ", block.label(mctx)));
            s.push_str(&display_regs::<T>(&self.in_[&block]));
            s.push('\n');
            s.push_str(&format!("{} out: ", block.label(mctx)));
            s.push_str(&display_regs::<T>(&self.out[&block]));
            s.push('\n');
        }

        s
    }
}

pub fn analyze_on_function<T>(mctx: &MContext<T::I>, func: MFunc<T::I>) -> BlockInOut<T::I>
where
    T: RegAllocTarget,
{
    let def_uses = block_defuse_analysis::analyze_on_function::<T>(mctx, func);

    let cfg = CfgInfo::new(mctx, func);

    let mut in_: FxHashMap<MBlock<T::I>, FxHashSet<Reg>> = FxHashMap::default();
    let mut out: FxHashMap<MBlock<T::I>, FxHashSet<Reg>> = FxHashMap::default();

    // unreachable blocks take part too, their registers are still rewritten
    let blocks: Vec<MBlock<T::I>> = func.iter(mctx).collect();
    for &block in blocks.iter() {
        in_.insert(block, FxHashSet::default());
        out.insert(block, FxHashSet::default());
    }

    let mut changed = true;
    while changed {
        changed = false;

        // backward problem, visit the layout in reverse
        for &block in blocks.iter().rev() {
            let mut in_set = FxHashSet::default();
            let mut out_set = FxHashSet::default();

            // out[B] = U in[S] for all S in succ[B]
            let succs = match cfg.succs(block) {
                Some(succs) => succs.to_vec(),
                None => block.succs(mctx),
            };
            for succ in succs {
                out_set.extend(in_[&succ].iter().copied());
            }

            // in[B] = use[B] U (out[B] - def[B])
            let uses = def_uses.uses(&block).expect("uses of block not found");
            let defs = def_uses.defs(&block).expect("defs of block not found");
            in_set.extend(uses.iter().copied());
            in_set.extend(out_set.difference(defs).copied());

            if in_[&block] != in_set {
                in_.insert(block, in_set);
                changed = true;
            }

            if out[&block] != out_set {
                out.insert(block, out_set);
                changed = true;
            }
        }
    }

    BlockInOut { in_, out }
}
