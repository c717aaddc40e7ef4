use rustc_hash::{FxHashMap, FxHashSet};

use super::RegAllocTarget;
use crate::{
    backend::{context::MContext, inst::MInst, regs::Reg, MBlock, MFunc},
    collections::linked_list::LinkedListContainerPtr,
};

#[derive(Debug, Clone)]
pub struct BlockDefUse<I> {
    pub uses: FxHashMap<MBlock<I>, FxHashSet<Reg>>,
    pub defs: FxHashMap<MBlock<I>, FxHashSet<Reg>>,
}

impl<I> Default for BlockDefUse<I> {
    fn default() -> Self {
        BlockDefUse {
            uses: FxHashMap::default(),
            defs: FxHashMap::default(),
        }
    }
}

impl<I> BlockDefUse<I>
where
    I: MInst,
{
    pub fn new() -> Self { Self::default() }

    pub fn uses(&self, block: &MBlock<I>) -> Option<&FxHashSet<Reg>> { self.uses.get(block) }

    pub fn defs(&self, block: &MBlock<I>) -> Option<&FxHashSet<Reg>> { self.defs.get(block) }

    pub fn display<T>(&self, mctx: &MContext<I>, func: MFunc<I>) -> String
    where
        T: RegAllocTarget<I = I>,
    {
        let mut s = String::new();

        for block in func.iter(mctx) {
            s.push_str(&format!("{} uses: ", block.label(mctx)));
            s.push_str(&display_regs::<T>(&self.uses[&block]));
            s.push('\n');
            s.push_str(&format!("{} defs: ", block.label(mctx)));
            s.push_str(&display_regs::<T>(&self.defs[&block]));
            s.push('\n');
        }

        s
    }
}

/// Sorted and comma separated, for a deterministic output.
pub(super) fn display_regs<T>(regs: &FxHashSet<Reg>) -> String
where
    T: RegAllocTarget,
{
    let mut regs: Vec<Reg> = regs.iter().copied().collect();
    regs.sort();
    regs.into_iter()
        .map(T::display_reg)
        .collect::<Vec<_>>()
        .join(", ")
}

/// If the allocator tracks the register: every virtual register, and the
/// physical registers whose explicit occurrences constrain allocation.
pub fn is_tracked<T>(reg: Reg) -> bool
where
    T: RegAllocTarget,
{
    match reg {
        Reg::V(_) => true,
        Reg::P(preg) => T::is_fixed_conflict(preg),
    }
}

pub fn analyze_on_function<T>(mctx: &MContext<T::I>, func: MFunc<T::I>) -> BlockDefUse<T::I>
where
    T: RegAllocTarget,
{
    let mut defuse = BlockDefUse::new();

    for block in func.iter(mctx) {
        let mut uses = FxHashSet::default();
        let mut defs = FxHashSet::default();

        for inst in block.iter(mctx) {
            for reg in inst.uses(mctx) {
                if !defs.contains(&reg) {
                    uses.insert(reg);
                }
            }
            for reg in inst.defs(mctx) {
                defs.insert(reg);
            }
        }

        // remove registers the allocator does not care about
        uses.retain(|reg| is_tracked::<T>(*reg));
        defs.retain(|reg| is_tracked::<T>(*reg));

        defuse.uses.insert(block, uses);
        defuse.defs.insert(block, defs);
    }

    defuse
}
