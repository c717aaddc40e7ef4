//! Hints from register copies.
//!
//! A copy between two virtual registers asks for both to be coalesced into
//! the same register, a copy between a virtual and a physical register asks
//! for the virtual one to be assigned the physical one.

use rustc_hash::FxHashMap;

use crate::{
    backend::{
        context::MContext,
        inst::MInst,
        regs::{PReg, Reg, VReg},
        MFunc,
    },
    collections::linked_list::LinkedListContainerPtr,
};

#[derive(Debug, Clone, Default)]
pub struct AllocHints {
    /// Each copy records both directions, later copies overwrite earlier
    /// ones.
    pub coalesce: FxHashMap<VReg, VReg>,
    pub hint: FxHashMap<VReg, PReg>,
}

impl AllocHints {
    pub fn coalesce_partner(&self, vreg: VReg) -> Option<VReg> { self.coalesce.get(&vreg).copied() }

    pub fn hint(&self, vreg: VReg) -> Option<PReg> { self.hint.get(&vreg).copied() }

    pub fn is_coalesced(&self, vreg: VReg) -> bool { self.coalesce.contains_key(&vreg) }

    pub fn is_hinted(&self, vreg: VReg) -> bool { self.hint.contains_key(&vreg) }

    /// Record a copy `dst = src`.
    pub fn record_move(&mut self, dst: Reg, src: Reg) {
        match (dst, src) {
            (Reg::V(dst), Reg::V(src)) => {
                if dst != src {
                    self.coalesce.insert(dst, src);
                    self.coalesce.insert(src, dst);
                }
            }
            (Reg::V(vreg), Reg::P(preg)) | (Reg::P(preg), Reg::V(vreg)) => {
                self.hint.insert(vreg, preg);
            }
            (Reg::P(_), Reg::P(_)) => {}
        }
    }
}

pub fn analyze_on_function<I>(mctx: &MContext<I>, func: MFunc<I>) -> AllocHints
where
    I: MInst,
{
    let mut hints = AllocHints::default();

    for block in func.iter(mctx) {
        for inst in block.iter(mctx) {
            if let Some((dst, src)) = inst.match_move(mctx) {
                hints.record_move(dst, src);
            }
        }
    }

    hints
}
