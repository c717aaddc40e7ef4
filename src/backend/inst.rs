use std::hash::Hash;

use super::{block::MBlock, context::MContext, regs::Reg};
use crate::collections::{
    linked_list::LinkedListNodePtr,
    storage::{ArenaAlloc, ArenaDeref, ArenaFree, ArenaPtr, BaseArenaPtr},
};

/// A machine instruction handle.
///
/// The register queries report every operand the allocator must know about,
/// including the physical registers an instruction reads or clobbers
/// implicitly, e.g., the argument registers of a call.
pub trait MInst:
    ArenaPtr<A = MContext<Self>> + LinkedListNodePtr<ContainerPtr = MBlock<Self>> + Hash
{
    fn from_ptr(ptr: BaseArenaPtr<Self::T>) -> Self;

    fn ptr(self) -> BaseArenaPtr<Self::T>;

    fn uses(self, mctx: &MContext<Self>) -> Vec<Reg>;

    fn defs(self, mctx: &MContext<Self>) -> Vec<Reg>;

    /// The branch targets of the instruction.
    fn succs(self, mctx: &MContext<Self>) -> Vec<MBlock<Self>>;

    /// If the next instruction in layout may execute after this one.
    fn falls_through(self, mctx: &MContext<Self>) -> bool;

    /// If this is a register copy, return `(dst, src)`.
    fn match_move(self, mctx: &MContext<Self>) -> Option<(Reg, Reg)>;

    /// Replace every use of `from` with `to`.
    fn replace_use(self, mctx: &mut MContext<Self>, from: Reg, to: Reg);

    /// Replace every def of `from` with `to`.
    fn replace_def(self, mctx: &mut MContext<Self>, from: Reg, to: Reg);

    fn replace_reg(self, mctx: &mut MContext<Self>, from: Reg, to: Reg) {
        self.replace_use(mctx, from, to);
        self.replace_def(mctx, from, to);
    }

    /// Unlink the instruction from its block and free it.
    fn remove(self, mctx: &mut MContext<Self>) {
        self.unlink(mctx);
        mctx.free(self);
    }
}

pub trait DisplayMInst<'a>: MInst {
    type Display: std::fmt::Display + 'a;

    fn display(self, mctx: &'a MContext<Self>) -> Self::Display;
}

impl<I> ArenaAlloc<I::T, I> for MContext<I>
where
    I: MInst,
{
    fn alloc_with<F>(&mut self, f: F) -> I
    where
        F: FnOnce(I) -> I::T,
    {
        I::from_ptr(self.insts.alloc_with(|p| f(I::from_ptr(p))))
    }
}

impl<I> ArenaDeref<I::T, I> for MContext<I>
where
    I: MInst,
{
    fn try_deref(&self, ptr: I) -> Option<&I::T> { self.insts.try_deref(ptr.ptr()) }

    fn try_deref_mut(&mut self, ptr: I) -> Option<&mut I::T> { self.insts.try_deref_mut(ptr.ptr()) }
}

impl<I> ArenaFree<I::T, I> for MContext<I>
where
    I: MInst,
{
    fn free(&mut self, ptr: I) { self.insts.free(ptr.ptr()) }
}
