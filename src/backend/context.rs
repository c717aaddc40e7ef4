use core::fmt;

use super::{
    block::MBlockData,
    func::{MFunc, MFuncData},
    inst::{DisplayMInst, MInst},
    regs::{RegKind, VReg},
};
use crate::collections::{
    linked_list::{LinkedListContainerPtr, LinkedListNodePtr},
    storage::BaseArena,
};

/// Owner of all machine functions, blocks and instructions.
pub struct MContext<I>
where
    I: MInst,
{
    pub(super) insts: BaseArena<I::T>,
    pub(super) blocks: BaseArena<MBlockData<I>>,
    pub(super) funcs: BaseArena<MFuncData<I>>,

    vreg_counter: u32,
}

impl<I> Default for MContext<I>
where
    I: MInst,
{
    fn default() -> Self {
        Self {
            insts: BaseArena::default(),
            blocks: BaseArena::default(),
            funcs: BaseArena::default(),
            vreg_counter: 0,
        }
    }
}

impl<I> MContext<I>
where
    I: MInst,
{
    pub fn new() -> Self { Self::default() }

    pub fn new_vreg(&mut self, kind: RegKind) -> VReg {
        let vreg = VReg::new(self.vreg_counter, kind);
        self.vreg_counter += 1;
        vreg
    }

    /// Make sure that freshly created virtual registers are numbered after
    /// `vreg`, used when virtual registers are created outside the context.
    pub fn reserve_vreg(&mut self, vreg: VReg) {
        self.vreg_counter = self.vreg_counter.max(vreg.num() + 1);
    }

    /// All functions, in creation order.
    pub fn funcs(&self) -> Vec<MFunc<I>> {
        self.funcs
            .iter()
            .map(|(_, func_data)| func_data.self_ptr())
            .collect()
    }

    pub fn find_func(&self, label: &str) -> Option<MFunc<I>> {
        self.funcs
            .iter()
            .map(|(_, func_data)| func_data.self_ptr())
            .find(|func| func.label(self).as_str() == label)
    }

    pub fn display(&self) -> DisplayMContext<I> { DisplayMContext { mctx: self } }
}

pub struct DisplayMContext<'a, I>
where
    I: MInst,
{
    mctx: &'a MContext<I>,
}

impl<'a, I> fmt::Display for DisplayMContext<'a, I>
where
    I: DisplayMInst<'a>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\t.text")?;
        for func in self.mctx.funcs() {
            let label = func.label(self.mctx);

            if func.is_external(self.mctx) {
                writeln!(f, "\t.extern {}", label)?;
                continue;
            }

            writeln!(f, "\t.global {}", label)?;
            writeln!(f, "\t.type {}, @function", label)?;

            writeln!(f, "\t# frame size: {}", func.stack_frame_size(self.mctx))?;

            // the entry block usually carries the function label
            let entry = func.head(self.mctx);
            if entry.map_or(true, |block| block.label(self.mctx) != label) {
                writeln!(f, "{}:", label)?;
            }

            let mut curr = entry;
            while let Some(block) = curr {
                writeln!(f, "{}:", block.label(self.mctx))?;
                for inst in block.iter(self.mctx) {
                    writeln!(f, "\t{}", inst.display(self.mctx))?;
                }
                curr = block.next(self.mctx);
            }

            writeln!(f)?;
        }

        Ok(())
    }
}
