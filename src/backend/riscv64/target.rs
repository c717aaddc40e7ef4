use super::{
    imm::Imm12,
    inst::{AluOpRRR, LoadOp, RvInst, StoreOp},
    regs,
};
use crate::{
    backend::{
        context::MContext,
        reg_alloc::RegAllocTarget,
        regs::{PReg, Reg, RegKind},
    },
    collections::linked_list::LinkedListNodePtr,
};

/// Register allocation hooks of RISC-V64.
///
/// Spill slots are addressed relative to `sp`. Offsets outside the 12-bit
/// window are materialized into the address register first:
///
/// ```text
/// li   addr, offset
/// add  addr, sp, addr
/// ld   data, 0(addr)
/// ```
pub struct RvAllocTarget;

impl RvAllocTarget {
    /// Build the instructions accessing a slot, with the memory access last.
    fn slot_access<F>(mctx: &mut MContext<RvInst>, addr: PReg, offset: u64, access: F) -> Vec<RvInst>
    where
        F: FnOnce(&mut MContext<RvInst>, Reg, Imm12) -> RvInst,
    {
        let sp: Reg = regs::sp().into();
        if let Some(imm) = Imm12::try_from_u64(offset) {
            return vec![access(mctx, sp, imm)];
        }

        let addr: Reg = addr.into();
        // frame sizes are far below i64::MAX
        let li = RvInst::build_li(mctx, addr, offset as i64);
        let add = RvInst::build_alu_rrr(mctx, AluOpRRR::Add, addr, sp, addr);
        let mem = access(mctx, addr, Imm12::zero());
        vec![li, add, mem]
    }
}

impl RegAllocTarget for RvAllocTarget {
    type I = RvInst;

    fn display_reg(reg: Reg) -> String { regs::display(reg) }

    fn allocatable_regs(kind: RegKind) -> Vec<PReg> { regs::allocatable_regs(kind) }

    fn is_fixed_conflict(reg: PReg) -> bool { regs::is_fixed_conflict(reg) }

    fn spill_regs(kind: RegKind) -> &'static [PReg] { regs::spill_regs(kind) }

    fn offset_fits(offset: u64) -> bool { Imm12::try_from_u64(offset).is_some() }

    fn load_slot(mctx: &mut MContext<RvInst>, before: RvInst, data: PReg, addr: PReg, offset: u64) {
        let op = match data.kind() {
            RegKind::General => LoadOp::Ld,
            RegKind::Float => LoadOp::Fld,
        };
        let insts = Self::slot_access(mctx, addr, offset, |mctx, base, imm| {
            RvInst::build_load(mctx, op, data.into(), base, imm)
        });
        for inst in insts {
            before.insert_before(mctx, inst);
        }
    }

    fn store_slot(mctx: &mut MContext<RvInst>, after: RvInst, data: PReg, addr: PReg, offset: u64) {
        let op = match data.kind() {
            RegKind::General => StoreOp::Sd,
            RegKind::Float => StoreOp::Fsd,
        };
        let insts = Self::slot_access(mctx, addr, offset, |mctx, base, imm| {
            RvInst::build_store(mctx, op, data.into(), base, imm)
        });
        let mut last = after;
        for inst in insts {
            last.insert_after(mctx, inst);
            last = inst;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        block::MBlock,
        func::MFunc,
        inst::DisplayMInst,
        riscv64::inst::AluOpRRI,
    };
    use crate::collections::linked_list::LinkedListContainerPtr;

    fn listing(mctx: &MContext<RvInst>, block: MBlock<RvInst>) -> Vec<String> {
        block
            .iter(mctx)
            .map(|inst| inst.display(mctx).to_string())
            .collect()
    }

    #[test]
    fn test_slot_access_sequences() {
        let mut mctx: MContext<RvInst> = MContext::new();
        let func = MFunc::new(&mut mctx, "f");
        let block = MBlock::new(&mut mctx, "f");
        func.push_back(&mut mctx, block);

        let one = Imm12::try_from_i64(1).unwrap();
        let inst = RvInst::build_alu_rri(
            &mut mctx,
            AluOpRRI::Addi,
            regs::t0().into(),
            regs::t0().into(),
            one,
        );
        block.push_back(&mut mctx, inst);

        RvAllocTarget::load_slot(&mut mctx, inst, regs::t0(), regs::t0(), 16);
        RvAllocTarget::store_slot(&mut mctx, inst, regs::t1(), regs::t0(), 4096);
        RvAllocTarget::load_slot(&mut mctx, inst, regs::ft1(), regs::t1(), 2048);

        assert_eq!(
            listing(&mctx, block),
            vec![
                "ld t0, 16(sp)",
                "li t1, 2048",
                "add t1, sp, t1",
                "fld ft1, 0(t1)",
                "addi t0, t0, 1",
                "li t0, 4096",
                "add t0, sp, t0",
                "sd t1, 0(t0)",
            ]
        );
        assert!(RvAllocTarget::offset_fits(2047));
        assert!(!RvAllocTarget::offset_fits(2048));
    }
}
