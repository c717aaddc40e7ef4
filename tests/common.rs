#![allow(dead_code)]

use rvalloc::{
    backend::{
        inst::{DisplayMInst, MInst},
        reg_alloc::{
            greedy_allocation::AllocResult,
            live_range_analysis::{self, ranges_conflict},
            GreedyAllocation,
            RegAllocConfig,
        },
        riscv64::{regs, RvAllocTarget, RvInst},
        MContext,
        MFunc,
        Reg,
    },
    collections::{
        linked_list::LinkedListContainerPtr,
        storage::{ArenaAlloc, ArenaPtr, BaseArena, BaseArenaPtr},
    },
    frontend,
    impl_arena,
    utils::cfg::{CfgNode, CfgRegion},
};

#[derive(Default)]
pub struct CfgContext {
    blocks: BaseArena<CfgBlockData>,
    funcs: BaseArena<CfgFuncData>,
}

pub struct CfgBlockData {
    succs: Vec<CfgBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgBlock(BaseArenaPtr<CfgBlockData>);

impl_arena!(CfgContext, CfgBlockData, CfgBlock, blocks);

pub struct CfgFuncData {
    entry: CfgBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgFunc(BaseArenaPtr<CfgFuncData>);

impl_arena!(CfgContext, CfgFuncData, CfgFunc, funcs);

impl CfgNode for CfgBlock {
    type Region = CfgFunc;

    fn succs(self, arena: &Self::A) -> Vec<Self> { self.deref(arena).succs.clone() }
}

impl CfgRegion for CfgFunc {
    type Node = CfgBlock;

    fn entry_node(self, arena: &Self::A) -> Self::Node { self.deref(arena).entry }
}

impl CfgFunc {
    pub fn new(arena: &mut CfgContext, entry: CfgBlock) -> Self {
        arena.alloc(CfgFuncData { entry })
    }
}

impl CfgBlock {
    pub fn new(arena: &mut CfgContext) -> Self { arena.alloc(CfgBlockData { succs: Vec::new() }) }

    pub fn add_succ(self, arena: &mut CfgContext, succ: CfgBlock) {
        self.deref_mut(arena).succs.push(succ);
    }
}

/// Create `n` blocks with the given edges, `(from, to)` as block indices.
pub fn build_cfg(arena: &mut CfgContext, n: usize, edges: &[(usize, usize)]) -> Vec<CfgBlock> {
    let blocks: Vec<CfgBlock> = (0..n).map(|_| CfgBlock::new(arena)).collect();
    for &(from, to) in edges {
        blocks[from].add_succ(arena, blocks[to]);
    }
    blocks
}

pub fn parse(src: &str) -> MContext<RvInst> {
    match frontend::parse(src) {
        Ok(mctx) => mctx,
        Err(err) => panic!("failed to parse test assembly: {}", err),
    }
}

pub fn func(mctx: &MContext<RvInst>, name: &str) -> MFunc<RvInst> {
    mctx.find_func(name)
        .unwrap_or_else(|| panic!("function {} not found", name))
}

/// Every instruction of the function, one string each.
pub fn listing(mctx: &MContext<RvInst>, func: MFunc<RvInst>) -> Vec<String> {
    func.iter(mctx)
        .flat_map(|block| block.iter(mctx))
        .map(|inst| inst.display(mctx).to_string())
        .collect()
}

/// Allocate function `name` and check the result against the liveness of the
/// input.
pub fn allocate(
    src: &str,
    name: &str,
    config: RegAllocConfig,
) -> (MContext<RvInst>, MFunc<RvInst>, AllocResult) {
    let mut mctx = parse(src);
    let func = func(&mctx, name);

    let live = live_range_analysis::analyze_on_function::<RvAllocTarget>(&mctx, func);

    let mut allocator = GreedyAllocation::<RvAllocTarget>::new(config);
    let result = match allocator.run_on_function(&mut mctx, func) {
        Ok(result) => result,
        Err(err) => panic!("allocation failed: {}", err),
    };

    // every virtual register ends up in a register or a slot
    for reg in live.regs() {
        if let Reg::V(vreg) = reg {
            let assigned = result.assignment.contains_key(&vreg);
            let spilled = result.slots.contains_key(&vreg);
            assert!(assigned ^ spilled, "{} assigned: {}, spilled: {}", vreg, assigned, spilled);
        }
    }

    // no two simultaneously live values share a register
    let mut assigned: Vec<_> = result
        .assignment
        .iter()
        .map(|(&vreg, &preg)| (vreg, preg))
        .collect();
    assigned.sort();
    for (i, &(v1, p1)) in assigned.iter().enumerate() {
        let ranges1 = live.ranges(v1.into());
        if regs::is_fixed_conflict(p1) {
            assert!(
                !ranges_conflict(ranges1, live.ranges(p1.into())),
                "{} shares {} with its explicit uses",
                v1,
                p1
            );
        }
        for &(v2, p2) in assigned.iter().skip(i + 1) {
            if p1 == p2 {
                assert!(
                    !ranges_conflict(ranges1, live.ranges(v2.into())),
                    "{} and {} share {}",
                    v1,
                    v2,
                    p1
                );
            }
        }
    }

    // no virtual register is left in the code
    for block in func.iter(&mctx) {
        for inst in block.iter(&mctx) {
            for reg in inst.uses(&mctx).into_iter().chain(inst.defs(&mctx)) {
                assert!(reg.is_preg(), "{} left in `{}`", reg, inst.display(&mctx));
            }
        }
    }

    (mctx, func, result)
}

/// Configuration forcing pressure with few registers per class.
pub fn limited(reg_limit: usize) -> RegAllocConfig {
    RegAllocConfig {
        reg_limit: Some(reg_limit),
        ..RegAllocConfig::default()
    }
}
