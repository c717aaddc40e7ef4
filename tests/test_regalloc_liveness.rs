use common::{func, parse};
use rvalloc::backend::{
    inst::DisplayMInst,
    reg_alloc::{
        block_defuse_analysis,
        live_range_analysis::{self, Range},
        liveness_analysis,
    },
    riscv64::{regs, RvAllocTarget, RvInst},
    MBlock,
    Reg,
};
use rvalloc::collections::linked_list::LinkedListContainerPtr;

mod common;

const SUM: &str = "
    .func sum
sum:
    li $r0, 0
    li $r1, 10
loop:
    add $r0, $r0, $r1
    addi $r1, $r1, -1
    bnez $r1, loop
exit:
    mv a0, $r0
    ret a0
    .endfunc
";

fn reg(name: &str) -> Reg { regs::parse_reg(name).unwrap() }

fn set(names: &[&str]) -> Vec<Reg> {
    let mut regs: Vec<Reg> = names.iter().map(|name| reg(name)).collect();
    regs.sort();
    regs
}

fn sorted(regs: Option<&rustc_hash::FxHashSet<Reg>>) -> Vec<Reg> {
    let mut regs: Vec<Reg> = regs.unwrap().iter().copied().collect();
    regs.sort();
    regs
}

#[test]
fn test_regalloc_block_defuse() {
    let mctx = parse(SUM);
    let func = func(&mctx, "sum");
    let blocks: Vec<MBlock<RvInst>> = func.iter(&mctx).collect();

    let def_uses = block_defuse_analysis::analyze_on_function::<RvAllocTarget>(&mctx, func);

    assert_eq!(sorted(def_uses.uses(&blocks[0])), set(&[]));
    assert_eq!(sorted(def_uses.defs(&blocks[0])), set(&["$r0", "$r1"]));
    assert_eq!(sorted(def_uses.uses(&blocks[1])), set(&["$r0", "$r1"]));
    assert_eq!(sorted(def_uses.defs(&blocks[1])), set(&["$r0", "$r1"]));
    // a0 is written before it is read, zero is not tracked
    assert_eq!(sorted(def_uses.uses(&blocks[2])), set(&["$r0"]));
    assert_eq!(sorted(def_uses.defs(&blocks[2])), set(&["a0"]));
}

#[test]
fn test_regalloc_liveness_loop() {
    let mctx = parse(SUM);
    let func = func(&mctx, "sum");
    let blocks: Vec<MBlock<RvInst>> = func.iter(&mctx).collect();

    let in_out = liveness_analysis::analyze_on_function::<RvAllocTarget>(&mctx, func);

    assert_eq!(sorted(in_out.in_(&blocks[0])), set(&[]));
    assert_eq!(sorted(in_out.out(&blocks[0])), set(&["$r0", "$r1"]));
    assert_eq!(sorted(in_out.in_(&blocks[1])), set(&["$r0", "$r1"]));
    assert_eq!(sorted(in_out.out(&blocks[1])), set(&["$r0", "$r1"]));
    assert_eq!(sorted(in_out.in_(&blocks[2])), set(&["$r0"]));
    assert_eq!(sorted(in_out.out(&blocks[2])), set(&[]));

    let display = in_out.display::<RvAllocTarget>(&mctx, func);
    assert!(display.contains("loop in: $r0, $r1\n"));
    assert!(display.contains("exit out: \n"));
}

#[test]
fn test_regalloc_live_ranges_loop() {
    let mctx = parse(SUM);
    let func = func(&mctx, "sum");
    let blocks: Vec<MBlock<RvInst>> = func.iter(&mctx).collect();
    let (sum, body, exit) = (blocks[0], blocks[1], blocks[2]);

    let live = live_range_analysis::analyze_on_function::<RvAllocTarget>(&mctx, func);

    assert_eq!(live.num_insts(), 7);
    assert_eq!(live.block_bounds[&sum], (0, 1));
    assert_eq!(live.block_bounds[&body], (2, 4));
    assert_eq!(live.block_bounds[&exit], (5, 6));

    // the accumulator is live through the whole loop body, and read at its
    // top before being redefined
    assert_eq!(
        live.ranges(reg("$r0")),
        &[
            Range::new(sum, 0, 1, 1),
            Range::new(body, 2, 4, 1),
            Range::new(body, 2, 2, 1),
            Range::new(exit, 5, 5, 1),
        ]
    );
    assert_eq!(
        live.ranges(reg("$r1")),
        &[
            Range::new(sum, 1, 1, 1),
            Range::new(body, 2, 3, 2),
            Range::new(body, 3, 4, 2),
        ]
    );
    assert_eq!(live.ranges(reg("a0")), &[Range::new(exit, 5, 6, 2)]);
    assert_eq!(live.regs(), set(&["a0", "$r0", "$r1"]));

    let display = live.display::<RvAllocTarget>(&mctx);
    assert!(display.contains("$r1: [1, 1]x1@sum [2, 3]x2@loop [3, 4]x2@loop\n"));
    assert!(display.contains("a0: [5, 6]x2@exit\n"));
}

#[test]
fn test_regalloc_live_ranges_dead_and_unreachable() {
    let mctx = parse(
        "
    .func f
f:
    li $r0, 1
    li $r1, 2
    mv a0, $r1
    ret a0
dead:
    addi $r2, $r0, 1
    ret
    .endfunc
",
    );
    let func = func(&mctx, "f");
    let blocks: Vec<MBlock<RvInst>> = func.iter(&mctx).collect();

    let live = live_range_analysis::analyze_on_function::<RvAllocTarget>(&mctx, func);

    // the definition is never read on a reachable path, and the read in the
    // unreachable block is not connected to it
    assert_eq!(
        live.ranges(reg("$r0")),
        &[Range::new(blocks[0], 0, 0, 1), Range::new(blocks[1], 4, 4, 1)]
    );
    assert_eq!(live.ranges(reg("$r1")), &[Range::new(blocks[0], 1, 2, 2)]);
    // dead definition
    assert_eq!(live.ranges(reg("$r2")), &[Range::new(blocks[1], 4, 4, 1)]);
    assert_eq!(live.inst(4).display(&mctx).to_string(), "addi $r2, $r0, 1");
}

#[test]
fn test_regalloc_live_ranges_call_clobbers() {
    let mctx = parse(
        "
    .extern g
    .func f
f:
    li $r0, 1
    li a0, 2
    call g, a0
    mv a0, $r0
    ret a0
    .endfunc
",
    );
    let func = func(&mctx, "f");
    let entry = func.head(&mctx).unwrap();

    let live = live_range_analysis::analyze_on_function::<RvAllocTarget>(&mctx, func);

    assert_eq!(live.ranges(reg("$r0")), &[Range::new(entry, 0, 3, 2)]);
    // the argument and the clobbers of the call
    assert_eq!(
        live.ranges(reg("a0")),
        &[
            Range::new(entry, 1, 2, 2),
            Range::new(entry, 2, 2, 1),
            Range::new(entry, 3, 4, 2),
        ]
    );
    assert_eq!(live.ranges(reg("t3")), &[Range::new(entry, 2, 2, 1)]);
    // callee-saved registers are not tracked
    assert!(live.ranges(reg("s1")).is_empty());
    assert!(live.ranges(reg("ra")).is_empty());
}
