use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    block_defuse_analysis::is_tracked,
    liveness_analysis::{self, BlockInOut},
    RegAllocTarget,
};
use crate::{
    backend::{context::MContext, inst::MInst, regs::Reg, MBlock, MFunc},
    collections::linked_list::LinkedListContainerPtr,
};

/// Both-ends inclusive range of instruction numbers within one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<I> {
    pub block: MBlock<I>,
    pub start: usize,
    pub end: usize,
    /// Number of instructions in the range reading or writing the register.
    pub instr_count: usize,
}

impl<I> Range<I> {
    pub fn new(block: MBlock<I>, start: usize, end: usize, instr_count: usize) -> Self {
        Self {
            block,
            start,
            end,
            instr_count,
        }
    }

    /// Check if two ranges overlap. Ranges touching at one end, like
    /// `[a, n]` and `[n, b]`, do not.
    pub fn conflicts(&self, other: &Range<I>) -> bool {
        let (s1, e1) = (self.start, self.end);
        let (s2, e2) = (other.start, other.end);
        (s1 >= s2 && s1 < e2) || (e1 > s2 && e1 <= e2) || (s1 <= s2 && e1 >= e2)
    }
}

impl<I> fmt::Display for Range<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]x{}", self.start, self.end, self.instr_count)
    }
}

/// Check if any range of `a` conflicts with any range of `b`.
pub fn ranges_conflict<I>(a: &[Range<I>], b: &[Range<I>]) -> bool {
    a.iter().any(|ra| b.iter().any(|rb| ra.conflicts(rb)))
}

#[derive(Debug, Clone)]
pub struct LiveRanges<I> {
    /// Ranges of each tracked register, sorted by start.
    pub ranges: FxHashMap<Reg, Vec<Range<I>>>,
    /// Instruction numbering in layout order.
    pub insts: Vec<I>,
    /// First and last instruction number of each non-empty block.
    pub block_bounds: FxHashMap<MBlock<I>, (usize, usize)>,
    pub in_out: BlockInOut<I>,
}

impl<I> LiveRanges<I>
where
    I: MInst,
{
    /// The ranges of `reg`, empty if the register is never live.
    pub fn ranges(&self, reg: Reg) -> &[Range<I>] {
        self.ranges.get(&reg).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn inst(&self, number: usize) -> I {
        *self
            .insts
            .get(number)
            .expect("instruction number out of the numbering")
    }

    pub fn num_insts(&self) -> usize { self.insts.len() }

    /// Tracked registers, sorted.
    pub fn regs(&self) -> Vec<Reg> {
        let mut regs: Vec<Reg> = self.ranges.keys().copied().collect();
        regs.sort();
        regs
    }

    pub fn display<T>(&self, mctx: &MContext<I>) -> String
    where
        T: RegAllocTarget<I = I>,
    {
        let mut s = String::new();

        for reg in self.regs() {
            s.push_str(&format!("{}:", T::display_reg(reg)));
            for range in self.ranges(reg) {
                s.push_str(&format!(" {}@{}", range, range.block.label(mctx)));
            }
            s.push('\n');
        }

        s
    }
}

/// Distinct tracked registers of a list, in order of appearance.
fn tracked_regs<T>(regs: Vec<Reg>) -> Vec<Reg>
where
    T: RegAllocTarget,
{
    let mut seen = FxHashSet::default();
    regs.into_iter()
        .filter(|reg| is_tracked::<T>(*reg) && seen.insert(*reg))
        .collect()
}

pub fn analyze_on_function<T>(mctx: &MContext<T::I>, func: MFunc<T::I>) -> LiveRanges<T::I>
where
    T: RegAllocTarget,
{
    let in_out = liveness_analysis::analyze_on_function::<T>(mctx, func);

    let mut insts = Vec::new();
    let mut block_bounds = FxHashMap::default();

    for block in func.iter(mctx) {
        let entry = insts.len();
        insts.extend(block.iter(mctx));
        if insts.len() > entry {
            block_bounds.insert(block, (entry, insts.len() - 1));
        }
    }

    let mut ranges: FxHashMap<Reg, Vec<Range<T::I>>> = FxHashMap::default();

    for block in func.iter(mctx) {
        let Some(&(entry, exit)) = block_bounds.get(&block) else {
            continue;
        };

        // pending ranges as (end, instr_count), their start is not known yet
        let mut pending: FxHashMap<Reg, (usize, usize)> = FxHashMap::default();
        for &reg in in_out.out(&block).expect("live-out of block not found") {
            pending.insert(reg, (exit, 0));
        }

        for number in (entry..=exit).rev() {
            let inst = insts[number];

            for reg in tracked_regs::<T>(inst.defs(mctx)) {
                let range = match pending.remove(&reg) {
                    Some((end, count)) => Range::new(block, number, end, count + 1),
                    // dead def
                    None => Range::new(block, number, number, 1),
                };
                ranges.entry(reg).or_default().push(range);
            }

            for reg in tracked_regs::<T>(inst.uses(mctx)) {
                pending
                    .entry(reg)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert((number, 1));
            }
        }

        let mut flushed: Vec<(Reg, (usize, usize))> = pending.into_iter().collect();
        flushed.sort();
        for (reg, (end, count)) in flushed {
            ranges
                .entry(reg)
                .or_default()
                .push(Range::new(block, entry, end, count));
        }
    }

    for list in ranges.values_mut() {
        list.sort_by_key(|range| range.start);
    }

    LiveRanges {
        ranges,
        insts,
        block_bounds,
        in_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::riscv64::{
        regs,
        RvAllocTarget,
        RvInst,
        inst::AluOpRRR,
    };
    use crate::backend::regs::RegKind;

    #[test]
    fn test_range_conflicts() {
        let mut mctx: MContext<RvInst> = MContext::new();
        let block = MBlock::new(&mut mctx, "bb");

        let r = |start, end| Range::new(block, start, end, 1);

        assert!(r(0, 4).conflicts(&r(2, 6)));
        assert!(r(2, 6).conflicts(&r(0, 4)));
        assert!(r(0, 6).conflicts(&r(2, 3)));
        assert!(r(2, 3).conflicts(&r(0, 6)));
        assert!(r(3, 3).conflicts(&r(0, 6)));
        assert!(r(3, 3).conflicts(&r(3, 3)));

        // touching ends
        assert!(!r(0, 3).conflicts(&r(3, 6)));
        assert!(!r(3, 6).conflicts(&r(0, 3)));
        assert!(!r(0, 2).conflicts(&r(4, 6)));
    }

    #[test]
    fn test_straight_line_ranges() {
        let mut mctx: MContext<RvInst> = MContext::new();
        let func = MFunc::new(&mut mctx, "f");
        let block = MBlock::new(&mut mctx, "f");
        func.push_back(&mut mctx, block);

        let v0: Reg = mctx.new_vreg(RegKind::General).into();
        let v1: Reg = mctx.new_vreg(RegKind::General).into();
        let a0: Reg = regs::a0().into();

        let insts = [
            RvInst::build_li(&mut mctx, v0, 1),
            RvInst::build_li(&mut mctx, v1, 2),
            RvInst::build_alu_rrr(&mut mctx, AluOpRRR::Add, a0, v0, v1),
            RvInst::ret(&mut mctx, vec![regs::a0()]),
        ];
        for inst in insts {
            block.push_back(&mut mctx, inst);
        }

        let live = analyze_on_function::<RvAllocTarget>(&mctx, func);

        assert_eq!(live.num_insts(), 4);
        assert_eq!(live.inst(2), insts[2]);
        assert_eq!(live.ranges(v0), &[Range::new(block, 0, 2, 2)]);
        assert_eq!(live.ranges(v1), &[Range::new(block, 1, 2, 2)]);
        assert_eq!(live.ranges(a0), &[Range::new(block, 2, 3, 2)]);
        // sp and zero are not tracked
        assert!(live.ranges(regs::sp().into()).is_empty());
    }
}
