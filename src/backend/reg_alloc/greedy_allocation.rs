//! # Greedy Register Allocation
//!
//! Every live virtual register becomes one allocation unit, an [AllocId],
//! walking through the stages
//!
//! ```text
//! New -> Assign
//! New | Assign -> Split -> Spill -> Done
//! ```
//!
//! Units wait in a priority queue, small units first. A unit takes the hinted
//! register, or the first free allocatable one, or evicts the occupants of the
//! cheapest register when they weigh less than itself. Otherwise it is demoted,
//! and as splitting is not performed, demoted units are spilled to a stack
//! slot. Once the queue is drained the assigned registers are written back to
//! the instructions.

use std::{cmp::Reverse, collections::BinaryHeap, fmt, marker::PhantomData};

use log::{debug, info, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    alloc_hint::{self, AllocHints},
    live_range_analysis::{self, ranges_conflict, LiveRanges, Range},
    RegAllocConfig,
    RegAllocError,
    RegAllocTarget,
};
use crate::{
    backend::{
        context::MContext,
        inst::MInst,
        regs::{PReg, Reg, RegKind, VReg},
        MBlock,
        MFunc,
    },
    collections::linked_list::LinkedListContainerPtr,
    utils::{cfg::CfgInfo, dominance::Dominance, loop_weight::LoopWeights},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocId(usize);

impl fmt::Display for AllocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// The stage of an allocation unit, ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AllocStage {
    New,
    Assign,
    Split,
    Spill,
    Done,
}

/// Queue key, the greatest is handled first: fewer blocks, then fewer
/// referencing instructions, then the more advanced stage, then hinted units,
/// then the older unit.
type Priority = (Reverse<usize>, Reverse<usize>, AllocStage, bool, Reverse<AllocId>);

struct AllocEntry<I> {
    vreg: VReg,
    ranges: Vec<Range<I>>,
    stage: AllocStage,
    preg: Option<PReg>,
    weight: f64,
    evictions: usize,
}

/// Counters of one or more allocation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub alloc_ids: usize,
    /// Units holding a register after allocation.
    pub assigned: usize,
    pub spilled: usize,
    pub evictions: usize,
    /// Calls to the assignment step, including retries after an eviction.
    pub attempts: usize,
    pub demotions: usize,
    pub loads_added: usize,
    pub stores_added: usize,
    pub moves_removed: usize,
}

impl AllocStats {
    pub fn merge(&mut self, other: &AllocStats) {
        self.alloc_ids += other.alloc_ids;
        self.assigned += other.assigned;
        self.spilled += other.spilled;
        self.evictions += other.evictions;
        self.attempts += other.attempts;
        self.demotions += other.demotions;
        self.loads_added += other.loads_added;
        self.stores_added += other.stores_added;
        self.moves_removed += other.moves_removed;
    }
}

impl fmt::Display for AllocStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alloc ids: {}, assigned: {}, spilled: {}, evictions: {}, loads: {}, stores: {}, \
             moves removed: {}",
            self.alloc_ids,
            self.assigned,
            self.spilled,
            self.evictions,
            self.loads_added,
            self.stores_added,
            self.moves_removed
        )
    }
}

/// The mapping chosen for one function.
#[derive(Debug, Clone, Default)]
pub struct AllocResult {
    pub assignment: FxHashMap<VReg, PReg>,
    /// Offset from `sp` of each spilled register.
    pub slots: FxHashMap<VReg, u64>,
    pub stats: AllocStats,
}

/// Estimate the execution frequency of each block of the function.
pub fn block_weights<I>(mctx: &MContext<I>, func: MFunc<I>, factor: f64) -> LoopWeights<MBlock<I>>
where
    I: MInst,
{
    let cfg = CfgInfo::new(mctx, func);
    let dominance = Dominance::new(mctx, &cfg);
    LoopWeights::new(&cfg, &dominance, factor)
}

pub struct GreedyAllocation<T>
where
    T: RegAllocTarget,
{
    pub config: RegAllocConfig,
    /// Counters summed over every function allocated so far.
    pub total: AllocStats,

    _target: PhantomData<T>,
}

impl<T> Default for GreedyAllocation<T>
where
    T: RegAllocTarget,
{
    fn default() -> Self { Self::new(RegAllocConfig::default()) }
}

impl<T> GreedyAllocation<T>
where
    T: RegAllocTarget,
{
    pub fn new(config: RegAllocConfig) -> Self {
        Self {
            config,
            total: AllocStats::default(),
            _target: PhantomData,
        }
    }

    /// Allocate every non-external function of the context.
    pub fn run_on_context(
        &mut self,
        mctx: &mut MContext<T::I>,
    ) -> Result<Vec<(MFunc<T::I>, AllocResult)>, RegAllocError> {
        let mut results = Vec::new();
        for func in mctx.funcs() {
            if func.is_external(mctx) {
                continue;
            }
            let result = self.run_on_function(mctx, func)?;
            results.push((func, result));
        }
        Ok(results)
    }

    pub fn run_on_function(
        &mut self,
        mctx: &mut MContext<T::I>,
        func: MFunc<T::I>,
    ) -> Result<AllocResult, RegAllocError> {
        // nothing to allocate in a function without body
        if func.head(mctx).is_none() {
            return Ok(AllocResult::default());
        }

        let mut ctx = GreedyAllocationContext::<T>::new(mctx, func, self.config);
        ctx.allocate(mctx)?;
        ctx.modify_code(mctx);
        if self.config.remove_identity_moves {
            ctx.remove_identity_moves(mctx);
        }

        let result = ctx.finish();
        info!(
            "greedy allocation of {}: {}",
            func.label(mctx),
            result.stats
        );
        self.total.merge(&result.stats);
        Ok(result)
    }
}

/// The allocation state of one function.
struct GreedyAllocationContext<T>
where
    T: RegAllocTarget,
{
    func: MFunc<T::I>,
    label: String,
    config: RegAllocConfig,

    live: LiveRanges<T::I>,
    hints: AllocHints,
    weights: LoopWeights<MBlock<T::I>>,

    entries: Vec<AllocEntry<T::I>>,
    queue: BinaryHeap<Priority>,
    queued: FxHashSet<AllocId>,
    /// Units currently assigned to each register.
    occupants: FxHashMap<PReg, Vec<AllocId>>,
    slots: FxHashMap<VReg, u64>,
    /// Scratch registers holding reloaded values, per instruction.
    scratch_marks: FxHashMap<T::I, Vec<PReg>>,
    /// Moves reading or writing a virtual register before allocation.
    vreg_moves: Vec<T::I>,

    stats: AllocStats,

    _target: PhantomData<T>,
}

impl<T> GreedyAllocationContext<T>
where
    T: RegAllocTarget,
{
    fn new(mctx: &MContext<T::I>, func: MFunc<T::I>, config: RegAllocConfig) -> Self {
        let live = live_range_analysis::analyze_on_function::<T>(mctx, func);
        trace!(
            "live ranges of {}:\n{}",
            func.label(mctx),
            live.display::<T>(mctx)
        );

        let hints = alloc_hint::analyze_on_function(mctx, func);

        let weights = block_weights(mctx, func, config.loop_weight);
        for block in func.iter(mctx) {
            trace!("weight of {}: {}", block.label(mctx), weights.weight(block));
        }

        let vreg_moves = live
            .insts
            .iter()
            .copied()
            .filter(|inst| {
                inst.match_move(mctx)
                    .map_or(false, |(dst, src)| dst.is_vreg() || src.is_vreg())
            })
            .collect();

        let mut ctx = Self {
            func,
            label: func.label(mctx).to_string(),
            config,
            live,
            hints,
            weights,
            entries: Vec::new(),
            queue: BinaryHeap::new(),
            queued: FxHashSet::default(),
            occupants: FxHashMap::default(),
            slots: FxHashMap::default(),
            scratch_marks: FxHashMap::default(),
            vreg_moves,
            stats: AllocStats::default(),
            _target: PhantomData,
        };

        // `regs` is sorted, so units are numbered in ascending register order
        for vreg in ctx.live.regs().into_iter().filter_map(|reg| reg.as_vreg()) {
            let ranges = ctx.live.ranges(vreg.into()).to_vec();
            let weight = ctx.spill_weight(vreg, &ranges);
            let id = AllocId(ctx.entries.len());
            ctx.entries.push(AllocEntry {
                vreg,
                ranges,
                stage: AllocStage::New,
                preg: None,
                weight,
                evictions: 0,
            });
            ctx.enqueue(id);
        }
        ctx.stats.alloc_ids = ctx.entries.len();

        ctx
    }

    fn entry(&self, id: AllocId) -> &AllocEntry<T::I> { &self.entries[id.0] }

    fn entry_mut(&mut self, id: AllocId) -> &mut AllocEntry<T::I> { &mut self.entries[id.0] }

    /// Σ instr_count × block weight, favoring registers involved in copies.
    fn spill_weight(&self, vreg: VReg, ranges: &[Range<T::I>]) -> f64 {
        let weight: f64 = ranges
            .iter()
            .map(|range| range.instr_count as f64 * self.weights.weight(range.block))
            .sum();

        if self.hints.is_coalesced(vreg) {
            weight * 1.5
        } else if self.hints.is_hinted(vreg) {
            weight * 2.0
        } else {
            weight
        }
    }

    fn priority(&self, id: AllocId) -> Priority {
        let entry = self.entry(id);

        let blocks: FxHashSet<MBlock<T::I>> = entry.ranges.iter().map(|range| range.block).collect();
        let instr_count: usize = entry.ranges.iter().map(|range| range.instr_count).sum();
        let hinted = self.hints.is_coalesced(entry.vreg) || self.hints.is_hinted(entry.vreg);

        (
            Reverse(blocks.len()),
            Reverse(instr_count),
            entry.stage,
            hinted,
            Reverse(id),
        )
    }

    fn enqueue(&mut self, id: AllocId) {
        if self.queued.insert(id) {
            let priority = self.priority(id);
            self.queue.push(priority);
        }
    }

    fn dequeue(&mut self) -> Option<AllocId> {
        let (.., Reverse(id)) = self.queue.pop()?;
        self.queued.remove(&id);
        Some(id)
    }

    fn allocate(&mut self, mctx: &mut MContext<T::I>) -> Result<(), RegAllocError> {
        while let Some(id) = self.dequeue() {
            match self.entry(id).stage {
                AllocStage::New | AllocStage::Assign => self.try_allocate(id),
                AllocStage::Split => self.try_split(id),
                AllocStage::Spill => self.spill(mctx, id)?,
                AllocStage::Done => unreachable!("finished allocation unit {} in queue", id),
            }
        }
        Ok(())
    }

    /// The registers a virtual register may take, the hinted one first.
    fn candidates(&self, vreg: VReg) -> Vec<PReg> {
        let mut allocatable = T::allocatable_regs(vreg.kind());
        if let Some(limit) = self.config.reg_limit {
            allocatable.truncate(limit);
        }

        let mut candidates = Vec::with_capacity(allocatable.len());
        if let Some(hint) = self.hints.hint(vreg) {
            if allocatable.contains(&hint) {
                candidates.push(hint);
            }
        }
        for preg in allocatable {
            if !candidates.contains(&preg) {
                candidates.push(preg);
            }
        }
        candidates
    }

    /// If the register itself is live somewhere in the unit's ranges.
    fn has_hard_conflict(&self, id: AllocId, preg: PReg) -> bool {
        T::is_fixed_conflict(preg)
            && ranges_conflict(&self.entry(id).ranges, self.live.ranges(preg.into()))
    }

    fn conflicting_occupants(&self, id: AllocId, preg: PReg) -> Vec<AllocId> {
        let ranges = &self.entry(id).ranges;
        self.occupants
            .get(&preg)
            .map(|occupants| {
                occupants
                    .iter()
                    .copied()
                    .filter(|&occupant| ranges_conflict(ranges, &self.entry(occupant).ranges))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn try_allocate(&mut self, id: AllocId) {
        self.stats.attempts += 1;

        let vreg = self.entry(id).vreg;
        let candidates = self.candidates(vreg);
        // an occupant evicted as many times as the class has registers is
        // kept, so the queue drains after O(units x registers) steps; this
        // only guards termination and is not a cost rule
        let eviction_cap = candidates.len();

        for &preg in candidates.iter() {
            if !self.has_hard_conflict(id, preg) && self.conflicting_occupants(id, preg).is_empty() {
                self.assign(id, preg);
                return;
            }
        }

        let mut cheapest: Option<(f64, PReg, Vec<AllocId>)> = None;
        for &preg in candidates.iter() {
            if self.has_hard_conflict(id, preg) {
                continue;
            }
            let occupants = self.conflicting_occupants(id, preg);
            if occupants
                .iter()
                .any(|&occupant| self.entry(occupant).evictions >= eviction_cap)
            {
                continue;
            }
            let cost: f64 = occupants
                .iter()
                .map(|&occupant| self.entry(occupant).weight)
                .sum();
            if cheapest.as_ref().map_or(true, |(min, ..)| cost < *min) {
                cheapest = Some((cost, preg, occupants));
            }
        }

        let weight = self.entry(id).weight;
        match cheapest {
            Some((cost, preg, occupants)) if weight > cost => {
                for occupant in occupants {
                    self.evict(occupant, preg);
                }
                self.assign(id, preg);
            }
            Some(_) | None => {
                debug!("{}: demote {} ({}), weight {}", self.label, id, vreg, weight);
                self.stats.demotions += 1;
                self.entry_mut(id).stage = AllocStage::Split;
                self.enqueue(id);
            }
        }
    }

    fn assign(&mut self, id: AllocId, preg: PReg) {
        let entry = self.entry_mut(id);
        entry.preg = Some(preg);
        entry.stage = AllocStage::Assign;
        let vreg = entry.vreg;

        self.occupants.entry(preg).or_default().push(id);
        debug!(
            "{}: assign {} to {} ({})",
            self.label,
            T::display_reg(preg.into()),
            id,
            vreg
        );

        if let Some(partner) = self.hints.coalesce_partner(vreg) {
            self.hints.hint.insert(partner, preg);
        }
    }

    fn evict(&mut self, id: AllocId, preg: PReg) {
        if let Some(occupants) = self.occupants.get_mut(&preg) {
            occupants.retain(|&occupant| occupant != id);
        }

        let entry = self.entry_mut(id);
        entry.preg = None;
        entry.evictions += 1;
        let vreg = entry.vreg;

        debug!(
            "{}: evict {} ({}) from {}",
            self.label,
            id,
            vreg,
            T::display_reg(preg.into())
        );
        self.stats.evictions += 1;
        self.enqueue(id);
    }

    /// Splitting is not performed, the unit goes to the stack as a whole.
    fn try_split(&mut self, id: AllocId) {
        self.entry_mut(id).stage = AllocStage::Spill;
        self.enqueue(id);
    }

    /// The slot of a spilled register, appended to the frame on first use.
    fn slot_of(&mut self, mctx: &mut MContext<T::I>, vreg: VReg) -> u64 {
        if let Some(&offset) = self.slots.get(&vreg) {
            return offset;
        }
        let offset = self.func.stack_frame_size(mctx);
        self.func.add_stack_frame_size(mctx, 8);
        self.slots.insert(vreg, offset);
        offset
    }

    /// The first scratch register of the kind not read by the instruction and
    /// not holding another reloaded value.
    fn pick_scratch(&self, mctx: &MContext<T::I>, inst: T::I, kind: RegKind) -> Option<PReg> {
        let uses = inst.uses(mctx);
        let marks = self.scratch_marks.get(&inst);
        T::spill_regs(kind).iter().copied().find(|&scratch| {
            !uses.contains(&scratch.into())
                && !marks.map_or(false, |marks| marks.contains(&scratch))
        })
    }

    fn spill(&mut self, mctx: &mut MContext<T::I>, id: AllocId) -> Result<(), RegAllocError> {
        let vreg = self.entry(id).vreg;
        let reg: Reg = vreg.into();

        let mut seen = FxHashSet::default();
        let mut def_insts = Vec::new();
        let mut use_insts = Vec::new();
        for range in self.entry(id).ranges.iter() {
            for number in range.start..=range.end {
                if !seen.insert(number) {
                    continue;
                }
                let inst = self.live.inst(number);
                if inst.uses(mctx).contains(&reg) {
                    use_insts.push((number, inst));
                }
                if inst.defs(mctx).contains(&reg) {
                    def_insts.push(inst);
                }
            }
        }

        let offset = self.slot_of(mctx, vreg);
        let fits = T::offset_fits(offset);
        debug!("{}: spill {} ({}) to {}(sp)", self.label, id, vreg, offset);

        let exhausted = |label: &str, inst_number| RegAllocError::ScratchExhausted {
            func: label.to_string(),
            vreg,
            inst_number,
        };

        for (number, inst) in use_insts {
            let scratch = self
                .pick_scratch(mctx, inst, vreg.kind())
                .ok_or_else(|| exhausted(&self.label, number))?;
            self.scratch_marks.entry(inst).or_default().push(scratch);

            let addr = match vreg.kind() {
                RegKind::General => scratch,
                // the address is computed before the load, another reload of
                // this instruction cannot be clobbered
                RegKind::Float if fits => scratch,
                RegKind::Float => self
                    .pick_scratch(mctx, inst, RegKind::General)
                    .ok_or_else(|| exhausted(&self.label, number))?,
            };

            inst.replace_use(mctx, reg, scratch.into());
            T::load_slot(mctx, inst, scratch, addr, offset);
            self.stats.loads_added += 1;
        }

        let general = T::spill_regs(RegKind::General);
        for inst in def_insts {
            let (data, addr) = match vreg.kind() {
                RegKind::General if fits => (general[0], general[0]),
                RegKind::General => (general[1], general[0]),
                RegKind::Float => (T::spill_regs(RegKind::Float)[0], general[0]),
            };

            inst.replace_def(mctx, reg, data.into());
            T::store_slot(mctx, inst, data, addr, offset);
            self.stats.stores_added += 1;
        }

        self.entry_mut(id).stage = AllocStage::Done;
        self.stats.spilled += 1;
        Ok(())
    }

    /// Write the assigned registers to every instruction of their ranges.
    fn modify_code(&mut self, mctx: &mut MContext<T::I>) {
        for entry in self.entries.iter() {
            let Some(preg) = entry.preg else {
                continue;
            };
            for range in entry.ranges.iter() {
                for number in range.start..=range.end {
                    self.live
                        .inst(number)
                        .replace_reg(mctx, entry.vreg.into(), preg.into());
                }
            }
            self.func.add_saved_reg(mctx, preg);
            self.stats.assigned += 1;
        }
    }

    /// Remove copies turned into `r = r` by coalescing. Moves between
    /// physical registers in the input are kept as written.
    fn remove_identity_moves(&mut self, mctx: &mut MContext<T::I>) {
        for &inst in self.vreg_moves.iter() {
            if let Some((dst, src)) = inst.match_move(mctx) {
                if dst == src {
                    trace!("{}: remove identity move of {}", self.label, T::display_reg(dst));
                    inst.remove(mctx);
                    self.stats.moves_removed += 1;
                }
            }
        }
    }

    fn finish(self) -> AllocResult {
        let assignment = self
            .entries
            .iter()
            .filter_map(|entry| entry.preg.map(|preg| (entry.vreg, preg)))
            .collect();

        AllocResult {
            assignment,
            slots: self.slots,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::riscv64::{regs, RvAllocTarget, RvInst};

    #[test]
    fn test_priority_prefers_small_units() {
        let mut mctx: MContext<RvInst> = MContext::new();
        let func = MFunc::new(&mut mctx, "f");
        let block = MBlock::new(&mut mctx, "f");
        func.push_back(&mut mctx, block);

        let v0: Reg = mctx.new_vreg(RegKind::General).into();
        let v1: Reg = mctx.new_vreg(RegKind::General).into();
        let a0: Reg = regs::a0().into();

        // v0 is referenced three times, v1 twice
        let insts = [
            RvInst::build_li(&mut mctx, v0, 1),
            RvInst::build_li(&mut mctx, v1, 2),
            RvInst::build_alu_rrr(
                &mut mctx,
                crate::backend::riscv64::inst::AluOpRRR::Add,
                a0,
                v0,
                v1,
            ),
            RvInst::build_alu_rrr(
                &mut mctx,
                crate::backend::riscv64::inst::AluOpRRR::Add,
                a0,
                a0,
                v0,
            ),
            RvInst::ret(&mut mctx, vec![regs::a0()]),
        ];
        for inst in insts {
            block.push_back(&mut mctx, inst);
        }

        let mut ctx =
            GreedyAllocationContext::<RvAllocTarget>::new(&mctx, func, RegAllocConfig::default());
        assert_eq!(ctx.entries.len(), 2);
        assert!(ctx.priority(AllocId(1)) > ctx.priority(AllocId(0)));
        assert_eq!(ctx.dequeue(), Some(AllocId(1)));
        assert_eq!(ctx.dequeue(), Some(AllocId(0)));
        assert_eq!(ctx.dequeue(), None);

        // a demoted unit goes before a new one of the same size
        ctx.entry_mut(AllocId(0)).stage = AllocStage::Split;
        let (_, _, stage, ..) = ctx.priority(AllocId(0));
        assert_eq!(stage, AllocStage::Split);
        assert!(AllocStage::Spill > AllocStage::Split);
        assert!(AllocStage::Split > AllocStage::Assign);
        assert!(AllocStage::Assign > AllocStage::New);
    }

    #[test]
    fn test_candidates_hint_first() {
        let mut mctx: MContext<RvInst> = MContext::new();
        let func = MFunc::new(&mut mctx, "f");
        let block = MBlock::new(&mut mctx, "f");
        func.push_back(&mut mctx, block);

        let v0 = mctx.new_vreg(RegKind::General);
        let mv = RvInst::build_alu_rri(
            &mut mctx,
            crate::backend::riscv64::inst::AluOpRRI::Addi,
            v0.into(),
            regs::s3().into(),
            crate::backend::riscv64::Imm12::zero(),
        );
        block.push_back(&mut mctx, mv);
        let ret = RvInst::ret(&mut mctx, vec![]);
        block.push_back(&mut mctx, ret);

        let config = RegAllocConfig {
            reg_limit: Some(3),
            ..RegAllocConfig::default()
        };
        let ctx = GreedyAllocationContext::<RvAllocTarget>::new(&mctx, func, config);
        // s3 is beyond the limit and thus not a candidate
        assert_eq!(ctx.candidates(v0), vec![regs::a0(), regs::a1(), regs::a2()]);

        let ctx = GreedyAllocationContext::<RvAllocTarget>::new(&mctx, func, RegAllocConfig::default());
        let candidates = ctx.candidates(v0);
        assert_eq!(candidates[0], regs::s3());
        assert_eq!(candidates[1], regs::a0());
        assert_eq!(candidates.iter().filter(|&&r| r == regs::s3()).count(), 1);
    }
}
