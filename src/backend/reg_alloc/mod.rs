//! # Register Allocation
//!
//! This module implements a greedy register allocator in the style of LLVM's
//! greedy allocator, and the analyses it consumes.
//!
//! - `block_defuse_analysis`: Block-level def-use analysis.
//! - `liveness_analysis`: Liveness analysis (aka. in and out set).
//! - `live_range_analysis`: Per-block live ranges over a global instruction
//!   numbering.
//! - `alloc_hint`: Coalescing and preferred-register hints from copies.
//! - `greedy_allocation`: The staged, priority driven allocator and the code
//!   rewriter.

pub mod alloc_hint;
pub mod block_defuse_analysis;
pub mod greedy_allocation;
pub mod live_range_analysis;
pub mod liveness_analysis;

use thiserror::Error;

use super::{
    context::MContext,
    inst::MInst,
    regs::{PReg, Reg, RegKind, VReg},
};
use crate::utils::loop_weight::DEFAULT_LOOP_FACTOR;

pub use greedy_allocation::{AllocStats, GreedyAllocation};

/// Target hooks of the register allocator.
pub trait RegAllocTarget {
    type I: MInst;

    fn display_reg(reg: Reg) -> String;

    /// The registers handed out by the allocator, in preference order.
    fn allocatable_regs(kind: RegKind) -> Vec<PReg>;

    /// If the explicit occurrences of the register are tracked by liveness
    /// and must not overlap allocated values.
    fn is_fixed_conflict(reg: PReg) -> bool;

    /// Scratch registers of spill code, never allocated.
    fn spill_regs(kind: RegKind) -> &'static [PReg];

    /// If a slot at this offset can be addressed directly.
    fn offset_fits(offset: u64) -> bool;

    /// Insert a load of the slot at `offset` into `data` before `before`.
    ///
    /// `addr` holds the slot address when the offset does not fit, it can be
    /// the same register as `data`.
    fn load_slot(mctx: &mut MContext<Self::I>, before: Self::I, data: PReg, addr: PReg, offset: u64);

    /// Insert a store of `data` to the slot at `offset` after `after`.
    ///
    /// `addr` holds the slot address when the offset does not fit, it must
    /// differ from `data`.
    fn store_slot(mctx: &mut MContext<Self::I>, after: Self::I, data: PReg, addr: PReg, offset: u64);
}

/// Configuration of the register allocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegAllocConfig {
    /// The weight multiplier of each enclosing loop.
    pub loop_weight: f64,
    /// Remove the copies whose source and destination end up in the same
    /// register.
    pub remove_identity_moves: bool,
    /// Only hand out the first N allocatable registers of each kind.
    pub reg_limit: Option<usize>,
}

impl Default for RegAllocConfig {
    fn default() -> Self {
        Self {
            loop_weight: DEFAULT_LOOP_FACTOR,
            remove_identity_moves: true,
            reg_limit: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegAllocError {
    /// An instruction needs more reloads than there are scratch registers.
    #[error("no scratch register left to reload {vreg} at instruction {inst_number} of {func}")]
    ScratchExhausted {
        func: String,
        vreg: VReg,
        inst_number: usize,
    },
}
