//! # RISC-V64 Target
//!
//! - `imm`: 12-bit signed immediates.
//! - `inst`: The instruction subset handled by the allocator.
//! - `regs`: Register names and register classes.
//! - `target`: Register allocation hooks, including spill code.

pub mod imm;
pub mod inst;
pub mod regs;
pub mod target;

pub use imm::Imm12;
pub use inst::{RvInst, RvInstKind};
pub use target::RvAllocTarget;
