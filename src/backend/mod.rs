//! # Machine Code
//!
//! Target independent containers of machine code, and the register allocator
//! running over them. The only target is RISC-V64.

pub mod block;
pub mod context;
pub mod func;
pub mod inst;
pub mod reg_alloc;
pub mod regs;

#[cfg(feature = "target-riscv64")]
pub mod riscv64;

pub use block::MBlock;
pub use context::MContext;
pub use func::{MFunc, MLabel};
pub use inst::{DisplayMInst, MInst};
pub use regs::{PReg, Reg, RegKind, VReg};
