//! # Assembly Reader
//!
//! Reads RISC-V64 assembly extended with virtual registers (`$r<N>` and
//! `$f<N>`) into machine code, so that functions can be fed to the register
//! allocator.
//!
//! ```text
//!     .extern putint
//!     .func main
//!     .frame 16
//! main:
//!     li $r0, 0
//! loop:
//!     addi $r0, $r0, 1
//!     li $r1, 10
//!     blt $r0, $r1, loop
//!     mv a0, $r0
//!     call putint, a0
//!     ret
//!     .endfunc
//! ```

mod asm;

pub use asm::{parse, ParseError, ParseErrorKind};
