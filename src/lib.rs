#![forbid(unsafe_code)]
#![warn(clippy::wildcard_enum_match_arm)]

pub mod backend;
pub mod collections;
#[cfg(feature = "target-riscv64")]
pub mod frontend;
pub mod utils;
