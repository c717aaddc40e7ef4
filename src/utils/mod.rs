//! # Control Flow Utilities
//!
//! Analyses over any graph whose nodes implement [cfg::CfgNode]. The machine
//! blocks of the backend implement these traits, and so do the synthetic
//! graphs used by the tests.

pub mod cfg;
pub mod dfs;
pub mod dominance;
pub mod loop_weight;
