//! # RISC-V64 Register File
//!
//! Register constructors, names and the register classes the allocator works
//! with.

use std::fmt;

use crate::backend::regs::{PReg, Reg, RegKind, VReg};

macro_rules! define_regs {
    ($kind:ident, $table:ident: $($name:ident = $num:literal),* $(,)?) => {
        $(
            pub const fn $name() -> PReg { PReg::new($num, RegKind::$kind) }
        )*

        /// The ABI names of the register file, indexed by register number.
        const $table: [&str; 32] = [$(stringify!($name)),*];
    };
}

define_regs!(General, GENERAL_NAMES:
    zero = 0, ra = 1, sp = 2, gp = 3, tp = 4, t0 = 5, t1 = 6, t2 = 7,
    s0 = 8, s1 = 9, a0 = 10, a1 = 11, a2 = 12, a3 = 13, a4 = 14, a5 = 15,
    a6 = 16, a7 = 17, s2 = 18, s3 = 19, s4 = 20, s5 = 21, s6 = 22, s7 = 23,
    s8 = 24, s9 = 25, s10 = 26, s11 = 27, t3 = 28, t4 = 29, t5 = 30, t6 = 31,
);

define_regs!(Float, FLOAT_NAMES:
    ft0 = 0, ft1 = 1, ft2 = 2, ft3 = 3, ft4 = 4, ft5 = 5, ft6 = 6, ft7 = 7,
    fs0 = 8, fs1 = 9, fa0 = 10, fa1 = 11, fa2 = 12, fa3 = 13, fa4 = 14, fa5 = 15,
    fa6 = 16, fa7 = 17, fs2 = 18, fs3 = 19, fs4 = 20, fs5 = 21, fs6 = 22, fs7 = 23,
    fs8 = 24, fs9 = 25, fs10 = 26, fs11 = 27, ft8 = 28, ft9 = 29, ft10 = 30, ft11 = 31,
);

pub const fn fp() -> PReg { s0() }

pub fn display_preg(reg: PReg) -> &'static str {
    let table = match reg.kind() {
        RegKind::General => &GENERAL_NAMES,
        RegKind::Float => &FLOAT_NAMES,
    };
    table.get(reg.num() as usize).copied().unwrap_or("<invalid>")
}

/// Parse a physical register by its ABI name, or by `x<N>`/`f<N>`.
pub fn parse_preg(name: &str) -> Option<PReg> {
    if name == "fp" {
        return Some(fp());
    }
    if let Some(num) = GENERAL_NAMES.iter().position(|n| *n == name) {
        return Some(PReg::new(num as u8, RegKind::General));
    }
    if let Some(num) = FLOAT_NAMES.iter().position(|n| *n == name) {
        return Some(PReg::new(num as u8, RegKind::Float));
    }

    let (kind, digits) = if let Some(digits) = name.strip_prefix('x') {
        (RegKind::General, digits)
    } else if let Some(digits) = name.strip_prefix('f') {
        (RegKind::Float, digits)
    } else {
        return None;
    };
    match digits.parse::<u8>() {
        Ok(num) if num < 32 && !digits.starts_with('+') => Some(PReg::new(num, kind)),
        _ => None,
    }
}

/// Parse a virtual register, `$r<N>` for general and `$f<N>` for float.
pub fn parse_vreg(name: &str) -> Option<VReg> {
    let (kind, digits) = if let Some(digits) = name.strip_prefix("$r") {
        (RegKind::General, digits)
    } else if let Some(digits) = name.strip_prefix("$f") {
        (RegKind::Float, digits)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().map(|num| VReg::new(num, kind))
}

pub fn parse_reg(name: &str) -> Option<Reg> {
    parse_vreg(name)
        .map(Reg::V)
        .or_else(|| parse_preg(name).map(Reg::P))
}

impl fmt::Display for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", display_preg(*self)) }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::P(reg) => write!(f, "{}", reg),
            Reg::V(reg) => write!(f, "{}", reg),
        }
    }
}

pub fn display(reg: Reg) -> String { reg.to_string() }

pub const INT_ARG_REGS: [PReg; 8] = [a0(), a1(), a2(), a3(), a4(), a5(), a6(), a7()];

pub const FP_ARG_REGS: [PReg; 8] = [fa0(), fa1(), fa2(), fa3(), fa4(), fa5(), fa6(), fa7()];

/// Registers clobbered by a call.
#[rustfmt::skip]
pub const CALLER_SAVED_REGS: [PReg; 36] = [
    ra(), t0(), t1(), t2(), t3(), t4(), t5(), t6(),
    a0(), a1(), a2(), a3(), a4(), a5(), a6(), a7(),
    ft0(), ft1(), ft2(), ft3(), ft4(), ft5(), ft6(), ft7(),
    ft8(), ft9(), ft10(), ft11(),
    fa0(), fa1(), fa2(), fa3(), fa4(), fa5(), fa6(), fa7(),
];

#[rustfmt::skip]
pub const CALLEE_SAVED_REGS: [PReg; 25] = [
    sp(), s0(), s1(), s2(), s3(), s4(), s5(), s6(), s7(), s8(), s9(), s10(), s11(),
    fs0(), fs1(), fs2(), fs3(), fs4(), fs5(), fs6(), fs7(), fs8(), fs9(), fs10(), fs11(),
];

/// The registers handed out by the allocator, in preference order.
///
/// `t0-t2` and `ft0-ft2` are kept out for spill code, `zero`, `ra`, `sp`,
/// `gp`, `tp` and `s0` are never allocated.
#[rustfmt::skip]
pub const ALLOCATABLE_REGS: [PReg; 52] = [
    a0(), a1(), a2(), a3(), a4(), a5(), a6(), a7(),
    fa0(), fa1(), fa2(), fa3(), fa4(), fa5(), fa6(), fa7(),
    t3(), t4(), t5(), t6(),
    ft3(), ft4(), ft5(), ft6(), ft7(), ft8(), ft9(), ft10(), ft11(),
    s1(), s2(), s3(), s4(), s5(), s6(), s7(), s8(), s9(), s10(), s11(),
    fs0(), fs1(), fs2(), fs3(), fs4(), fs5(), fs6(), fs7(), fs8(), fs9(), fs10(), fs11(),
];

/// Scratch registers of general spill code, never allocated.
pub const SPILL_GENERAL_REGS: [PReg; 2] = [t0(), t1()];

/// Scratch registers of float spill code, never allocated.
pub const SPILL_FLOAT_REGS: [PReg; 3] = [ft0(), ft1(), ft2()];

/// Argument and temporary registers. Their explicit uses in a function are
/// tracked by liveness, so values never live across them.
#[rustfmt::skip]
pub const FIXED_CONFLICT_REGS: [PReg; 35] = [
    a0(), a1(), a2(), a3(), a4(), a5(), a6(), a7(),
    fa0(), fa1(), fa2(), fa3(), fa4(), fa5(), fa6(), fa7(),
    t0(), t1(), t2(), t3(), t4(), t5(), t6(),
    ft0(), ft1(), ft2(), ft3(), ft4(), ft5(), ft6(), ft7(), ft8(), ft9(), ft10(), ft11(),
];

pub fn is_fixed_conflict(reg: PReg) -> bool { FIXED_CONFLICT_REGS.contains(&reg) }

pub fn is_allocatable(reg: PReg) -> bool { ALLOCATABLE_REGS.contains(&reg) }

/// The allocatable registers of one kind, in preference order.
pub fn allocatable_regs(kind: RegKind) -> Vec<PReg> {
    ALLOCATABLE_REGS
        .iter()
        .copied()
        .filter(|reg| reg.kind() == kind)
        .collect()
}

pub fn spill_regs(kind: RegKind) -> &'static [PReg] {
    match kind {
        RegKind::General => &SPILL_GENERAL_REGS,
        RegKind::Float => &SPILL_FLOAT_REGS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!(display_preg(a0()), "a0");
        assert_eq!(display_preg(ft11()), "ft11");
        assert_eq!(parse_preg("s11"), Some(s11()));
        assert_eq!(parse_preg("fp"), Some(s0()));
        assert_eq!(parse_preg("x10"), Some(a0()));
        assert_eq!(parse_preg("f10"), Some(fa0()));
        assert_eq!(parse_preg("x32"), None);
        assert_eq!(parse_preg("q1"), None);
        assert_eq!(parse_vreg("$r12"), Some(VReg::new(12, RegKind::General)));
        assert_eq!(parse_vreg("$f3"), Some(VReg::new(3, RegKind::Float)));
        assert_eq!(parse_vreg("$r"), None);
        assert_eq!(parse_vreg("$v1"), None);
        assert_eq!(display(parse_reg("$f3").unwrap()), "$f3");
    }

    #[test]
    fn test_register_classes() {
        let general = allocatable_regs(RegKind::General);
        let float = allocatable_regs(RegKind::Float);
        assert_eq!(general.len(), 23);
        assert_eq!(float.len(), 29);
        assert_eq!(general[0], a0());
        assert_eq!(general[8], t3());
        assert_eq!(general[12], s1());
        assert_eq!(float[8], ft3());

        for reg in [zero(), ra(), sp(), gp(), tp(), t2(), s0()] {
            assert!(!is_allocatable(reg));
        }
        for reg in SPILL_GENERAL_REGS.iter().chain(SPILL_FLOAT_REGS.iter()) {
            assert!(!is_allocatable(*reg));
            assert!(is_fixed_conflict(*reg));
        }
        assert!(is_fixed_conflict(a3()));
        assert!(!is_fixed_conflict(s3()));
        assert!(!is_fixed_conflict(fs0()));
    }
}
