use core::fmt;

/// The kind of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegKind {
    /// The general purpose register.
    General,
    /// The floating point register.
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    P(PReg),
    V(VReg),
}

impl Reg {
    pub fn kind(&self) -> RegKind {
        match self {
            Reg::P(preg) => preg.kind(),
            Reg::V(vreg) => vreg.kind(),
        }
    }

    pub fn is_preg(&self) -> bool { matches!(self, Reg::P(_)) }

    pub fn is_vreg(&self) -> bool { matches!(self, Reg::V(_)) }

    pub fn as_preg(&self) -> Option<PReg> {
        match self {
            Reg::P(preg) => Some(*preg),
            Reg::V(_) => None,
        }
    }

    pub fn as_vreg(&self) -> Option<VReg> {
        match self {
            Reg::P(_) => None,
            Reg::V(vreg) => Some(*vreg),
        }
    }
}

/// The physical register, a register number within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PReg(u8, RegKind);

impl PReg {
    pub const fn new(num: u8, kind: RegKind) -> Self { Self(num, kind) }

    pub const fn num(&self) -> u8 { self.0 }

    pub const fn kind(&self) -> RegKind { self.1 }
}

/// The virtual register.
///
/// Numbers are unique within a [MContext](super::MContext) regardless of the
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(u32, RegKind);

impl VReg {
    pub fn new(num: u32, kind: RegKind) -> Self { Self(num, kind) }

    pub fn num(&self) -> u32 { self.0 }

    pub fn kind(&self) -> RegKind { self.1 }
}

impl From<VReg> for Reg {
    fn from(vreg: VReg) -> Self { Self::V(vreg) }
}

impl From<PReg> for Reg {
    fn from(preg: PReg) -> Self { Self::P(preg) }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.1 {
            RegKind::General => "$r",
            RegKind::Float => "$f",
        };
        write!(f, "{}{}", prefix, self.0)
    }
}
