use std::fmt;

use super::{imm::Imm12, regs};
use crate::{
    backend::{
        block::MBlock,
        context::MContext,
        func::MLabel,
        inst::{DisplayMInst, MInst},
        regs::{PReg, Reg, RegKind},
    },
    collections::storage::{ArenaAlloc, ArenaPtr, BaseArenaPtr},
};

pub struct RvInstData {
    kind: RvInstKind,
    next: Option<RvInst>,
    prev: Option<RvInst>,
    parent: Option<MBlock<RvInst>>,
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub struct RvInst(BaseArenaPtr<RvInstData>);

impl RvInst {
    fn new(mctx: &mut MContext<Self>, kind: RvInstKind) -> Self {
        mctx.alloc(RvInstData {
            kind,
            next: None,
            prev: None,
            parent: None,
        })
    }

    pub fn kind(self, mctx: &MContext<Self>) -> &RvInstKind { &self.deref(mctx).kind }

    pub fn build_li(mctx: &mut MContext<Self>, rd: Reg, imm: i64) -> Self {
        Self::new(mctx, RvInstKind::Li { rd, imm })
    }

    pub fn build_la(mctx: &mut MContext<Self>, rd: Reg, label: impl Into<MLabel>) -> Self {
        let label = label.into();
        Self::new(mctx, RvInstKind::La { rd, label })
    }

    pub fn build_alu_rr(mctx: &mut MContext<Self>, op: AluOpRR, rd: Reg, rs: Reg) -> Self {
        Self::new(mctx, RvInstKind::AluRR { op, rd, rs })
    }

    pub fn build_alu_rri(
        mctx: &mut MContext<Self>,
        op: AluOpRRI,
        rd: Reg,
        rs: Reg,
        imm: Imm12,
    ) -> Self {
        Self::new(mctx, RvInstKind::AluRRI { op, rd, rs, imm })
    }

    pub fn build_alu_rrr(
        mctx: &mut MContext<Self>,
        op: AluOpRRR,
        rd: Reg,
        rs1: Reg,
        rs2: Reg,
    ) -> Self {
        Self::new(mctx, RvInstKind::AluRRR { op, rd, rs1, rs2 })
    }

    pub fn build_fpu_rr(mctx: &mut MContext<Self>, op: FpuOpRR, rm: Frm, rd: Reg, rs: Reg) -> Self {
        Self::new(mctx, RvInstKind::FpuRR { op, rm, rd, rs })
    }

    pub fn build_fpu_rrr(
        mctx: &mut MContext<Self>,
        op: FpuOpRRR,
        rm: Frm,
        rd: Reg,
        rs1: Reg,
        rs2: Reg,
    ) -> Self {
        let kind = RvInstKind::FpuRRR {
            op,
            rm,
            rd,
            rs1,
            rs2,
        };
        Self::new(mctx, kind)
    }

    pub fn build_fpu_rrrr(
        mctx: &mut MContext<Self>,
        op: FpuOpRRRR,
        rm: Frm,
        rd: Reg,
        [rs1, rs2, rs3]: [Reg; 3],
    ) -> Self {
        let kind = RvInstKind::FpuRRRR {
            op,
            rm,
            rd,
            rs1,
            rs2,
            rs3,
        };
        Self::new(mctx, kind)
    }

    pub fn build_load(
        mctx: &mut MContext<Self>,
        op: LoadOp,
        rd: Reg,
        base: Reg,
        offset: Imm12,
    ) -> Self {
        Self::new(mctx, RvInstKind::Load {
            op,
            rd,
            base,
            offset,
        })
    }

    pub fn build_store(
        mctx: &mut MContext<Self>,
        op: StoreOp,
        src: Reg,
        base: Reg,
        offset: Imm12,
    ) -> Self {
        Self::new(mctx, RvInstKind::Store {
            op,
            src,
            base,
            offset,
        })
    }

    pub fn j(mctx: &mut MContext<Self>, block: MBlock<Self>) -> Self {
        Self::new(mctx, RvInstKind::J { block })
    }

    pub fn br(
        mctx: &mut MContext<Self>,
        op: BrOp,
        rs1: Reg,
        rs2: Reg,
        block: MBlock<Self>,
    ) -> Self {
        Self::new(mctx, RvInstKind::Br {
            op,
            rs1,
            rs2,
            block,
        })
    }

    pub fn call(mctx: &mut MContext<Self>, label: impl Into<MLabel>, arg_regs: Vec<PReg>) -> Self {
        let label = label.into();
        Self::new(mctx, RvInstKind::Call { label, arg_regs })
    }

    pub fn ret(mctx: &mut MContext<Self>, ret_regs: Vec<PReg>) -> Self {
        Self::new(mctx, RvInstKind::Ret { ret_regs })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RvInstKind {
    Li {
        rd: Reg,
        imm: i64,
    },
    La {
        rd: Reg,
        label: MLabel,
    },
    AluRR {
        op: AluOpRR,
        rd: Reg,
        rs: Reg,
    },
    AluRRI {
        op: AluOpRRI,
        rd: Reg,
        rs: Reg,
        imm: Imm12,
    },
    AluRRR {
        op: AluOpRRR,
        rd: Reg,
        rs1: Reg,
        rs2: Reg,
    },
    FpuRR {
        op: FpuOpRR,
        rm: Frm,
        rd: Reg,
        rs: Reg,
    },
    FpuRRR {
        op: FpuOpRRR,
        rm: Frm,
        rd: Reg,
        rs1: Reg,
        rs2: Reg,
    },
    FpuRRRR {
        op: FpuOpRRRR,
        rm: Frm,
        rd: Reg,
        rs1: Reg,
        rs2: Reg,
        rs3: Reg,
    },
    Load {
        op: LoadOp,
        rd: Reg,
        base: Reg,
        offset: Imm12,
    },
    Store {
        op: StoreOp,
        src: Reg,
        base: Reg,
        offset: Imm12,
    },
    J {
        block: MBlock<RvInst>,
    },
    Br {
        op: BrOp,
        rs1: Reg,
        rs2: Reg,
        block: MBlock<RvInst>,
    },
    /// A call reads its argument registers and clobbers every caller-saved
    /// register.
    Call {
        label: MLabel,
        arg_regs: Vec<PReg>,
    },
    /// A return reads the registers holding the return values.
    Ret {
        ret_regs: Vec<PReg>,
    },
}

pub struct DisplayRvInst<'a> {
    mctx: &'a MContext<RvInst>,
    inst: RvInst,
}

impl<'a> DisplayMInst<'a> for RvInst {
    type Display = DisplayRvInst<'a>;

    fn display(self, mctx: &'a MContext<Self>) -> Self::Display {
        DisplayRvInst { mctx, inst: self }
    }
}

impl<'a> fmt::Display for DisplayRvInst<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RvInstKind as Ik;

        match self.inst.kind(self.mctx) {
            Ik::Li { rd, imm } => write!(f, "li {}, {}", rd, imm),
            Ik::La { rd, label } => write!(f, "la {}, {}", rd, label),
            Ik::AluRR { op, rd, rs } => write!(f, "{} {}, {}", op, rd, rs),
            Ik::AluRRI { op, rd, rs, imm } => write!(f, "{} {}, {}, {}", op, rd, rs, imm),
            Ik::AluRRR { op, rd, rs1, rs2 } => write!(f, "{} {}, {}, {}", op, rd, rs1, rs2),
            Ik::FpuRR { op, rm, rd, rs } => write!(f, "{} {}, {}{}", op, rd, rs, rm),
            Ik::FpuRRR {
                op,
                rm,
                rd,
                rs1,
                rs2,
            } => write!(f, "{} {}, {}, {}{}", op, rd, rs1, rs2, rm),
            Ik::FpuRRRR {
                op,
                rm,
                rd,
                rs1,
                rs2,
                rs3,
            } => write!(f, "{} {}, {}, {}, {}{}", op, rd, rs1, rs2, rs3, rm),
            Ik::Load {
                op,
                rd,
                base,
                offset,
            } => write!(f, "{} {}, {}({})", op, rd, offset, base),
            Ik::Store {
                op,
                src,
                base,
                offset,
            } => write!(f, "{} {}, {}({})", op, src, offset, base),
            Ik::J { block } => write!(f, "j {}", block.label(self.mctx)),
            Ik::Br {
                op,
                rs1,
                rs2,
                block,
            } => write!(f, "{} {}, {}, {}", op, rs1, rs2, block.label(self.mctx)),
            Ik::Call { label, .. } => write!(f, "call {}", label),
            Ik::Ret { .. } => write!(f, "ret"),
        }
    }
}

/// Define an opcode enum together with its assembly mnemonics.
macro_rules! define_op {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $mnemonic:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $($name::$variant => $mnemonic,)*
                }
            }

            pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
                match mnemonic {
                    $($mnemonic => Some($name::$variant),)*
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.mnemonic()) }
        }
    };
}

define_op!(BrOp {
    Beq => "beq",
    Bne => "bne",
    Blt => "blt",
    Bge => "bge",
    Bltu => "bltu",
    Bgeu => "bgeu",
});

define_op!(AluOpRRR {
    Add => "add",
    Addw => "addw",
    Sub => "sub",
    Subw => "subw",
    Sll => "sll",
    Sllw => "sllw",
    Srl => "srl",
    Srlw => "srlw",
    Sra => "sra",
    Sraw => "sraw",
    Xor => "xor",
    Or => "or",
    And => "and",
    Slt => "slt",
    Sltu => "sltu",
    Mul => "mul",
    Mulw => "mulw",
    Mulh => "mulh",
    Mulhsu => "mulhsu",
    Mulhu => "mulhu",
    Div => "div",
    Divw => "divw",
    Divu => "divu",
    Divuw => "divuw",
    Rem => "rem",
    Remw => "remw",
    Remu => "remu",
    Remuw => "remuw",
    // zba
    Adduw => "add.uw",
    Sh1add => "sh1add",
    Sh2add => "sh2add",
    Sh3add => "sh3add",
    // zbb
    Andn => "andn",
    Orn => "orn",
    Xnor => "xnor",
    Max => "max",
    Maxu => "maxu",
    Min => "min",
    Minu => "minu",
});

define_op!(AluOpRRI {
    Addi => "addi",
    Addiw => "addiw",
    Slli => "slli",
    Slliw => "slliw",
    Srli => "srli",
    Srliw => "srliw",
    Srai => "srai",
    Sraiw => "sraiw",
    Xori => "xori",
    Ori => "ori",
    Andi => "andi",
    Slti => "slti",
    Sltiu => "sltiu",
});

define_op!(
    /// zbb unary operations
    AluOpRR {
        Clz => "clz",
        Clzw => "clzw",
        Ctz => "ctz",
        Ctzw => "ctzw",
        Cpop => "cpop",
        Cpopw => "cpopw",
        Sextb => "sext.b",
        Sexth => "sext.h",
        Zexth => "zext.h",
    }
);

define_op!(FpuOpRR {
    FsqrtS => "fsqrt.s",
    FsqrtD => "fsqrt.d",
    FclassS => "fclass.s",
    FclassD => "fclass.d",
    FcvtSW => "fcvt.s.w",
    FcvtSWu => "fcvt.s.wu",
    FcvtSL => "fcvt.s.l",
    FcvtSLu => "fcvt.s.lu",
    FcvtWS => "fcvt.w.s",
    FcvtWuS => "fcvt.wu.s",
    FcvtLS => "fcvt.l.s",
    FcvtLuS => "fcvt.lu.s",
    FcvtDW => "fcvt.d.w",
    FcvtDWu => "fcvt.d.wu",
    FcvtDL => "fcvt.d.l",
    FcvtDLu => "fcvt.d.lu",
    FcvtWD => "fcvt.w.d",
    FcvtWuD => "fcvt.wu.d",
    FcvtLD => "fcvt.l.d",
    FcvtLuD => "fcvt.lu.d",
    FcvtSD => "fcvt.s.d",
    FcvtDS => "fcvt.d.s",
    FmvWX => "fmv.w.x",
    FmvXW => "fmv.x.w",
    FmvDX => "fmv.d.x",
    FmvXD => "fmv.x.d",
});

impl FpuOpRR {
    /// The register kinds of `(rd, rs)`.
    pub fn reg_kinds(&self) -> (RegKind, RegKind) {
        use RegKind::{Float, General};

        match self {
            FpuOpRR::FsqrtS
            | FpuOpRR::FsqrtD
            | FpuOpRR::FcvtSD
            | FpuOpRR::FcvtDS => (Float, Float),
            FpuOpRR::FclassS
            | FpuOpRR::FclassD
            | FpuOpRR::FcvtWS
            | FpuOpRR::FcvtWuS
            | FpuOpRR::FcvtLS
            | FpuOpRR::FcvtLuS
            | FpuOpRR::FcvtWD
            | FpuOpRR::FcvtWuD
            | FpuOpRR::FcvtLD
            | FpuOpRR::FcvtLuD
            | FpuOpRR::FmvXW
            | FpuOpRR::FmvXD => (General, Float),
            FpuOpRR::FcvtSW
            | FpuOpRR::FcvtSWu
            | FpuOpRR::FcvtSL
            | FpuOpRR::FcvtSLu
            | FpuOpRR::FcvtDW
            | FpuOpRR::FcvtDWu
            | FpuOpRR::FcvtDL
            | FpuOpRR::FcvtDLu
            | FpuOpRR::FmvWX
            | FpuOpRR::FmvDX => (Float, General),
        }
    }
}

define_op!(FpuOpRRR {
    FaddS => "fadd.s",
    FaddD => "fadd.d",
    FsubS => "fsub.s",
    FsubD => "fsub.d",
    FmulS => "fmul.s",
    FmulD => "fmul.d",
    FdivS => "fdiv.s",
    FdivD => "fdiv.d",
    FminS => "fmin.s",
    FminD => "fmin.d",
    FmaxS => "fmax.s",
    FmaxD => "fmax.d",
    FsgnjS => "fsgnj.s",
    FsgnjD => "fsgnj.d",
    FsgnjnS => "fsgnjn.s",
    FsgnjnD => "fsgnjn.d",
    FsgnjxS => "fsgnjx.s",
    FsgnjxD => "fsgnjx.d",
    FeqS => "feq.s",
    FeqD => "feq.d",
    FltS => "flt.s",
    FltD => "flt.d",
    FleS => "fle.s",
    FleD => "fle.d",
});

impl FpuOpRRR {
    /// The register kind of `rd`, the sources are always float registers.
    pub fn rd_kind(&self) -> RegKind {
        match self {
            FpuOpRRR::FeqS
            | FpuOpRRR::FeqD
            | FpuOpRRR::FltS
            | FpuOpRRR::FltD
            | FpuOpRRR::FleS
            | FpuOpRRR::FleD => RegKind::General,
            FpuOpRRR::FaddS
            | FpuOpRRR::FaddD
            | FpuOpRRR::FsubS
            | FpuOpRRR::FsubD
            | FpuOpRRR::FmulS
            | FpuOpRRR::FmulD
            | FpuOpRRR::FdivS
            | FpuOpRRR::FdivD
            | FpuOpRRR::FminS
            | FpuOpRRR::FminD
            | FpuOpRRR::FmaxS
            | FpuOpRRR::FmaxD
            | FpuOpRRR::FsgnjS
            | FpuOpRRR::FsgnjD
            | FpuOpRRR::FsgnjnS
            | FpuOpRRR::FsgnjnD
            | FpuOpRRR::FsgnjxS
            | FpuOpRRR::FsgnjxD => RegKind::Float,
        }
    }
}

define_op!(FpuOpRRRR {
    FmaddS => "fmadd.s",
    FmaddD => "fmadd.d",
    FmsubS => "fmsub.s",
    FmsubD => "fmsub.d",
    FnmaddS => "fnmadd.s",
    FnmaddD => "fnmadd.d",
    FnmsubS => "fnmsub.s",
    FnmsubD => "fnmsub.d",
});

define_op!(LoadOp {
    Lb => "lb",
    Lh => "lh",
    Lw => "lw",
    Ld => "ld",
    Lbu => "lbu",
    Lhu => "lhu",
    Lwu => "lwu",
    Flw => "flw",
    Fld => "fld",
});

impl LoadOp {
    pub fn rd_kind(&self) -> RegKind {
        match self {
            LoadOp::Flw | LoadOp::Fld => RegKind::Float,
            LoadOp::Lb
            | LoadOp::Lh
            | LoadOp::Lw
            | LoadOp::Ld
            | LoadOp::Lbu
            | LoadOp::Lhu
            | LoadOp::Lwu => RegKind::General,
        }
    }
}

define_op!(StoreOp {
    Sb => "sb",
    Sh => "sh",
    Sw => "sw",
    Sd => "sd",
    Fsw => "fsw",
    Fsd => "fsd",
});

impl StoreOp {
    pub fn src_kind(&self) -> RegKind {
        match self {
            StoreOp::Fsw | StoreOp::Fsd => RegKind::Float,
            StoreOp::Sb | StoreOp::Sh | StoreOp::Sw | StoreOp::Sd => RegKind::General,
        }
    }
}

/// Rounding mode of floating point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frm {
    Rne,
    Rtz,
    Rdn,
    Rup,
    Rmm,
    /// Use the dynamic rounding mode, nothing is printed.
    #[default]
    Dyn,
}

impl Frm {
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        match mnemonic {
            "rne" => Some(Frm::Rne),
            "rtz" => Some(Frm::Rtz),
            "rdn" => Some(Frm::Rdn),
            "rup" => Some(Frm::Rup),
            "rmm" => Some(Frm::Rmm),
            "dyn" => Some(Frm::Dyn),
            _ => None,
        }
    }
}

impl fmt::Display for Frm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frm::Rne => write!(f, ", rne"),
            Frm::Rtz => write!(f, ", rtz"),
            Frm::Rdn => write!(f, ", rdn"),
            Frm::Rup => write!(f, ", rup"),
            Frm::Rmm => write!(f, ", rmm"),
            Frm::Dyn => Ok(()),
        }
    }
}

fn replace(reg: &mut Reg, from: Reg, to: Reg) {
    if *reg == from {
        *reg = to;
    }
}

impl MInst for RvInst {
    fn from_ptr(ptr: BaseArenaPtr<Self::T>) -> Self { Self(ptr) }

    fn ptr(self) -> BaseArenaPtr<Self::T> { self.0 }

    fn uses(self, mctx: &MContext<Self>) -> Vec<Reg> {
        use RvInstKind as Ik;

        match self.kind(mctx) {
            Ik::Li { .. } | Ik::La { .. } | Ik::J { .. } => vec![],
            Ik::AluRR { rs, .. } | Ik::AluRRI { rs, .. } | Ik::FpuRR { rs, .. } => vec![*rs],
            Ik::AluRRR { rs1, rs2, .. } | Ik::FpuRRR { rs1, rs2, .. } => vec![*rs1, *rs2],
            Ik::FpuRRRR { rs1, rs2, rs3, .. } => vec![*rs1, *rs2, *rs3],
            Ik::Load { base, .. } => vec![*base],
            Ik::Store { src, base, .. } => vec![*src, *base],
            Ik::Br { rs1, rs2, .. } => vec![*rs1, *rs2],
            Ik::Call { arg_regs, .. } => arg_regs.iter().map(|r| (*r).into()).collect(),
            Ik::Ret { ret_regs } => ret_regs.iter().map(|r| (*r).into()).collect(),
        }
    }

    fn defs(self, mctx: &MContext<Self>) -> Vec<Reg> {
        use RvInstKind as Ik;

        match self.kind(mctx) {
            Ik::Li { rd, .. }
            | Ik::La { rd, .. }
            | Ik::AluRR { rd, .. }
            | Ik::AluRRI { rd, .. }
            | Ik::AluRRR { rd, .. }
            | Ik::FpuRR { rd, .. }
            | Ik::FpuRRR { rd, .. }
            | Ik::FpuRRRR { rd, .. }
            | Ik::Load { rd, .. } => vec![*rd],
            Ik::Store { .. } | Ik::J { .. } | Ik::Br { .. } | Ik::Ret { .. } => vec![],
            Ik::Call { .. } => regs::CALLER_SAVED_REGS
                .iter()
                .map(|r| (*r).into())
                .collect(),
        }
    }

    fn succs(self, mctx: &MContext<Self>) -> Vec<MBlock<Self>> {
        use RvInstKind as Ik;

        match self.kind(mctx) {
            Ik::J { block } | Ik::Br { block, .. } => vec![*block],
            Ik::Li { .. }
            | Ik::La { .. }
            | Ik::AluRR { .. }
            | Ik::AluRRI { .. }
            | Ik::AluRRR { .. }
            | Ik::FpuRR { .. }
            | Ik::FpuRRR { .. }
            | Ik::FpuRRRR { .. }
            | Ik::Load { .. }
            | Ik::Store { .. }
            | Ik::Call { .. }
            | Ik::Ret { .. } => vec![],
        }
    }

    fn falls_through(self, mctx: &MContext<Self>) -> bool {
        use RvInstKind as Ik;

        !matches!(self.kind(mctx), Ik::J { .. } | Ik::Ret { .. })
    }

    fn match_move(self, mctx: &MContext<Self>) -> Option<(Reg, Reg)> {
        use RvInstKind as Ik;

        let zero: Reg = regs::zero().into();
        match self.kind(mctx) {
            Ik::AluRRR { op, rd, rs1, rs2 } if matches!(op, AluOpRRR::Add | AluOpRRR::Addw) => {
                if *rs2 == zero {
                    Some((*rd, *rs1))
                } else if *rs1 == zero {
                    Some((*rd, *rs2))
                } else {
                    None
                }
            }
            Ik::AluRRI { op, rd, rs, imm }
                if matches!(op, AluOpRRI::Addi | AluOpRRI::Addiw) && imm.is_zero() =>
            {
                Some((*rd, *rs))
            }
            Ik::FpuRRR {
                op, rd, rs1, rs2, ..
            } if matches!(op, FpuOpRRR::FsgnjS | FpuOpRRR::FsgnjD) && rs1 == rs2 => {
                Some((*rd, *rs1))
            }
            Ik::Li { .. }
            | Ik::La { .. }
            | Ik::AluRR { .. }
            | Ik::AluRRI { .. }
            | Ik::AluRRR { .. }
            | Ik::FpuRR { .. }
            | Ik::FpuRRR { .. }
            | Ik::FpuRRRR { .. }
            | Ik::Load { .. }
            | Ik::Store { .. }
            | Ik::J { .. }
            | Ik::Br { .. }
            | Ik::Call { .. }
            | Ik::Ret { .. } => None,
        }
    }

    fn replace_use(self, mctx: &mut MContext<Self>, from: Reg, to: Reg) {
        use RvInstKind as Ik;

        match &mut self.deref_mut(mctx).kind {
            Ik::Li { .. } | Ik::La { .. } | Ik::J { .. } | Ik::Call { .. } | Ik::Ret { .. } => {}
            Ik::AluRR { rs, .. } | Ik::AluRRI { rs, .. } | Ik::FpuRR { rs, .. } => {
                replace(rs, from, to);
            }
            Ik::AluRRR { rs1, rs2, .. } | Ik::FpuRRR { rs1, rs2, .. } | Ik::Br { rs1, rs2, .. } => {
                replace(rs1, from, to);
                replace(rs2, from, to);
            }
            Ik::FpuRRRR { rs1, rs2, rs3, .. } => {
                replace(rs1, from, to);
                replace(rs2, from, to);
                replace(rs3, from, to);
            }
            Ik::Load { base, .. } => replace(base, from, to),
            Ik::Store { src, base, .. } => {
                replace(src, from, to);
                replace(base, from, to);
            }
        }
    }

    fn replace_def(self, mctx: &mut MContext<Self>, from: Reg, to: Reg) {
        use RvInstKind as Ik;

        match &mut self.deref_mut(mctx).kind {
            Ik::Li { rd, .. }
            | Ik::La { rd, .. }
            | Ik::AluRR { rd, .. }
            | Ik::AluRRI { rd, .. }
            | Ik::AluRRR { rd, .. }
            | Ik::FpuRR { rd, .. }
            | Ik::FpuRRR { rd, .. }
            | Ik::FpuRRRR { rd, .. }
            | Ik::Load { rd, .. } => replace(rd, from, to),
            Ik::Store { .. } | Ik::J { .. } | Ik::Br { .. } | Ik::Call { .. } | Ik::Ret { .. } => {}
        }
    }
}

impl ArenaPtr for RvInst {
    type A = MContext<Self>;
    type T = RvInstData;

    fn try_deref(self, arena: &Self::A) -> Option<&Self::T> {
        crate::collections::storage::ArenaDeref::try_deref(arena, self)
    }

    fn try_deref_mut(self, arena: &mut Self::A) -> Option<&mut Self::T> {
        crate::collections::storage::ArenaDeref::try_deref_mut(arena, self)
    }
}

impl crate::collections::linked_list::LinkedListNodePtr for RvInst {
    type ContainerPtr = MBlock<RvInst>;

    fn next(self, arena: &Self::A) -> Option<Self> { self.deref(arena).next }

    fn prev(self, arena: &Self::A) -> Option<Self> { self.deref(arena).prev }

    fn set_next(self, arena: &mut Self::A, next: Option<Self>) {
        self.deref_mut(arena).next = next;
    }

    fn set_prev(self, arena: &mut Self::A, prev: Option<Self>) {
        self.deref_mut(arena).prev = prev;
    }

    fn container(self, arena: &Self::A) -> Option<Self::ContainerPtr> { self.deref(arena).parent }

    fn set_container(self, arena: &mut Self::A, container: Option<Self::ContainerPtr>) {
        self.deref_mut(arena).parent = container;
    }
}
