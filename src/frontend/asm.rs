use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    backend::{
        inst::MInst,
        riscv64::{
            imm::Imm12,
            inst::{
                AluOpRR,
                AluOpRRI,
                AluOpRRR,
                BrOp,
                FpuOpRR,
                FpuOpRRR,
                FpuOpRRRR,
                Frm,
                LoadOp,
                StoreOp,
            },
            regs,
            RvInst,
        },
        MBlock,
        MContext,
        MFunc,
        PReg,
        Reg,
        RegKind,
    },
    collections::linked_list::LinkedListContainerPtr,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error("bad register `{0}`")]
    BadRegister(String),
    #[error("bad immediate `{0}`")]
    BadImmediate(String),
    #[error("bad memory operand `{0}`")]
    BadMemoryOperand(String),
    #[error("bad rounding mode `{0}`")]
    BadRoundingMode(String),
    #[error("bad directive `{0}`")]
    BadDirective(String),
    #[error("unknown label `{0}`")]
    UnknownLabel(String),
    #[error("`{0}` outside a function")]
    OutsideFunction(String),
    #[error("duplicated label `{0}`")]
    DuplicatedLabel(String),
    #[error("`{reg}` is not a {expected:?} register")]
    RegKindMismatch { reg: String, expected: RegKind },
    #[error("`{mnemonic}` expects {expected} operands, found {found}")]
    OperandCount {
        mnemonic: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(line: usize, kind: ParseErrorKind) -> Self { Self { line, kind } }
}

/// An instruction with its operands still in text.
#[derive(Debug)]
struct ParsingInst {
    mnemonic: String,
    operands: Vec<String>,
    line: usize,
}

#[derive(Debug)]
struct ParsingBlock {
    label: String,
    insts: Vec<ParsingInst>,
}

#[derive(Debug)]
struct ParsingFunc {
    name: String,
    frame: u64,
    /// If the entry block was explicitly labelled.
    entry_labelled: bool,
    blocks: Vec<ParsingBlock>,
}

impl ParsingFunc {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            frame: 0,
            entry_labelled: false,
            blocks: vec![ParsingBlock {
                label: name.to_string(),
                insts: Vec::new(),
            }],
        }
    }

    fn add_label(&mut self, label: &str, line: usize) -> Result<(), ParseError> {
        // `f:` right after `.func f` names the entry block
        if label == self.name
            && !self.entry_labelled
            && self.blocks.len() == 1
            && self.blocks[0].insts.is_empty()
        {
            self.entry_labelled = true;
            return Ok(());
        }

        if self.blocks.iter().any(|block| block.label == label) {
            return Err(ParseError::new(
                line,
                ParseErrorKind::DuplicatedLabel(label.to_string()),
            ));
        }

        self.blocks.push(ParsingBlock {
            label: label.to_string(),
            insts: Vec::new(),
        });
        Ok(())
    }

    fn push_inst(&mut self, inst: ParsingInst) {
        // there is always the entry block
        if let Some(block) = self.blocks.last_mut() {
            block.insts.push(inst);
        }
    }
}

#[derive(Debug)]
enum ParsingItem {
    Extern(String),
    Func(ParsingFunc),
}

fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim()),
        None => (text, ""),
    }
}

fn is_label(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Split `label: rest` into the label and the rest.
fn split_label(text: &str) -> Option<(&str, &str)> {
    let (label, rest) = text.split_once(':')?;
    is_label(label.trim()).then(|| (label.trim(), rest.trim()))
}

/// Parse a decimal or `0x` hexadecimal integer, optionally negative.
fn parse_imm(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };

    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        i128::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<i128>().ok()?
    };

    i64::try_from(if negative { -value } else { value }).ok()
}

fn parse_lines(src: &str) -> Result<Vec<ParsingItem>, ParseError> {
    let mut items = Vec::new();
    let mut curr: Option<ParsingFunc> = None;

    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let mut text = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();

        if let Some((label, rest)) = split_label(text) {
            let func = curr.as_mut().ok_or_else(|| {
                ParseError::new(line, ParseErrorKind::OutsideFunction(label.to_string()))
            })?;
            func.add_label(label, line)?;
            text = rest;
        }

        if text.is_empty() {
            continue;
        }

        if let Some(directive) = text.strip_prefix('.') {
            let (name, arg) = split_first_word(directive);
            match name {
                "func" => {
                    if arg.is_empty() {
                        return Err(ParseError::new(
                            line,
                            ParseErrorKind::BadDirective(text.to_string()),
                        ));
                    }
                    if let Some(func) = curr.take() {
                        items.push(ParsingItem::Func(func));
                    }
                    curr = Some(ParsingFunc::new(arg));
                }
                "endfunc" => match curr.take() {
                    Some(func) => items.push(ParsingItem::Func(func)),
                    None => {
                        return Err(ParseError::new(
                            line,
                            ParseErrorKind::OutsideFunction(text.to_string()),
                        ))
                    }
                },
                "frame" => {
                    let func = curr.as_mut().ok_or_else(|| {
                        ParseError::new(line, ParseErrorKind::OutsideFunction(text.to_string()))
                    })?;
                    func.frame = parse_imm(arg)
                        .and_then(|size| u64::try_from(size).ok())
                        .ok_or_else(|| {
                            ParseError::new(line, ParseErrorKind::BadImmediate(arg.to_string()))
                        })?;
                }
                "extern" => {
                    if arg.is_empty() {
                        return Err(ParseError::new(
                            line,
                            ParseErrorKind::BadDirective(text.to_string()),
                        ));
                    }
                    items.push(ParsingItem::Extern(arg.to_string()));
                }
                // .text, .globl and the like carry nothing for allocation
                _ => {}
            }
            continue;
        }

        let (mnemonic, args) = split_first_word(text);
        let func = curr.as_mut().ok_or_else(|| {
            ParseError::new(line, ParseErrorKind::OutsideFunction(mnemonic.to_string()))
        })?;

        let operands = if args.is_empty() {
            Vec::new()
        } else {
            args.split(',').map(|arg| arg.trim().to_string()).collect()
        };
        func.push_inst(ParsingInst {
            mnemonic: mnemonic.to_string(),
            operands,
            line,
        });
    }

    if let Some(func) = curr {
        items.push(ParsingItem::Func(func));
    }

    Ok(items)
}

/// Operand accessors of one instruction, reporting errors at its line.
struct Operands<'a> {
    inst: &'a ParsingInst,
    labels: &'a FxHashMap<String, MBlock<RvInst>>,
}

impl<'a> Operands<'a> {
    fn err(&self, kind: ParseErrorKind) -> ParseError { ParseError::new(self.inst.line, kind) }

    fn len(&self) -> usize { self.inst.operands.len() }

    fn expect(&self, count: usize) -> Result<(), ParseError> { self.expect_between(count, count) }

    fn expect_between(&self, min: usize, max: usize) -> Result<(), ParseError> {
        let found = self.len();
        if found < min || found > max {
            let expected = if found < min { min } else { max };
            return Err(self.err(ParseErrorKind::OperandCount {
                mnemonic: self.inst.mnemonic.clone(),
                expected,
                found,
            }));
        }
        Ok(())
    }

    fn text(&self, idx: usize) -> &'a str { &self.inst.operands[idx] }

    fn reg(&self, idx: usize, kind: RegKind) -> Result<Reg, ParseError> {
        let text = self.text(idx);
        let reg = regs::parse_reg(text)
            .ok_or_else(|| self.err(ParseErrorKind::BadRegister(text.to_string())))?;
        if reg.kind() != kind {
            return Err(self.err(ParseErrorKind::RegKindMismatch {
                reg: text.to_string(),
                expected: kind,
            }));
        }
        Ok(reg)
    }

    fn gp(&self, idx: usize) -> Result<Reg, ParseError> { self.reg(idx, RegKind::General) }

    fn fp(&self, idx: usize) -> Result<Reg, ParseError> { self.reg(idx, RegKind::Float) }

    /// Physical registers from `idx` on.
    fn pregs_from(&self, idx: usize) -> Result<Vec<PReg>, ParseError> {
        self.inst.operands[idx..]
            .iter()
            .map(|text| {
                regs::parse_preg(text)
                    .ok_or_else(|| self.err(ParseErrorKind::BadRegister(text.to_string())))
            })
            .collect()
    }

    fn imm(&self, idx: usize) -> Result<i64, ParseError> {
        let text = self.text(idx);
        parse_imm(text).ok_or_else(|| self.err(ParseErrorKind::BadImmediate(text.to_string())))
    }

    fn imm12(&self, idx: usize) -> Result<Imm12, ParseError> {
        let text = self.text(idx);
        self.imm(idx)
            .ok()
            .and_then(Imm12::try_from_i64)
            .ok_or_else(|| self.err(ParseErrorKind::BadImmediate(text.to_string())))
    }

    /// `offset(base)`, the offset may be omitted.
    fn mem(&self, idx: usize) -> Result<(Imm12, Reg), ParseError> {
        let text = self.text(idx);
        let bad = || self.err(ParseErrorKind::BadMemoryOperand(text.to_string()));

        let (offset, base) = text
            .strip_suffix(')')
            .and_then(|text| text.split_once('('))
            .ok_or_else(bad)?;

        let offset = match offset.trim() {
            "" => Imm12::zero(),
            offset => parse_imm(offset)
                .and_then(Imm12::try_from_i64)
                .ok_or_else(|| self.err(ParseErrorKind::BadImmediate(offset.to_string())))?,
        };

        let base = base.trim();
        let reg = regs::parse_reg(base)
            .ok_or_else(|| self.err(ParseErrorKind::BadRegister(base.to_string())))?;
        if reg.kind() != RegKind::General {
            return Err(self.err(ParseErrorKind::RegKindMismatch {
                reg: base.to_string(),
                expected: RegKind::General,
            }));
        }

        Ok((offset, reg))
    }

    /// The optional rounding mode at `idx`.
    fn rm(&self, idx: usize) -> Result<Frm, ParseError> {
        if idx >= self.len() {
            return Ok(Frm::default());
        }
        let text = self.text(idx);
        Frm::from_mnemonic(text)
            .ok_or_else(|| self.err(ParseErrorKind::BadRoundingMode(text.to_string())))
    }

    fn block(&self, idx: usize) -> Result<MBlock<RvInst>, ParseError> {
        let text = self.text(idx);
        self.labels
            .get(text)
            .copied()
            .ok_or_else(|| self.err(ParseErrorKind::UnknownLabel(text.to_string())))
    }
}

fn build_inst(mctx: &mut MContext<RvInst>, ops: &Operands) -> Result<RvInst, ParseError> {
    let zero: Reg = regs::zero().into();
    let mnemonic = ops.inst.mnemonic.as_str();

    let inst = match mnemonic {
        "li" => {
            ops.expect(2)?;
            RvInst::build_li(mctx, ops.gp(0)?, ops.imm(1)?)
        }
        "la" => {
            ops.expect(2)?;
            RvInst::build_la(mctx, ops.gp(0)?, ops.text(1))
        }
        "mv" => {
            ops.expect(2)?;
            RvInst::build_alu_rri(mctx, AluOpRRI::Addi, ops.gp(0)?, ops.gp(1)?, Imm12::zero())
        }
        "not" => {
            ops.expect(2)?;
            let minus_one = Imm12::try_from_i64(-1).expect("-1 fits in 12 bits");
            RvInst::build_alu_rri(mctx, AluOpRRI::Xori, ops.gp(0)?, ops.gp(1)?, minus_one)
        }
        "neg" | "negw" => {
            ops.expect(2)?;
            let op = if mnemonic == "neg" {
                AluOpRRR::Sub
            } else {
                AluOpRRR::Subw
            };
            RvInst::build_alu_rrr(mctx, op, ops.gp(0)?, zero, ops.gp(1)?)
        }
        "seqz" => {
            ops.expect(2)?;
            let one = Imm12::try_from_i64(1).expect("1 fits in 12 bits");
            RvInst::build_alu_rri(mctx, AluOpRRI::Sltiu, ops.gp(0)?, ops.gp(1)?, one)
        }
        "snez" => {
            ops.expect(2)?;
            RvInst::build_alu_rrr(mctx, AluOpRRR::Sltu, ops.gp(0)?, zero, ops.gp(1)?)
        }
        "nop" => {
            ops.expect(0)?;
            RvInst::build_alu_rri(mctx, AluOpRRI::Addi, zero, zero, Imm12::zero())
        }
        "fmv.s" | "fmv.d" | "fneg.s" | "fneg.d" | "fabs.s" | "fabs.d" => {
            ops.expect(2)?;
            let op = match mnemonic {
                "fmv.s" => FpuOpRRR::FsgnjS,
                "fmv.d" => FpuOpRRR::FsgnjD,
                "fneg.s" => FpuOpRRR::FsgnjnS,
                "fneg.d" => FpuOpRRR::FsgnjnD,
                "fabs.s" => FpuOpRRR::FsgnjxS,
                _ => FpuOpRRR::FsgnjxD,
            };
            let rs = ops.fp(1)?;
            RvInst::build_fpu_rrr(mctx, op, Frm::default(), ops.fp(0)?, rs, rs)
        }
        "j" => {
            ops.expect(1)?;
            RvInst::j(mctx, ops.block(0)?)
        }
        "beqz" | "bnez" => {
            ops.expect(2)?;
            let op = if mnemonic == "beqz" {
                BrOp::Beq
            } else {
                BrOp::Bne
            };
            RvInst::br(mctx, op, ops.gp(0)?, zero, ops.block(1)?)
        }
        // operands swapped
        "bgt" | "ble" | "bgtu" | "bleu" => {
            ops.expect(3)?;
            let op = match mnemonic {
                "bgt" => BrOp::Blt,
                "ble" => BrOp::Bge,
                "bgtu" => BrOp::Bltu,
                _ => BrOp::Bgeu,
            };
            RvInst::br(mctx, op, ops.gp(1)?, ops.gp(0)?, ops.block(2)?)
        }
        "call" => {
            ops.expect_between(1, usize::MAX)?;
            let arg_regs = ops.pregs_from(1)?;
            RvInst::call(mctx, ops.text(0), arg_regs)
        }
        "ret" => {
            let ret_regs = ops.pregs_from(0)?;
            RvInst::ret(mctx, ret_regs)
        }
        _ => return build_op_inst(mctx, ops),
    };

    Ok(inst)
}

/// Instructions named after their opcode.
fn build_op_inst(mctx: &mut MContext<RvInst>, ops: &Operands) -> Result<RvInst, ParseError> {
    let mnemonic = ops.inst.mnemonic.as_str();

    if let Some(op) = AluOpRRR::from_mnemonic(mnemonic) {
        ops.expect(3)?;
        return Ok(RvInst::build_alu_rrr(mctx, op, ops.gp(0)?, ops.gp(1)?, ops.gp(2)?));
    }
    if let Some(op) = AluOpRRI::from_mnemonic(mnemonic) {
        ops.expect(3)?;
        return Ok(RvInst::build_alu_rri(mctx, op, ops.gp(0)?, ops.gp(1)?, ops.imm12(2)?));
    }
    if let Some(op) = AluOpRR::from_mnemonic(mnemonic) {
        ops.expect(2)?;
        return Ok(RvInst::build_alu_rr(mctx, op, ops.gp(0)?, ops.gp(1)?));
    }
    if let Some(op) = FpuOpRR::from_mnemonic(mnemonic) {
        ops.expect_between(2, 3)?;
        let (rd_kind, rs_kind) = op.reg_kinds();
        let (rd, rs) = (ops.reg(0, rd_kind)?, ops.reg(1, rs_kind)?);
        return Ok(RvInst::build_fpu_rr(mctx, op, ops.rm(2)?, rd, rs));
    }
    if let Some(op) = FpuOpRRR::from_mnemonic(mnemonic) {
        ops.expect_between(3, 4)?;
        let rd = ops.reg(0, op.rd_kind())?;
        let (rs1, rs2) = (ops.fp(1)?, ops.fp(2)?);
        return Ok(RvInst::build_fpu_rrr(mctx, op, ops.rm(3)?, rd, rs1, rs2));
    }
    if let Some(op) = FpuOpRRRR::from_mnemonic(mnemonic) {
        ops.expect_between(4, 5)?;
        let rd = ops.fp(0)?;
        let rs = [ops.fp(1)?, ops.fp(2)?, ops.fp(3)?];
        return Ok(RvInst::build_fpu_rrrr(mctx, op, ops.rm(4)?, rd, rs));
    }
    if let Some(op) = LoadOp::from_mnemonic(mnemonic) {
        ops.expect(2)?;
        let rd = ops.reg(0, op.rd_kind())?;
        let (offset, base) = ops.mem(1)?;
        return Ok(RvInst::build_load(mctx, op, rd, base, offset));
    }
    if let Some(op) = StoreOp::from_mnemonic(mnemonic) {
        ops.expect(2)?;
        let src = ops.reg(0, op.src_kind())?;
        let (offset, base) = ops.mem(1)?;
        return Ok(RvInst::build_store(mctx, op, src, base, offset));
    }
    if let Some(op) = BrOp::from_mnemonic(mnemonic) {
        ops.expect(3)?;
        return Ok(RvInst::br(mctx, op, ops.gp(0)?, ops.gp(1)?, ops.block(2)?));
    }

    Err(ops.err(ParseErrorKind::UnknownMnemonic(mnemonic.to_string())))
}

fn into_mcontext(items: Vec<ParsingItem>) -> Result<MContext<RvInst>, ParseError> {
    let mut mctx = MContext::new();

    for item in items {
        let pfunc = match item {
            ParsingItem::Extern(name) => {
                MFunc::new_external(&mut mctx, name);
                continue;
            }
            ParsingItem::Func(pfunc) => pfunc,
        };

        let func = MFunc::new(&mut mctx, &pfunc.name);
        func.set_stack_frame_size(&mut mctx, pfunc.frame);

        // create all blocks first, branches may refer to later ones
        let mut labels = FxHashMap::default();
        let mut blocks = Vec::with_capacity(pfunc.blocks.len());
        for pblock in pfunc.blocks.iter() {
            let block = MBlock::new(&mut mctx, &pblock.label);
            func.push_back(&mut mctx, block);
            labels.insert(pblock.label.clone(), block);
            blocks.push(block);
        }

        for (pblock, block) in pfunc.blocks.iter().zip(blocks) {
            for pinst in pblock.insts.iter() {
                let ops = Operands {
                    inst: pinst,
                    labels: &labels,
                };
                let inst = build_inst(&mut mctx, &ops)?;

                // fresh virtual registers must not clash with the written ones
                for reg in inst.uses(&mctx).into_iter().chain(inst.defs(&mctx)) {
                    if let Reg::V(vreg) = reg {
                        mctx.reserve_vreg(vreg);
                    }
                }

                block.push_back(&mut mctx, inst);
            }
        }
    }

    Ok(mctx)
}

/// Parse the assembly source into a new machine code context.
pub fn parse(src: &str) -> Result<MContext<RvInst>, ParseError> {
    let items = parse_lines(src)?;
    into_mcontext(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::inst::DisplayMInst;

    #[test]
    fn test_parse_imm() {
        assert_eq!(parse_imm("42"), Some(42));
        assert_eq!(parse_imm("-2048"), Some(-2048));
        assert_eq!(parse_imm("0x10"), Some(16));
        assert_eq!(parse_imm("-0x10"), Some(-16));
        assert_eq!(parse_imm("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_imm("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_imm("9223372036854775808"), None);
        assert_eq!(parse_imm("--1"), None);
        assert_eq!(parse_imm("0x"), None);
        assert_eq!(parse_imm("a0"), None);
        assert_eq!(parse_imm(""), None);
    }

    #[test]
    fn test_split_label() {
        assert_eq!(split_label("loop:"), Some(("loop", "")));
        assert_eq!(split_label(".L1: li a0, 1"), Some((".L1", "li a0, 1")));
        assert_eq!(split_label("li a0, 1"), None);
        assert_eq!(split_label("bad label:"), None);
    }

    #[test]
    fn test_forward_branch_and_pseudos() {
        let src = "
            .func f
        f:
            li $r3, 1          # comment
            beqz $r3, done
            not $r4, $r3
            fmv.d $f0, fa0
        done:
            ret a0
            .endfunc
        ";
        let mut mctx = parse(src).unwrap();
        let func = mctx.find_func("f").unwrap();

        let blocks: Vec<_> = func.iter(&mctx).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].label(&mctx).as_str(), "f");
        assert_eq!(blocks[1].label(&mctx).as_str(), "done");

        let listing: Vec<String> = blocks[0]
            .iter(&mctx)
            .map(|inst| inst.display(&mctx).to_string())
            .collect();
        assert_eq!(
            listing,
            vec![
                "li $r3, 1",
                "beq $r3, zero, done",
                "xori $r4, $r3, -1",
                "fsgnj.d $f0, fa0, fa0",
            ]
        );

        // numbering continues after the largest register read
        assert_eq!(mctx.new_vreg(RegKind::General).num(), 5);
    }

    fn parse_err(src: &str) -> ParseError {
        match parse(src) {
            Ok(_) => panic!("parsing should fail"),
            Err(err) => err,
        }
    }

    #[test]
    fn test_errors_carry_line() {
        let err = parse_err(".func f\n  li $r0, 1\n  frob $r0\n");
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ParseErrorKind::UnknownMnemonic("frob".to_string()));

        let err = parse_err("  li a0, 1\n");
        assert_eq!(err.line, 1);
        assert!(matches!(err.kind, ParseErrorKind::OutsideFunction(_)));

        let err = parse_err(".func f\n  j nowhere\n");
        assert_eq!(err.kind, ParseErrorKind::UnknownLabel("nowhere".to_string()));

        let err = parse_err(".func f\n  addi a0, a0, 4096\n");
        assert_eq!(err.kind, ParseErrorKind::BadImmediate("4096".to_string()));

        let err = parse_err(".func f\n  beq a0, a1\n");
        assert!(matches!(err.kind, ParseErrorKind::OperandCount { .. }));
    }

    #[test]
    fn test_conditional_branches() {
        for op in ["beq", "bne", "blt", "bge", "bltu", "bgeu"] {
            let src = format!(".func f\nf:\n  {} a0, $r1, out\n  li a0, 1\nout:\n  ret a0\n", op);
            let mctx = match parse(&src) {
                Ok(mctx) => mctx,
                Err(err) => panic!("`{}` is rejected: {}", op, err),
            };
            let func = mctx.find_func("f").unwrap();
            let entry = func.head(&mctx).unwrap();
            let out = func.tail(&mctx).unwrap();

            let br = entry.head(&mctx).unwrap();
            assert_eq!(br.display(&mctx).to_string(), format!("{} a0, $r1, out", op));
            assert_eq!(br.succs(&mctx), vec![out]);
        }
    }
}
