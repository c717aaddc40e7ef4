use common::{func, listing, parse};
use rvalloc::{
    backend::RegKind,
    collections::linked_list::LinkedListContainerPtr,
    frontend::{self, ParseError, ParseErrorKind},
};

mod common;

fn parse_fail(src: &str) -> ParseError {
    match frontend::parse(src) {
        Ok(_) => panic!("parsing should fail"),
        Err(err) => err,
    }
}

fn parse_err(src: &str) -> (usize, ParseErrorKind) {
    let err = parse_fail(src);
    (err.line, err.kind)
}

#[test]
fn test_frontend_asm_directives() {
    let mctx = parse(
        "
    .text
    .extern memcpy
    .globl main
    .func main
main:
    .frame 16
    li $r0, 0x10
    sd $r0, 8(sp)
    ld a0, (sp)
    call memcpy, a0, a1, a2
    ret a0
    .endfunc

    .func empty
    .endfunc
",
    );

    let memcpy = func(&mctx, "memcpy");
    assert!(memcpy.is_external(&mctx));
    assert!(memcpy.head(&mctx).is_none());

    let main = func(&mctx, "main");
    assert!(!main.is_external(&mctx));
    assert_eq!(main.stack_frame_size(&mctx), 16);
    // the label after `.func` is the entry block
    assert_eq!(main.iter(&mctx).count(), 1);
    assert_eq!(
        listing(&mctx, main),
        vec![
            "li $r0, 16",
            "sd $r0, 8(sp)",
            "ld a0, 0(sp)",
            "call memcpy",
            "ret",
        ]
    );

    let empty = func(&mctx, "empty");
    assert_eq!(empty.stack_frame_size(&mctx), 0);
    assert_eq!(empty.num_insts(&mctx), 0);
}

#[test]
fn test_frontend_asm_blocks_and_pseudos() {
    let mctx = parse(
        "
    .func f
    seqz $r1, a0
    snez $r2, a0
    neg $r3, $r1
    negw $r4, $r2
    bgt $r3, $r4, big
small:
    fneg.s $f5, fa0
    fabs.d $f6, fa1
    fcvt.w.d a0, $f6, rtz
    j f.end
big: nop
f.end:
    ret
    .endfunc
",
    );
    let f = func(&mctx, "f");

    // without an explicit label the entry block is named after the function
    let labels: Vec<String> = f
        .iter(&mctx)
        .map(|block| block.label(&mctx).to_string())
        .collect();
    assert_eq!(labels, vec!["f", "small", "big", "f.end"]);

    assert_eq!(
        listing(&mctx, f),
        vec![
            "sltiu $r1, a0, 1",
            "sltu $r2, zero, a0",
            "sub $r3, zero, $r1",
            "subw $r4, zero, $r2",
            "blt $r4, $r3, big",
            "fsgnjn.s $f5, fa0, fa0",
            "fsgnjx.d $f6, fa1, fa1",
            "fcvt.w.d a0, $f6, rtz",
            "j f.end",
            "addi zero, zero, 0",
            "ret",
        ]
    );
}

#[test]
fn test_frontend_asm_printer() {
    let mut mctx = parse(
        "
    .extern g
    .func f
f:
    .frame 8
    li $r0, 1
    beqz $r0, out
    call g
out:
    ret
    .endfunc
",
    );
    let output = mctx.display().to_string();

    assert!(output.starts_with("\t.text\n\t.extern g\n"));
    assert!(output.contains("\t.global f\n\t.type f, @function\n\t# frame size: 8\nf:\n"));
    assert!(output.contains("\tbeq $r0, zero, out\n"));
    assert!(output.contains("out:\n\tret\n"));

    // fresh registers continue the numbering of the source
    let vreg = mctx.new_vreg(RegKind::Float);
    assert_eq!(vreg.num(), 1);
    let next = mctx.new_vreg(RegKind::General);
    assert_eq!(next.num(), 2);
}

#[test]
fn test_frontend_asm_errors() {
    let (line, kind) = parse_err(".func f\nf:\nloop:\n  li a0, 1\nloop:\n");
    assert_eq!(line, 5);
    assert_eq!(kind, ParseErrorKind::DuplicatedLabel("loop".to_string()));

    let (line, kind) = parse_err(".func f\n  fadd.d $f0, $r1, fa0\n");
    assert_eq!(line, 2);
    assert_eq!(
        kind,
        ParseErrorKind::RegKindMismatch {
            reg: "$r1".to_string(),
            expected: RegKind::Float,
        }
    );

    let (_, kind) = parse_err(".func f\n  add a0, a1\n");
    assert_eq!(
        kind,
        ParseErrorKind::OperandCount {
            mnemonic: "add".to_string(),
            expected: 3,
            found: 2,
        }
    );

    let (line, kind) = parse_err("\n\nloop:\n");
    assert_eq!(line, 3);
    assert_eq!(kind, ParseErrorKind::OutsideFunction("loop".to_string()));

    let (_, kind) = parse_err(".endfunc\n");
    assert!(matches!(kind, ParseErrorKind::OutsideFunction(_)));

    let (_, kind) = parse_err(".func f\n  ld a0, 8[sp]\n");
    assert_eq!(kind, ParseErrorKind::BadMemoryOperand("8[sp]".to_string()));

    let (_, kind) = parse_err(".func f\n  mv x32, a0\n");
    assert_eq!(kind, ParseErrorKind::BadRegister("x32".to_string()));

    let (_, kind) = parse_err(".func f\n  fsqrt.d $f0, $f1, up\n");
    assert_eq!(kind, ParseErrorKind::BadRoundingMode("up".to_string()));

    let (_, kind) = parse_err(".func f\n  .frame -8\n");
    assert_eq!(kind, ParseErrorKind::BadImmediate("-8".to_string()));

    let (_, kind) = parse_err(".func\n");
    assert!(matches!(kind, ParseErrorKind::BadDirective(_)));

    let err = parse_fail(".func f\n  jal ra, f\n");
    assert_eq!(err.to_string(), "line 2: unknown mnemonic `jal`");
}

#[test]
fn test_frontend_asm_reads_own_instructions() {
    // the instruction lines of the printer are valid input
    let mctx = parse(
        "
    .func f
f:
    li $r0, 1
    addi $r1, $r0, -2048
    fmadd.d $f2, fa0, fa1, fa2, rne
    fsw $f2, -4(s0)
    flw $f3, 2047(sp)
    ret
    .endfunc
",
    );
    let f = func(&mctx, "f");
    let lines = listing(&mctx, f);

    let src = format!(
        "\t.func g\ng:\n{}\n\t.endfunc\n",
        lines
            .iter()
            .map(|line| format!("\t{}", line))
            .collect::<Vec<_>>()
            .join("\n")
    );
    let again = parse(&src);
    assert_eq!(listing(&again, func(&again, "g")), lines);
}
