//! GNU-as AArch64 backend: the [`Backend`] operation table realized as
//! AAPCS64 assembly text.
//!
//! Eight scratch registers (`x8`-`x15`) back the register pool; a `w`-sized
//! alias is used wherever the value's type is 4 bytes or narrower so the
//! upper word of the register is never read back.

use super::backend::{ArithOp, Backend, BitwiseOp, CompareOp, Reg};
use crate::types::PrimitiveType;
use std::fmt::Write as _;

const SCRATCH_REGS: usize = 8;

const XREG: [&str; SCRATCH_REGS] = ["x8", "x9", "x10", "x11", "x12", "x13", "x14", "x15"];
const WREG: [&str; SCRATCH_REGS] = ["w8", "w9", "w10", "w11", "w12", "w13", "w14", "w15"];

fn xreg(reg: Reg) -> &'static str {
    XREG[reg]
}

fn wreg(reg: Reg) -> &'static str {
    WREG[reg]
}

/// The register view matching a value's width: the 64-bit `x` form for
/// 8-byte types and pointers, the 32-bit `w` form otherwise.
fn sized(ty: PrimitiveType, reg: Reg) -> &'static str {
    if ty.size_of() > 4 {
        xreg(reg)
    } else {
        wreg(reg)
    }
}

fn cset_cc(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "eq",
        CompareOp::Ne => "ne",
        CompareOp::Lt => "lt",
        CompareOp::Gt => "gt",
        CompareOp::Le => "le",
        CompareOp::Ge => "ge",
    }
}

/// The inverted branch condition used by `compare_jump`: taken when the
/// source condition is false.
fn inverted_bcond(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "b.ne",
        CompareOp::Ne => "b.eq",
        CompareOp::Lt => "b.ge",
        CompareOp::Gt => "b.le",
        CompareOp::Le => "b.gt",
        CompareOp::Ge => "b.lt",
    }
}

pub struct Aarch64Backend;

impl Backend for Aarch64Backend {
    fn register_count(&self) -> usize {
        SCRATCH_REGS
    }

    fn program_preamble(&self, out: &mut String) {
        writeln!(out, "// generated AArch64 assembly").unwrap();
        writeln!(out, "\t.text").unwrap();
        writeln!(out, "\t.extern printint").unwrap();
        writeln!(out, "\t.extern printchar").unwrap();
        writeln!(out, "\t.extern printstring\n").unwrap();
    }

    fn program_postamble(&self, _out: &mut String) {}

    /// `x29` lands `locals`-bytes above `sp`, so a local's negative
    /// frame-pointer-relative offset addresses its slot below `x29`
    /// directly, matching the `rbp`-relative convention the NASM backend
    /// uses for the same offsets.
    fn function_preamble(&self, out: &mut String, name: &str, frame_bytes: usize) {
        let locals = frame_bytes.max(16);
        writeln!(out, "\t.globl {name}").unwrap();
        writeln!(out, "{name}:").unwrap();
        writeln!(out, "\tsub sp, sp, #{}", locals + 16).unwrap();
        writeln!(out, "\tstp x29, x30, [sp, #{locals}]").unwrap();
        writeln!(out, "\tadd x29, sp, #{locals}").unwrap();
    }

    fn function_postamble(&self, out: &mut String, end_label: u32, frame_bytes: usize) {
        let locals = frame_bytes.max(16);
        writeln!(out, "L{end_label}:").unwrap();
        writeln!(out, "\tldp x29, x30, [sp, #{locals}]").unwrap();
        writeln!(out, "\tadd sp, sp, #{}", locals + 16).unwrap();
        writeln!(out, "\tret\n").unwrap();
    }

    fn call_function(&self, out: &mut String, name: &str, arg: Option<Reg>, dest: Reg) {
        if let Some(arg) = arg {
            writeln!(out, "\tmov x0, {}", xreg(arg)).unwrap();
        }
        writeln!(out, "\tbl {name}").unwrap();
        writeln!(out, "\tmov {}, x0", xreg(dest)).unwrap();
    }

    fn return_from_function(&self, out: &mut String, value: Option<Reg>, end_label: u32, _ty: PrimitiveType) {
        if let Some(reg) = value {
            writeln!(out, "\tmov x0, {}", xreg(reg)).unwrap();
        }
        writeln!(out, "\tb L{end_label}").unwrap();
    }

    fn declare_global_scalar(&self, out: &mut String, name: &str, ty: PrimitiveType) {
        writeln!(out, "\t.bss").unwrap();
        writeln!(out, "\t.p2align {}", align_of(ty)).unwrap();
        writeln!(out, "{name}:").unwrap();
        writeln!(out, "\t.zero {}", ty.size_of().max(1)).unwrap();
        writeln!(out, "\t.text").unwrap();
    }

    fn declare_global_array(&self, out: &mut String, name: &str, ty: PrimitiveType, count: usize) {
        writeln!(out, "\t.bss").unwrap();
        writeln!(out, "\t.p2align {}", align_of(ty)).unwrap();
        writeln!(out, "{name}:").unwrap();
        writeln!(out, "\t.zero {}", ty.size_of().max(1) * count).unwrap();
        writeln!(out, "\t.text").unwrap();
    }

    fn declare_global_string(&self, out: &mut String, label: u32, text: &str) {
        writeln!(out, "\t.section .rodata").unwrap();
        writeln!(out, "L{label}:").unwrap();
        for directive in ascii_directives(text) {
            writeln!(out, "\t{directive}").unwrap();
        }
        writeln!(out, "\t.byte 0").unwrap();
        writeln!(out, "\t.text").unwrap();
    }

    fn load_global(&self, out: &mut String, name: &str, ty: PrimitiveType, dest: Reg) {
        writeln!(out, "\tadrp {}, {name}", xreg(dest)).unwrap();
        writeln!(out, "\tadd {0}, {0}, :lo12:{name}", xreg(dest)).unwrap();
        let op = if ty.is_integer() && ty.size_of() < 4 { "ldrb" } else { "ldr" };
        writeln!(out, "\t{op} {}, [{}]", sized(ty, dest), xreg(dest)).unwrap();
    }

    fn store_global(&self, out: &mut String, name: &str, ty: PrimitiveType, src: Reg) {
        let scratch = scratch_other_than(src);
        writeln!(out, "\tadrp {scratch}, {name}").unwrap();
        writeln!(out, "\tadd {scratch}, {scratch}, :lo12:{name}").unwrap();
        let op = if ty.is_integer() && ty.size_of() < 4 { "strb" } else { "str" };
        writeln!(out, "\t{op} {}, [{scratch}]", sized(ty, src)).unwrap();
    }

    fn address_of_global(&self, out: &mut String, name: &str, dest: Reg) {
        writeln!(out, "\tadrp {}, {name}", xreg(dest)).unwrap();
        writeln!(out, "\tadd {0}, {0}, :lo12:{name}", xreg(dest)).unwrap();
    }

    fn load_string_address(&self, out: &mut String, label: u32, dest: Reg) {
        writeln!(out, "\tadrp {}, L{label}", xreg(dest)).unwrap();
        writeln!(out, "\tadd {0}, {0}, :lo12:L{label}", xreg(dest)).unwrap();
    }

    fn load_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, dest: Reg) {
        let op = if ty.is_integer() && ty.size_of() < 4 { "ldrb" } else { "ldr" };
        writeln!(out, "\t{op} {}, [x29, #{offset}]", sized(ty, dest)).unwrap();
    }

    fn store_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, src: Reg) {
        let op = if ty.is_integer() && ty.size_of() < 4 { "strb" } else { "str" };
        writeln!(out, "\t{op} {}, [x29, #{offset}]", sized(ty, src)).unwrap();
    }

    fn address_of_local(&self, out: &mut String, offset: i64, dest: Reg) {
        writeln!(out, "\tadd {}, x29, #{offset}", xreg(dest)).unwrap();
    }

    fn step_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, delta: i64, post: bool, dest: Reg) {
        let op_ld = if ty.is_integer() && ty.size_of() < 4 { "ldrb" } else { "ldr" };
        let op_st = if ty.is_integer() && ty.size_of() < 4 { "strb" } else { "str" };
        writeln!(out, "\t{op_ld} {}, [x29, #{offset}]", sized(ty, dest)).unwrap();
        if post {
            writeln!(out, "\tadd {0}, {0}, {1}", sized(ty, dest), delta).unwrap();
            writeln!(out, "\t{op_st} {}, [x29, #{offset}]", sized(ty, dest)).unwrap();
            writeln!(out, "\tsub {0}, {0}, {1}", sized(ty, dest), delta).unwrap();
        } else {
            writeln!(out, "\tadd {0}, {0}, {1}", sized(ty, dest), delta).unwrap();
            writeln!(out, "\t{op_st} {}, [x29, #{offset}]", sized(ty, dest)).unwrap();
        }
    }

    fn load_through_pointer(&self, out: &mut String, ty: PrimitiveType, addr: Reg, dest: Reg) {
        let op = if ty.is_integer() && ty.size_of() < 4 { "ldrb" } else { "ldr" };
        writeln!(out, "\t{op} {}, [{}]", sized(ty, dest), xreg(addr)).unwrap();
    }

    fn store_through_pointer(&self, out: &mut String, ty: PrimitiveType, addr: Reg, src: Reg) {
        let op = if ty.is_integer() && ty.size_of() < 4 { "strb" } else { "str" };
        writeln!(out, "\t{op} {}, [{}]", sized(ty, src), xreg(addr)).unwrap();
    }

    fn load_immediate(&self, out: &mut String, value: i64, dest: Reg) {
        writeln!(out, "\tmov {}, {value}", xreg(dest)).unwrap();
    }

    fn arithmetic(&self, out: &mut String, op: ArithOp, dest: Reg, src: Reg) {
        let d = xreg(dest);
        let s = xreg(src);
        match op {
            ArithOp::Add => writeln!(out, "\tadd {d}, {d}, {s}").unwrap(),
            ArithOp::Subtract => writeln!(out, "\tsub {d}, {d}, {s}").unwrap(),
            ArithOp::Multiply => writeln!(out, "\tmul {d}, {d}, {s}").unwrap(),
            ArithOp::Divide => writeln!(out, "\tsdiv {d}, {d}, {s}").unwrap(),
        }
    }

    fn bitwise(&self, out: &mut String, op: BitwiseOp, dest: Reg, src: Reg) {
        let d = xreg(dest);
        let s = xreg(src);
        match op {
            BitwiseOp::And => writeln!(out, "\tand {d}, {d}, {s}").unwrap(),
            BitwiseOp::Or => writeln!(out, "\torr {d}, {d}, {s}").unwrap(),
            BitwiseOp::Xor => writeln!(out, "\teor {d}, {d}, {s}").unwrap(),
            BitwiseOp::ShiftLeft => writeln!(out, "\tlsl {d}, {d}, {s}").unwrap(),
            BitwiseOp::ShiftRight => writeln!(out, "\tasr {d}, {d}, {s}").unwrap(),
        }
    }

    fn logical_and(&self, out: &mut String, dest: Reg, src: Reg) {
        writeln!(out, "\tand {0}, {0}, {1}", xreg(dest), xreg(src)).unwrap();
    }

    fn logical_or(&self, out: &mut String, dest: Reg, src: Reg) {
        writeln!(out, "\torr {0}, {0}, {1}", xreg(dest), xreg(src)).unwrap();
    }

    fn negate(&self, out: &mut String, reg: Reg) {
        writeln!(out, "\tneg {0}, {0}", xreg(reg)).unwrap();
    }

    fn invert(&self, out: &mut String, reg: Reg) {
        writeln!(out, "\tmvn {0}, {0}", xreg(reg)).unwrap();
    }

    fn logical_not(&self, out: &mut String, reg: Reg) {
        writeln!(out, "\tcmp {}, 0", xreg(reg)).unwrap();
        writeln!(out, "\tcset {}, eq", xreg(reg)).unwrap();
    }

    fn compare_set(&self, out: &mut String, op: CompareOp, dest: Reg, src: Reg) {
        writeln!(out, "\tcmp {}, {}", xreg(dest), xreg(src)).unwrap();
        writeln!(out, "\tcset {}, {}", xreg(dest), cset_cc(op)).unwrap();
    }

    fn compare_jump(&self, out: &mut String, op: CompareOp, left: Reg, right: Reg, label: u32) {
        writeln!(out, "\tcmp {}, {}", xreg(left), xreg(right)).unwrap();
        writeln!(out, "\t{} L{label}", inverted_bcond(op)).unwrap();
    }

    fn label(&self, out: &mut String, label: u32) {
        writeln!(out, "L{label}:").unwrap();
    }

    fn jump(&self, out: &mut String, label: u32) {
        writeln!(out, "\tb L{label}").unwrap();
    }

    fn widen(&self, out: &mut String, reg: Reg, from: PrimitiveType, to: PrimitiveType) {
        if from.size_of() >= to.size_of() {
            return;
        }
        writeln!(out, "\tuxtw {0}, {1}", xreg(reg), wreg(reg)).unwrap();
    }

    fn scale(&self, out: &mut String, reg: Reg, factor: usize) {
        if factor == 1 {
            return;
        }
        if factor.is_power_of_two() {
            writeln!(out, "\tlsl {0}, {0}, {1}", xreg(reg), factor.trailing_zeros()).unwrap();
        } else {
            writeln!(out, "\tmov {}, {factor}", xreg(scratch_other_than(reg))).unwrap();
            writeln!(out, "\tmul {0}, {0}, {1}", xreg(reg), xreg(scratch_other_than(reg))).unwrap();
        }
    }

    fn step_global(&self, out: &mut String, name: &str, ty: PrimitiveType, delta: i64, post: bool, dest: Reg) {
        let addr = scratch_other_than(dest);
        writeln!(out, "\tadrp {addr}, {name}").unwrap();
        writeln!(out, "\tadd {addr}, {addr}, :lo12:{name}").unwrap();
        let op_ld = if ty.is_integer() && ty.size_of() < 4 { "ldrb" } else { "ldr" };
        let op_st = if ty.is_integer() && ty.size_of() < 4 { "strb" } else { "str" };
        writeln!(out, "\t{op_ld} {}, [{addr}]", sized(ty, dest)).unwrap();
        if post {
            writeln!(out, "\tadd {0}, {0}, {1}", sized(ty, dest), delta).unwrap();
            writeln!(out, "\t{op_st} {}, [{addr}]", sized(ty, dest)).unwrap();
            writeln!(out, "\tsub {0}, {0}, {1}", sized(ty, dest), delta).unwrap();
        } else {
            writeln!(out, "\tadd {0}, {0}, {1}", sized(ty, dest), delta).unwrap();
            writeln!(out, "\t{op_st} {}, [{addr}]", sized(ty, dest)).unwrap();
        }
    }
}

fn align_of(ty: PrimitiveType) -> usize {
    match ty.size_of() {
        0 | 1 => 0,
        4 => 2,
        _ => 3,
    }
}

/// Picks a scratch register distinct from `avoid`, for instructions that
/// need an address register alongside the value register.
fn scratch_other_than(avoid: Reg) -> Reg {
    if avoid == SCRATCH_REGS - 1 {
        SCRATCH_REGS - 2
    } else {
        SCRATCH_REGS - 1
    }
}

/// Splits `text`'s bytes into `.ascii "..."` runs of plain printable
/// characters and individual `.byte N` directives for quotes, backslashes,
/// and non-printable control bytes, the way the NASM backend's
/// `db_escaped` lists every byte of a non-trivial string explicitly rather
/// than leaning on an assembler escape syntax.
fn ascii_directives(text: &str) -> Vec<String> {
    let mut directives = Vec::new();
    let mut run = String::new();
    for b in text.bytes() {
        let plain_printable = (b.is_ascii_graphic() || b == b' ') && b != b'"' && b != b'\\';
        if plain_printable {
            run.push(b as char);
            continue;
        }
        if !run.is_empty() {
            directives.push(format!(".ascii \"{run}\""));
            run.clear();
        }
        directives.push(format!(".byte {b}"));
    }
    if !run.is_empty() {
        directives.push(format!(".ascii \"{run}\""));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_immediate_emits_a_mov_with_the_literal() {
        let backend = Aarch64Backend;
        let mut out = String::new();
        backend.load_immediate(&mut out, 42, 0);
        assert!(out.contains("mov x8, 42"));
    }

    #[test]
    fn compare_jump_uses_the_inverted_condition() {
        let backend = Aarch64Backend;
        let mut out = String::new();
        backend.compare_jump(&mut out, CompareOp::Lt, 0, 1, 3);
        assert!(out.contains("b.ge L3"));
    }

    #[test]
    fn scale_by_a_power_of_two_strength_reduces_to_a_shift() {
        let backend = Aarch64Backend;
        let mut out = String::new();
        backend.scale(&mut out, 0, 4);
        assert!(out.contains("lsl x8, x8, 2"));
    }

    #[test]
    fn string_literal_declaration_uses_ascii_with_a_trailing_byte_zero() {
        let backend = Aarch64Backend;
        let mut out = String::new();
        backend.declare_global_string(&mut out, 0, "hi");
        assert!(out.contains(".section .rodata"));
        assert!(out.contains(".ascii \"hi\""));
        assert!(out.contains(".byte 0"));
    }

    #[test]
    fn string_literal_declaration_emits_non_printable_bytes_individually() {
        let backend = Aarch64Backend;
        let mut out = String::new();
        backend.declare_global_string(&mut out, 0, "a\tb");
        assert!(out.contains(".ascii \"a\""));
        assert!(out.contains(".byte 9"));
        assert!(out.contains(".ascii \"b\""));
    }
}
