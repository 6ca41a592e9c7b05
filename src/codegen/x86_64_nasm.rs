//! NASM Intel-syntax x86-64 backend: the [`Backend`] operation table
//! realized as System V AMD64 assembly text.
//!
//! Four scratch registers (`r8`-`r11`) back the register pool; each has a
//! byte/dword/qword view selected by operand size so a `char` load doesn't
//! drag in the upper 56 bits of garbage.

use super::backend::{ArithOp, Backend, BitwiseOp, CompareOp, Reg};
use crate::types::PrimitiveType;
use std::fmt::Write as _;

const SCRATCH_REGS: usize = 4;

/// Byte/dword/qword names for each of the four scratch registers, indexed
/// by [`Reg`].
const QWORD: [&str; SCRATCH_REGS] = ["r8", "r9", "r10", "r11"];
const DWORD: [&str; SCRATCH_REGS] = ["r8d", "r9d", "r10d", "r11d"];
const BYTE: [&str; SCRATCH_REGS] = ["r8b", "r9b", "r10b", "r11b"];

fn reg_of(size: &'static [&'static str; SCRATCH_REGS], reg: Reg) -> &'static str {
    size[reg]
}

fn sized(ty: PrimitiveType, reg: Reg) -> &'static str {
    match ty.size_of() {
        1 => reg_of(&BYTE, reg),
        4 => reg_of(&DWORD, reg),
        _ => reg_of(&QWORD, reg),
    }
}

fn size_directive(ty: PrimitiveType) -> &'static str {
    match ty.size_of() {
        1 => "byte",
        4 => "dword",
        _ => "qword",
    }
}

fn nasm_reserve_directive(ty: PrimitiveType) -> &'static str {
    match ty.size_of() {
        1 => "resb",
        4 => "resd",
        _ => "resq",
    }
}

fn set_cc(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "sete",
        CompareOp::Ne => "setne",
        CompareOp::Lt => "setl",
        CompareOp::Gt => "setg",
        CompareOp::Le => "setle",
        CompareOp::Ge => "setge",
    }
}

/// The inverted jump used by `compare_jump`: the branch fires when the
/// source condition is false.
fn inverted_jcc(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "jne",
        CompareOp::Ne => "je",
        CompareOp::Lt => "jge",
        CompareOp::Gt => "jle",
        CompareOp::Le => "jg",
        CompareOp::Ge => "jl",
    }
}

/// Escapes a string literal's bytes into a comma-separated list of NASM
/// `db` operands, terminated with an explicit 0.
fn db_escaped(text: &str) -> String {
    let mut parts: Vec<String> = text.bytes().map(|b| b.to_string()).collect();
    parts.push("0".to_string());
    parts.join(", ")
}

pub struct NasmBackend;

impl Backend for NasmBackend {
    fn register_count(&self) -> usize {
        SCRATCH_REGS
    }

    fn program_preamble(&self, out: &mut String) {
        writeln!(out, "; generated NASM x86-64 assembly").unwrap();
        writeln!(out, "\tdefault rel\n").unwrap();
        writeln!(out, "\tsection .text").unwrap();
        writeln!(out, "\textern printint").unwrap();
        writeln!(out, "\textern printchar").unwrap();
        writeln!(out, "\textern printstring\n").unwrap();
    }

    fn program_postamble(&self, _out: &mut String) {}

    fn function_preamble(&self, out: &mut String, name: &str, frame_bytes: usize) {
        writeln!(out, "\tglobal {name}").unwrap();
        writeln!(out, "{name}:").unwrap();
        writeln!(out, "\tpush rbp").unwrap();
        writeln!(out, "\tmov rbp, rsp").unwrap();
        if frame_bytes > 0 {
            writeln!(out, "\tsub rsp, {frame_bytes}").unwrap();
        }
    }

    fn function_postamble(&self, out: &mut String, end_label: u32, frame_bytes: usize) {
        writeln!(out, "L{end_label}:").unwrap();
        if frame_bytes > 0 {
            writeln!(out, "\tadd rsp, {frame_bytes}").unwrap();
        }
        writeln!(out, "\tpop rbp").unwrap();
        writeln!(out, "\tret\n").unwrap();
    }

    fn call_function(&self, out: &mut String, name: &str, arg: Option<Reg>, dest: Reg) {
        if let Some(arg) = arg {
            writeln!(out, "\tmov rdi, {}", reg_of(&QWORD, arg)).unwrap();
        }
        writeln!(out, "\tcall {name}").unwrap();
        writeln!(out, "\tmov {}, rax", reg_of(&QWORD, dest)).unwrap();
    }

    fn return_from_function(&self, out: &mut String, value: Option<Reg>, end_label: u32, _ty: PrimitiveType) {
        if let Some(reg) = value {
            writeln!(out, "\tmov rax, {}", reg_of(&QWORD, reg)).unwrap();
        }
        writeln!(out, "\tjmp L{end_label}").unwrap();
    }

    fn declare_global_scalar(&self, out: &mut String, name: &str, ty: PrimitiveType) {
        writeln!(out, "\tsection .bss").unwrap();
        writeln!(out, "\talign {}", ty.size_of().max(1)).unwrap();
        writeln!(out, "{name}: {} 1", nasm_reserve_directive(ty)).unwrap();
        writeln!(out, "\tsection .text").unwrap();
    }

    fn declare_global_array(&self, out: &mut String, name: &str, ty: PrimitiveType, count: usize) {
        writeln!(out, "\tsection .bss").unwrap();
        writeln!(out, "\talign {}", ty.size_of().max(1)).unwrap();
        writeln!(out, "{name}: {} {count}", nasm_reserve_directive(ty)).unwrap();
        writeln!(out, "\tsection .text").unwrap();
    }

    fn declare_global_string(&self, out: &mut String, label: u32, text: &str) {
        writeln!(out, "\tsection .rodata").unwrap();
        writeln!(out, "L{label}: db {}", db_escaped(text)).unwrap();
        writeln!(out, "\tsection .text").unwrap();
    }

    fn load_global(&self, out: &mut String, name: &str, ty: PrimitiveType, dest: Reg) {
        let movop = if ty.is_integer() && ty.size_of() < 8 {
            "movzx"
        } else {
            "mov"
        };
        writeln!(
            out,
            "\t{movop} {}, {} [rel {name}]",
            reg_of(&QWORD, dest),
            size_directive(ty)
        )
        .unwrap();
    }

    fn store_global(&self, out: &mut String, name: &str, ty: PrimitiveType, src: Reg) {
        writeln!(out, "\tmov [rel {name}], {}", sized(ty, src)).unwrap();
    }

    fn address_of_global(&self, out: &mut String, name: &str, dest: Reg) {
        writeln!(out, "\tlea {}, [rel {name}]", reg_of(&QWORD, dest)).unwrap();
    }

    fn load_string_address(&self, out: &mut String, label: u32, dest: Reg) {
        writeln!(out, "\tlea {}, [rel L{label}]", reg_of(&QWORD, dest)).unwrap();
    }

    fn load_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, dest: Reg) {
        let movop = if ty.is_integer() && ty.size_of() < 8 { "movzx" } else { "mov" };
        writeln!(out, "\t{movop} {}, {} [rbp{offset:+}]", reg_of(&QWORD, dest), size_directive(ty)).unwrap();
    }

    fn store_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, src: Reg) {
        writeln!(out, "\tmov [rbp{offset:+}], {}", sized(ty, src)).unwrap();
    }

    fn address_of_local(&self, out: &mut String, offset: i64, dest: Reg) {
        writeln!(out, "\tlea {}, [rbp{offset:+}]", reg_of(&QWORD, dest)).unwrap();
    }

    fn step_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, delta: i64, post: bool, dest: Reg) {
        let d = reg_of(&QWORD, dest);
        if post {
            writeln!(out, "\tmov {d}, {} [rbp{offset:+}]", size_directive(ty)).unwrap();
            writeln!(out, "\tadd {} [rbp{offset:+}], {delta}", size_directive(ty)).unwrap();
        } else {
            writeln!(out, "\tadd {} [rbp{offset:+}], {delta}", size_directive(ty)).unwrap();
            writeln!(out, "\tmov {d}, {} [rbp{offset:+}]", size_directive(ty)).unwrap();
        }
    }

    fn load_through_pointer(&self, out: &mut String, ty: PrimitiveType, addr: Reg, dest: Reg) {
        let movop = if ty.is_integer() && ty.size_of() < 8 {
            "movzx"
        } else {
            "mov"
        };
        writeln!(
            out,
            "\t{movop} {}, {} [{}]",
            reg_of(&QWORD, dest),
            size_directive(ty),
            reg_of(&QWORD, addr)
        )
        .unwrap();
    }

    fn store_through_pointer(&self, out: &mut String, ty: PrimitiveType, addr: Reg, src: Reg) {
        writeln!(out, "\tmov [{}], {}", reg_of(&QWORD, addr), sized(ty, src)).unwrap();
    }

    fn load_immediate(&self, out: &mut String, value: i64, dest: Reg) {
        writeln!(out, "\tmov {}, {value}", reg_of(&QWORD, dest)).unwrap();
    }

    fn arithmetic(&self, out: &mut String, op: ArithOp, dest: Reg, src: Reg) {
        let d = reg_of(&QWORD, dest);
        let s = reg_of(&QWORD, src);
        match op {
            ArithOp::Add => writeln!(out, "\tadd {d}, {s}").unwrap(),
            ArithOp::Subtract => writeln!(out, "\tsub {d}, {s}").unwrap(),
            ArithOp::Multiply => writeln!(out, "\timul {d}, {s}").unwrap(),
            ArithOp::Divide => {
                writeln!(out, "\tmov rax, {d}").unwrap();
                writeln!(out, "\tcqo").unwrap();
                writeln!(out, "\tidiv {s}").unwrap();
                writeln!(out, "\tmov {d}, rax").unwrap();
            }
        }
    }

    fn bitwise(&self, out: &mut String, op: BitwiseOp, dest: Reg, src: Reg) {
        let d = reg_of(&QWORD, dest);
        let s = reg_of(&QWORD, src);
        match op {
            BitwiseOp::And => writeln!(out, "\tand {d}, {s}").unwrap(),
            BitwiseOp::Or => writeln!(out, "\tor {d}, {s}").unwrap(),
            BitwiseOp::Xor => writeln!(out, "\txor {d}, {s}").unwrap(),
            BitwiseOp::ShiftLeft => {
                writeln!(out, "\tmov rcx, {s}").unwrap();
                writeln!(out, "\tshl {d}, cl").unwrap();
            }
            BitwiseOp::ShiftRight => {
                writeln!(out, "\tmov rcx, {s}").unwrap();
                writeln!(out, "\tsar {d}, cl").unwrap();
            }
        }
    }

    fn logical_and(&self, out: &mut String, dest: Reg, src: Reg) {
        writeln!(out, "\tand {}, {}", reg_of(&QWORD, dest), reg_of(&QWORD, src)).unwrap();
    }

    fn logical_or(&self, out: &mut String, dest: Reg, src: Reg) {
        writeln!(out, "\tor {}, {}", reg_of(&QWORD, dest), reg_of(&QWORD, src)).unwrap();
    }

    fn negate(&self, out: &mut String, reg: Reg) {
        writeln!(out, "\tneg {}", reg_of(&QWORD, reg)).unwrap();
    }

    fn invert(&self, out: &mut String, reg: Reg) {
        writeln!(out, "\tnot {}", reg_of(&QWORD, reg)).unwrap();
    }

    fn logical_not(&self, out: &mut String, reg: Reg) {
        let q = reg_of(&QWORD, reg);
        writeln!(out, "\tcmp {q}, 0").unwrap();
        writeln!(out, "\tsete {}", reg_of(&BYTE, reg)).unwrap();
        writeln!(out, "\tmovzx {q}, {}", reg_of(&BYTE, reg)).unwrap();
    }

    fn compare_set(&self, out: &mut String, op: CompareOp, dest: Reg, src: Reg) {
        writeln!(out, "\tcmp {}, {}", reg_of(&QWORD, dest), reg_of(&QWORD, src)).unwrap();
        writeln!(out, "\t{} {}", set_cc(op), reg_of(&BYTE, dest)).unwrap();
        writeln!(out, "\tmovzx {}, {}", reg_of(&QWORD, dest), reg_of(&BYTE, dest)).unwrap();
    }

    fn compare_jump(&self, out: &mut String, op: CompareOp, left: Reg, right: Reg, label: u32) {
        writeln!(out, "\tcmp {}, {}", reg_of(&QWORD, left), reg_of(&QWORD, right)).unwrap();
        writeln!(out, "\t{} L{label}", inverted_jcc(op)).unwrap();
    }

    fn label(&self, out: &mut String, label: u32) {
        writeln!(out, "L{label}:").unwrap();
    }

    fn jump(&self, out: &mut String, label: u32) {
        writeln!(out, "\tjmp L{label}").unwrap();
    }

    fn widen(&self, out: &mut String, reg: Reg, from: PrimitiveType, to: PrimitiveType) {
        if from.size_of() >= to.size_of() {
            return;
        }
        writeln!(out, "\tmovzx {}, {}", reg_of(&QWORD, reg), sized(from, reg)).unwrap();
    }

    fn scale(&self, out: &mut String, reg: Reg, factor: usize) {
        if factor == 1 {
            return;
        }
        if factor.is_power_of_two() {
            writeln!(out, "\tshl {}, {}", reg_of(&QWORD, reg), factor.trailing_zeros()).unwrap();
        } else {
            writeln!(out, "\timul {}, {factor}", reg_of(&QWORD, reg)).unwrap();
        }
    }

    fn step_global(&self, out: &mut String, name: &str, ty: PrimitiveType, delta: i64, post: bool, dest: Reg) {
        let d = reg_of(&QWORD, dest);
        if post {
            writeln!(out, "\tmov {d}, {} [rel {name}]", size_directive(ty)).unwrap();
            writeln!(out, "\tadd {} [rel {name}], {delta}", size_directive(ty)).unwrap();
        } else {
            writeln!(out, "\tadd {} [rel {name}], {delta}", size_directive(ty)).unwrap();
            writeln!(out, "\tmov {d}, {} [rel {name}]", size_directive(ty)).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_immediate_emits_a_mov_with_the_literal() {
        let backend = NasmBackend;
        let mut out = String::new();
        backend.load_immediate(&mut out, 42, 0);
        assert!(out.contains("mov r8, 42"));
    }

    #[test]
    fn compare_jump_uses_the_inverted_condition() {
        let backend = NasmBackend;
        let mut out = String::new();
        backend.compare_jump(&mut out, CompareOp::Lt, 0, 1, 3);
        assert!(out.contains("jge L3"));
    }

    #[test]
    fn scale_by_a_power_of_two_strength_reduces_to_a_shift() {
        let backend = NasmBackend;
        let mut out = String::new();
        backend.scale(&mut out, 0, 8);
        assert!(out.contains("shl r8, 3"));
    }

    #[test]
    fn scale_by_a_non_power_of_two_uses_imul() {
        let backend = NasmBackend;
        let mut out = String::new();
        backend.scale(&mut out, 0, 3);
        assert!(out.contains("imul r8, 3"));
    }

    #[test]
    fn string_literal_declaration_escapes_to_byte_list() {
        let backend = NasmBackend;
        let mut out = String::new();
        backend.declare_global_string(&mut out, 0, "hi");
        assert!(out.contains("db 104, 105, 0"));
    }
}
