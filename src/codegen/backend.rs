//! The backend operation table: the complete set of target-specific
//! operations the generic generator drives. Two concrete implementations
//! ([`crate::codegen::x86_64_nasm::NasmBackend`] and
//! [`crate::codegen::aarch64::Aarch64Backend`]) realize this trait; the
//! generator holds only `&mut dyn Backend` and carries no target keyword.

use crate::types::PrimitiveType;

/// A scratch register, named indirectly through [`Backend::register_name`].
pub type Reg = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
}

/// The six comparison operators, shared between "compare and set a
/// register" and "compare and jump" forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

pub trait Backend {
    /// Number of general-purpose scratch registers this backend's pool
    /// manages (4 for x86-64, 8 for AArch64).
    fn register_count(&self) -> usize;

    // --- Program structure ---
    fn program_preamble(&self, out: &mut String);
    fn program_postamble(&self, out: &mut String);

    // --- Function structure ---
    fn function_preamble(&self, out: &mut String, name: &str, frame_bytes: usize);
    fn function_postamble(&self, out: &mut String, end_label: u32, frame_bytes: usize);
    fn call_function(&self, out: &mut String, name: &str, arg: Option<Reg>, dest: Reg);
    fn return_from_function(&self, out: &mut String, value: Option<Reg>, end_label: u32, ty: PrimitiveType);

    // --- Globals ---
    fn declare_global_scalar(&self, out: &mut String, name: &str, ty: PrimitiveType);
    fn declare_global_array(&self, out: &mut String, name: &str, ty: PrimitiveType, count: usize);
    fn declare_global_string(&self, out: &mut String, label: u32, text: &str);
    fn load_global(&self, out: &mut String, name: &str, ty: PrimitiveType, dest: Reg);
    fn store_global(&self, out: &mut String, name: &str, ty: PrimitiveType, src: Reg);
    fn address_of_global(&self, out: &mut String, name: &str, dest: Reg);
    fn load_string_address(&self, out: &mut String, label: u32, dest: Reg);

    // --- Locals (frame-pointer-relative) ---
    fn load_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, dest: Reg);
    fn store_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, src: Reg);
    fn address_of_local(&self, out: &mut String, offset: i64, dest: Reg);
    fn step_local(&self, out: &mut String, offset: i64, ty: PrimitiveType, delta: i64, post: bool, dest: Reg);

    // --- Pointers ---
    fn load_through_pointer(&self, out: &mut String, ty: PrimitiveType, addr: Reg, dest: Reg);
    fn store_through_pointer(&self, out: &mut String, ty: PrimitiveType, addr: Reg, src: Reg);

    // --- Immediates, arithmetic, bitwise, comparisons ---
    fn load_immediate(&self, out: &mut String, value: i64, dest: Reg);
    fn arithmetic(&self, out: &mut String, op: ArithOp, dest: Reg, src: Reg);
    fn bitwise(&self, out: &mut String, op: BitwiseOp, dest: Reg, src: Reg);
    fn logical_and(&self, out: &mut String, dest: Reg, src: Reg);
    fn logical_or(&self, out: &mut String, dest: Reg, src: Reg);
    fn negate(&self, out: &mut String, reg: Reg);
    fn invert(&self, out: &mut String, reg: Reg);
    fn logical_not(&self, out: &mut String, reg: Reg);

    /// Compare-and-set: `dest = (dest CMP src) ? 1 : 0`.
    fn compare_set(&self, out: &mut String, op: CompareOp, dest: Reg, src: Reg);
    /// Compare-and-jump: branch to `label` when the *inverted* condition
    /// holds (so the branch is taken when the source-level condition is
    /// false), per the IF/WHILE lowering contract.
    fn compare_jump(&self, out: &mut String, op: CompareOp, left: Reg, right: Reg, label: u32);

    fn label(&self, out: &mut String, label: u32);
    fn jump(&self, out: &mut String, label: u32);

    /// Widen the register holding a `from`-typed value to `to`.
    fn widen(&self, out: &mut String, reg: Reg, from: PrimitiveType, to: PrimitiveType);
    /// Multiply `reg` by `factor`, strength-reducing powers of two to a
    /// left shift.
    fn scale(&self, out: &mut String, reg: Reg, factor: usize);

    /// Pre/post increment or decrement of a global scalar. `post` selects
    /// whether the pre- or post-mutation value is left in the destination.
    fn step_global(&self, out: &mut String, name: &str, ty: PrimitiveType, delta: i64, post: bool, dest: Reg);
}
