//! Target-agnostic AST-walking code generator.
//!
//! The generator performs a post-order walk, allocating and freeing
//! registers from a small pool and dispatching every target-specific
//! emission through the [`Backend`] operation table. No target keyword
//! appears anywhere in this module.

pub mod aarch64;
pub mod backend;
pub mod x86_64_nasm;

use crate::ast::{AstKind, AstNode};
use crate::diagnostics::{CompileError, Result};
use crate::parser::{LabelAllocator, Program, NOLABEL};
use crate::symtab::{StorageClass, StructuralType, SymbolTable};
use crate::types::PrimitiveType;
use backend::{ArithOp, Backend, BitwiseOp, CompareOp, Reg};
use tracing::trace;

/// Fixed-capacity register pool, bit-flagged free/used, reset at statement
/// boundaries and at each branch/loop edge.
pub struct RegisterPool {
    free: Vec<bool>,
}

impl RegisterPool {
    pub fn new(count: usize) -> Self {
        RegisterPool {
            free: vec![true; count],
        }
    }

    pub fn reset(&mut self) {
        for slot in &mut self.free {
            *slot = true;
        }
    }

    pub fn allocate(&mut self) -> Result<Reg> {
        match self.free.iter().position(|f| *f) {
            Some(idx) => {
                self.free[idx] = false;
                trace!(reg = idx, "allocated register");
                Ok(idx)
            }
            None => Err(CompileError::internal(0, "register pool exhausted")),
        }
    }

    pub fn free_register(&mut self, reg: Reg) -> Result<()> {
        if self.free[reg] {
            return Err(CompileError::internal(0, "double free of a register"));
        }
        self.free[reg] = true;
        trace!(reg, "freed register");
        Ok(())
    }
}

pub struct CodeGen<'b> {
    backend: &'b mut dyn Backend,
    pool: RegisterPool,
    symtab: SymbolTable,
    labels: LabelAllocator,
    current_function: Option<crate::symtab::SymbolId>,
    out: String,
}

impl<'b> CodeGen<'b> {
    /// Consumes the parsed program: the generator is the AST's final
    /// owner, and reuses the parser's own label counter for control-flow
    /// labels so they never collide with string-literal labels.
    pub fn new(backend: &'b mut dyn Backend, program: Program) -> (Self, Vec<AstNode>, Vec<(u32, String)>) {
        let pool = RegisterPool::new(backend.register_count());
        let codegen = CodeGen {
            backend,
            pool,
            symtab: program.symtab,
            labels: program.labels,
            current_function: None,
            out: String::new(),
        };
        (codegen, program.functions, program.strings)
    }

    /// Emits a complete program: preamble, globals, every function body,
    /// postamble. Returns the assembled output text.
    pub fn generate_program(backend: &'b mut dyn Backend, program: Program) -> Result<String> {
        let (mut codegen, functions, strings) = Self::new(backend, program);
        codegen.backend.program_preamble(&mut codegen.out);
        codegen.emit_globals();
        for (label, text) in &strings {
            codegen.backend.declare_global_string(&mut codegen.out, *label, text);
        }
        for func in &functions {
            codegen.generate(func, NOLABEL)?;
        }
        codegen.backend.program_postamble(&mut codegen.out);
        Ok(codegen.out)
    }

    fn emit_globals(&mut self) {
        let globals: Vec<_> = self.symtab.globals().collect();
        for sym in globals {
            match sym.structural {
                StructuralType::Variable => self.backend.declare_global_scalar(&mut self.out, &sym.name, sym.ty),
                StructuralType::Array => {
                    self.backend.declare_global_array(&mut self.out, &sym.name, sym.ty, sym.size)
                }
                StructuralType::Function => {}
            }
        }
    }

    /// Post-order walk. `label` is only meaningful for a comparison
    /// emitted directly under `IF`/`WHILE`; it is [`NOLABEL`] everywhere
    /// else.
    fn generate(&mut self, node: &AstNode, label: u32) -> Result<Option<Reg>> {
        match &node.kind {
            AstKind::IntegerLiteral(value) => {
                let r = self.pool.allocate()?;
                self.backend.load_immediate(&mut self.out, *value, r);
                Ok(Some(r))
            }
            AstKind::StringLiteral(str_label) => {
                let r = self.pool.allocate()?;
                self.backend.load_string_address(&mut self.out, *str_label, r);
                Ok(Some(r))
            }
            AstKind::Identifier(id) => self.generate_identifier(*id, node.is_rvalue),
            AstKind::AddressOf(id) => {
                let sym = self.symtab.get(*id).clone();
                let r = self.pool.allocate()?;
                match sym.storage {
                    StorageClass::Global => self.backend.address_of_global(&mut self.out, &sym.name, r),
                    StorageClass::Local => self.backend.address_of_local(&mut self.out, sym.stack_offset, r),
                }
                Ok(Some(r))
            }
            AstKind::Dereference => {
                let addr = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
                if node.is_rvalue {
                    let dest = self.pool.allocate()?;
                    self.backend.load_through_pointer(&mut self.out, node.ty, addr, dest);
                    self.pool.free_register(addr)?;
                    Ok(Some(dest))
                } else {
                    Ok(Some(addr))
                }
            }

            AstKind::Add | AstKind::Subtract | AstKind::Multiply | AstKind::Divide => {
                self.generate_arithmetic(node, arith_op(&node.kind))
            }
            AstKind::BitwiseAnd | AstKind::BitwiseOr | AstKind::BitwiseXor | AstKind::LShift | AstKind::RShift => {
                self.generate_bitwise(node, bitwise_op(&node.kind))
            }
            AstKind::LogicalAnd | AstKind::LogicalOr => {
                let left = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
                let right = self.generate_required(node.right.as_ref().unwrap(), NOLABEL)?;
                match node.kind {
                    AstKind::LogicalAnd => self.backend.logical_and(&mut self.out, left, right),
                    _ => self.backend.logical_or(&mut self.out, left, right),
                }
                self.pool.free_register(right)?;
                Ok(Some(left))
            }
            AstKind::Negate | AstKind::Invert | AstKind::LogicalNot => {
                let reg = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
                match node.kind {
                    AstKind::Negate => self.backend.negate(&mut self.out, reg),
                    AstKind::Invert => self.backend.invert(&mut self.out, reg),
                    _ => self.backend.logical_not(&mut self.out, reg),
                }
                Ok(Some(reg))
            }

            AstKind::Eq | AstKind::Ne | AstKind::Lt | AstKind::Gt | AstKind::Le | AstKind::Ge => {
                self.generate_comparison(node, compare_op(&node.kind), label)
            }

            AstKind::Assign => self.generate_assign(node),
            AstKind::Widen => {
                let reg = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
                self.backend.widen(&mut self.out, reg, node.left.as_ref().unwrap().ty, node.ty);
                Ok(Some(reg))
            }
            AstKind::Scale(factor) => {
                let reg = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
                self.backend.scale(&mut self.out, reg, *factor);
                Ok(Some(reg))
            }

            AstKind::Glue => {
                if let Some(left) = &node.left {
                    self.generate(left, NOLABEL)?;
                    self.pool.reset();
                }
                if let Some(right) = &node.right {
                    self.generate(right, NOLABEL)?;
                    self.pool.reset();
                }
                Ok(None)
            }
            AstKind::If => self.generate_if(node),
            AstKind::While => self.generate_while(node),
            AstKind::Function(id) => self.generate_function(*id, node),
            AstKind::FunctionCall(id) => self.generate_call(*id, node),
            AstKind::Return => self.generate_return(node),

            AstKind::PreIncrement(id) => self.generate_step(*id, 1, false),
            AstKind::PreDecrement(id) => self.generate_step(*id, -1, false),
            AstKind::PostIncrement(id) => self.generate_step(*id, 1, true),
            AstKind::PostDecrement(id) => self.generate_step(*id, -1, true),
        }
    }

    /// Like [`Self::generate`], but asserts a register was produced —
    /// used everywhere an rvalue child is required.
    fn generate_required(&mut self, node: &AstNode, label: u32) -> Result<Reg> {
        self.generate(node, label)?
            .ok_or_else(|| CompileError::internal(0, "expected a value-producing subtree"))
    }

    fn generate_identifier(&mut self, id: crate::symtab::SymbolId, is_rvalue: bool) -> Result<Option<Reg>> {
        let sym = self.symtab.get(id).clone();
        if sym.structural == StructuralType::Array {
            let r = self.pool.allocate()?;
            match sym.storage {
                StorageClass::Global => self.backend.address_of_global(&mut self.out, &sym.name, r),
                StorageClass::Local => self.backend.address_of_local(&mut self.out, sym.stack_offset, r),
            }
            return Ok(Some(r));
        }
        if is_rvalue {
            let r = self.pool.allocate()?;
            match sym.storage {
                StorageClass::Global => self.backend.load_global(&mut self.out, &sym.name, sym.ty, r),
                StorageClass::Local => self.backend.load_local(&mut self.out, sym.stack_offset, sym.ty, r),
            }
            Ok(Some(r))
        } else {
            // Lvalue passthrough: the parent (ASSIGN/ADDRESSOF) consumes
            // the symbol directly and never asks for a register here.
            Ok(None)
        }
    }

    fn generate_arithmetic(&mut self, node: &AstNode, op: ArithOp) -> Result<Option<Reg>> {
        let left = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
        let right = self.generate_required(node.right.as_ref().unwrap(), NOLABEL)?;
        self.backend.arithmetic(&mut self.out, op, left, right);
        self.pool.free_register(right)?;
        Ok(Some(left))
    }

    fn generate_bitwise(&mut self, node: &AstNode, op: BitwiseOp) -> Result<Option<Reg>> {
        let left = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
        let right = self.generate_required(node.right.as_ref().unwrap(), NOLABEL)?;
        self.backend.bitwise(&mut self.out, op, left, right);
        self.pool.free_register(right)?;
        Ok(Some(left))
    }

    fn generate_comparison(&mut self, node: &AstNode, op: CompareOp, label: u32) -> Result<Option<Reg>> {
        let left = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
        let right = self.generate_required(node.right.as_ref().unwrap(), NOLABEL)?;
        if label != NOLABEL {
            self.backend.compare_jump(&mut self.out, op, left, right, label);
            self.pool.free_register(right)?;
            self.pool.free_register(left)?;
            Ok(None)
        } else {
            self.backend.compare_set(&mut self.out, op, left, right);
            self.pool.free_register(right)?;
            Ok(Some(left))
        }
    }

    fn generate_assign(&mut self, node: &AstNode) -> Result<Option<Reg>> {
        let value = self.generate_required(node.left.as_ref().unwrap(), NOLABEL)?;
        let destination = node.right.as_ref().unwrap();
        match &destination.kind {
            AstKind::Identifier(id) => {
                let sym = self.symtab.get(*id).clone();
                match sym.storage {
                    StorageClass::Global => self.backend.store_global(&mut self.out, &sym.name, sym.ty, value),
                    StorageClass::Local => self.backend.store_local(&mut self.out, sym.stack_offset, sym.ty, value),
                }
            }
            AstKind::Dereference => {
                let addr = self.generate_required(destination.left.as_ref().unwrap(), NOLABEL)?;
                self.backend.store_through_pointer(&mut self.out, node.ty, addr, value);
                self.pool.free_register(addr)?;
            }
            other => {
                return Err(CompileError::internal(
                    0,
                    format!("assignment destination must be an identifier or dereference, found {other:?}"),
                ))
            }
        }
        Ok(Some(value))
    }

    /// IF lowering: allocate `Lfalse` (and `Lend` if there's an else
    /// branch), emit the condition jumping to `Lfalse`, reset, emit the
    /// then-branch, reset, jump to `Lend` if needed, emit `Lfalse:`, emit
    /// the else-branch and `Lend:` if present.
    fn generate_if(&mut self, node: &AstNode) -> Result<Option<Reg>> {
        let cond = node.left.as_ref().unwrap();
        let then_branch = node.middle.as_ref().unwrap();
        let else_branch = node.right.as_deref();

        let l_false = self.labels_alloc();
        let l_end = if else_branch.is_some() { Some(self.labels_alloc()) } else { None };

        self.generate(cond, l_false)?;
        self.pool.reset();

        self.generate(then_branch, NOLABEL)?;
        self.pool.reset();

        if let Some(l_end) = l_end {
            self.backend.jump(&mut self.out, l_end);
        }

        self.backend.label(&mut self.out, l_false);
        if let Some(else_branch) = else_branch {
            self.generate(else_branch, NOLABEL)?;
            self.pool.reset();
            self.backend.label(&mut self.out, l_end.unwrap());
        }
        Ok(None)
    }

    /// WHILE lowering: `Lstart:`, condition jumping to `Lend`, reset,
    /// body, reset, jump back to `Lstart`, `Lend:`.
    fn generate_while(&mut self, node: &AstNode) -> Result<Option<Reg>> {
        let cond = node.left.as_ref().unwrap();
        let body = node.right.as_ref().unwrap();

        let l_start = self.labels_alloc();
        let l_end = self.labels_alloc();

        self.backend.label(&mut self.out, l_start);
        self.generate(cond, l_end)?;
        self.pool.reset();

        self.generate(body, NOLABEL)?;
        self.pool.reset();

        self.backend.jump(&mut self.out, l_start);
        self.backend.label(&mut self.out, l_end);
        Ok(None)
    }

    fn generate_function(&mut self, id: crate::symtab::SymbolId, node: &AstNode) -> Result<Option<Reg>> {
        let sym = self.symtab.get(id).clone();
        let end_label = sym.end_label.unwrap_or(NOLABEL);
        let previous = self.current_function.replace(id);

        let frame_bytes = sym.frame_bytes;
        self.backend.function_preamble(&mut self.out, &sym.name, frame_bytes);
        self.pool.reset();
        self.generate(node.left.as_ref().unwrap(), NOLABEL)?;
        self.backend.function_postamble(&mut self.out, end_label, frame_bytes);

        self.current_function = previous;
        Ok(None)
    }

    fn generate_call(&mut self, id: crate::symtab::SymbolId, node: &AstNode) -> Result<Option<Reg>> {
        let sym = self.symtab.get(id).clone();
        let arg = match &node.left {
            Some(arg_node) => Some(self.generate_required(arg_node, NOLABEL)?),
            None => None,
        };
        let dest = self.pool.allocate()?;
        self.backend.call_function(&mut self.out, &sym.name, arg, dest);
        if let Some(arg) = arg {
            self.pool.free_register(arg)?;
        }
        Ok(Some(dest))
    }

    fn generate_return(&mut self, node: &AstNode) -> Result<Option<Reg>> {
        let id = self
            .current_function
            .ok_or_else(|| CompileError::internal(0, "return outside of a function"))?;
        let ret_ty = self.symtab.get(id).ty;
        let end_label = self.symtab.get(id).end_label.unwrap_or(NOLABEL);

        let value = match &node.left {
            Some(expr) => Some(self.generate_required(expr, NOLABEL)?),
            None => None,
        };
        self.backend.return_from_function(&mut self.out, value, end_label, ret_ty);
        Ok(None)
    }

    fn generate_step(&mut self, id: crate::symtab::SymbolId, delta: i64, post: bool) -> Result<Option<Reg>> {
        let sym = self.symtab.get(id).clone();
        let dest = self.pool.allocate()?;
        match sym.storage {
            StorageClass::Global => self.backend.step_global(&mut self.out, &sym.name, sym.ty, delta, post, dest),
            StorageClass::Local => {
                self.backend.step_local(&mut self.out, sym.stack_offset, sym.ty, delta, post, dest)
            }
        }
        Ok(Some(dest))
    }

    fn labels_alloc(&mut self) -> u32 {
        self.labels.alloc()
    }
}
