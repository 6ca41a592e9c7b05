//! Abstract syntax tree and its builders.
//!
//! The operator tag is a Rust enum whose variants carry exactly the payload
//! each operator needs (literal value, symbol index, scale amount) instead
//! of an untyped integer union.

use crate::symtab::SymbolId;
use crate::types::PrimitiveType;

/// The operator tag set, carrying its own payload where a C implementation
/// would reach for an untyped union field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstKind {
    IntegerLiteral(i64),
    /// Payload is the symbol index of the generated rodata label.
    StringLiteral(SymbolId),
    Identifier(SymbolId),

    Add,
    Subtract,
    Multiply,
    Divide,
    LShift,
    RShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    Invert,
    Negate,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    Assign,
    /// Widen a narrower integer register to the node's own (wider) type.
    Widen,
    /// Scale an integer index by the given byte size for pointer arithmetic.
    Scale(usize),
    AddressOf(SymbolId),
    Dereference,

    /// Sequences two statements; no operational meaning of its own.
    Glue,
    If,
    While,
    Function(SymbolId),
    FunctionCall(SymbolId),
    Return,

    PreIncrement(SymbolId),
    PreDecrement(SymbolId),
    PostIncrement(SymbolId),
    PostDecrement(SymbolId),
}

/// `{ op, primitiveType, isRvalue, left, middle, right, payload }`, with the
/// payload folded into `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub kind: AstKind,
    pub ty: PrimitiveType,
    pub is_rvalue: bool,
    pub left: Option<Box<AstNode>>,
    pub middle: Option<Box<AstNode>>,
    pub right: Option<Box<AstNode>>,
}

impl AstNode {
    pub fn make_node(
        kind: AstKind,
        ty: PrimitiveType,
        left: Option<AstNode>,
        middle: Option<AstNode>,
        right: Option<AstNode>,
    ) -> AstNode {
        AstNode {
            kind,
            ty,
            is_rvalue: false,
            left: left.map(Box::new),
            middle: middle.map(Box::new),
            right: right.map(Box::new),
        }
    }

    pub fn make_leaf(kind: AstKind, ty: PrimitiveType) -> AstNode {
        Self::make_node(kind, ty, None, None, None)
    }

    pub fn make_unary(kind: AstKind, ty: PrimitiveType, left: AstNode) -> AstNode {
        Self::make_node(kind, ty, Some(left), None, None)
    }

    pub fn make_binary(kind: AstKind, ty: PrimitiveType, left: AstNode, right: AstNode) -> AstNode {
        Self::make_node(kind, ty, Some(left), None, Some(right))
    }

    pub fn rvalue(mut self) -> AstNode {
        self.is_rvalue = true;
        self
    }

    pub fn lvalue(mut self) -> AstNode {
        self.is_rvalue = false;
        self
    }
}

/// Minimal in-crate AST pretty-printer backing the CLI's `--dump-ast` and
/// `--dump-ast-compacted` flags. This is intentionally thin: formatting
/// only, no analysis.
pub mod dump {
    use super::{AstKind, AstNode};
    use std::fmt::Write as _;

    /// Indented multi-line tree.
    pub fn dump_tree(node: &AstNode) -> String {
        let mut out = String::new();
        dump_indented(node, 0, &mut out);
        out
    }

    fn dump_indented(node: &AstNode, depth: usize, out: &mut String) {
        let _ = writeln!(out, "{}{:?} : {:?}", "  ".repeat(depth), node.kind, node.ty);
        for child in [&node.left, &node.middle, &node.right].into_iter().flatten() {
            dump_indented(child, depth + 1, out);
        }
    }

    /// Single-line S-expression form.
    pub fn dump_compact(node: &AstNode) -> String {
        let mut out = String::new();
        dump_sexpr(node, &mut out);
        out
    }

    fn dump_sexpr(node: &AstNode, out: &mut String) {
        let _ = write!(out, "({:?}", short_tag(&node.kind));
        for child in [&node.left, &node.middle, &node.right].into_iter().flatten() {
            out.push(' ');
            dump_sexpr(child, out);
        }
        out.push(')');
    }

    fn short_tag(kind: &AstKind) -> &'static str {
        match kind {
            AstKind::IntegerLiteral(_) => "int",
            AstKind::StringLiteral(_) => "str",
            AstKind::Identifier(_) => "id",
            AstKind::Add => "add",
            AstKind::Subtract => "sub",
            AstKind::Multiply => "mul",
            AstKind::Divide => "div",
            AstKind::LShift => "shl",
            AstKind::RShift => "shr",
            AstKind::BitwiseAnd => "band",
            AstKind::BitwiseOr => "bor",
            AstKind::BitwiseXor => "bxor",
            AstKind::LogicalAnd => "land",
            AstKind::LogicalOr => "lor",
            AstKind::LogicalNot => "lnot",
            AstKind::Invert => "inv",
            AstKind::Negate => "neg",
            AstKind::Eq => "eq",
            AstKind::Ne => "ne",
            AstKind::Lt => "lt",
            AstKind::Gt => "gt",
            AstKind::Le => "le",
            AstKind::Ge => "ge",
            AstKind::Assign => "assign",
            AstKind::Widen => "widen",
            AstKind::Scale(_) => "scale",
            AstKind::AddressOf(_) => "addrof",
            AstKind::Dereference => "deref",
            AstKind::Glue => "glue",
            AstKind::If => "if",
            AstKind::While => "while",
            AstKind::Function(_) => "fn",
            AstKind::FunctionCall(_) => "call",
            AstKind::Return => "return",
            AstKind::PreIncrement(_) => "preinc",
            AstKind::PreDecrement(_) => "predec",
            AstKind::PostIncrement(_) => "postinc",
            AstKind::PostDecrement(_) => "postdec",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_leaf_has_no_children() {
        let node = AstNode::make_leaf(AstKind::IntegerLiteral(5), PrimitiveType::Int);
        assert!(node.left.is_none());
        assert!(node.middle.is_none());
        assert!(node.right.is_none());
    }

    #[test]
    fn make_binary_owns_both_children() {
        let l = AstNode::make_leaf(AstKind::IntegerLiteral(1), PrimitiveType::Int);
        let r = AstNode::make_leaf(AstKind::IntegerLiteral(2), PrimitiveType::Int);
        let node = AstNode::make_binary(AstKind::Add, PrimitiveType::Int, l, r);
        assert!(node.left.is_some());
        assert!(node.right.is_some());
        assert!(node.middle.is_none());
    }

    #[test]
    fn dump_tree_is_indented_and_dump_compact_is_one_line() {
        let l = AstNode::make_leaf(AstKind::IntegerLiteral(1), PrimitiveType::Int);
        let r = AstNode::make_leaf(AstKind::IntegerLiteral(2), PrimitiveType::Int);
        let node = AstNode::make_binary(AstKind::Add, PrimitiveType::Int, l, r);
        assert!(dump::dump_tree(&node).contains('\n'));
        assert!(!dump::dump_compact(&node).contains('\n'));
        assert!(dump::dump_compact(&node).starts_with("(\"add\""));
    }
}
