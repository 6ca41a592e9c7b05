//! Primitive type system: predicates, sizes, pointer bijections, and the
//! operator-context coercion rules.

use crate::ast::{AstKind, AstNode};
use crate::diagnostics::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    None,
    Void,
    Char,
    Int,
    Long,
    VoidPtr,
    CharPtr,
    IntPtr,
    LongPtr,
}

impl PrimitiveType {
    pub fn is_integer(self) -> bool {
        matches!(self, PrimitiveType::Char | PrimitiveType::Int | PrimitiveType::Long)
    }

    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            PrimitiveType::VoidPtr | PrimitiveType::CharPtr | PrimitiveType::IntPtr | PrimitiveType::LongPtr
        )
    }

    /// Byte size. Pointers are always 8 bytes regardless of pointee.
    pub fn size_of(self) -> usize {
        match self {
            PrimitiveType::Char => 1,
            PrimitiveType::Int => 4,
            PrimitiveType::Long => 8,
            PrimitiveType::VoidPtr
            | PrimitiveType::CharPtr
            | PrimitiveType::IntPtr
            | PrimitiveType::LongPtr => 8,
            PrimitiveType::Void | PrimitiveType::None => 0,
        }
    }

    /// The byte size of the type this pointer points to. Internal error if
    /// called on a non-pointer.
    pub fn pointee_size(self) -> Result<usize> {
        Ok(match self {
            PrimitiveType::VoidPtr => 0,
            PrimitiveType::CharPtr => 1,
            PrimitiveType::IntPtr => 4,
            PrimitiveType::LongPtr => 8,
            _ => return Err(CompileError::internal(0, "pointee_size of a non-pointer type")),
        })
    }

    /// `primitiveToPointer`: bijection covering the four base types.
    pub fn to_pointer(self) -> Result<PrimitiveType> {
        Ok(match self {
            PrimitiveType::Void => PrimitiveType::VoidPtr,
            PrimitiveType::Char => PrimitiveType::CharPtr,
            PrimitiveType::Int => PrimitiveType::IntPtr,
            PrimitiveType::Long => PrimitiveType::LongPtr,
            _ => {
                return Err(CompileError::internal(
                    0,
                    "to_pointer applied to a type with no pointer form",
                ))
            }
        })
    }

    /// `pointerToPrimitive`: the inverse bijection.
    pub fn to_pointee(self) -> Result<PrimitiveType> {
        Ok(match self {
            PrimitiveType::VoidPtr => PrimitiveType::Void,
            PrimitiveType::CharPtr => PrimitiveType::Char,
            PrimitiveType::IntPtr => PrimitiveType::Int,
            PrimitiveType::LongPtr => PrimitiveType::Long,
            _ => {
                return Err(CompileError::internal(
                    0,
                    "to_pointee applied to a non-pointer type",
                ))
            }
        })
    }
}

/// The arithmetic context a coercion is being attempted under. Only `Add`
/// and `Subtract` enable pointer-arithmetic scaling; `Nothing` is used for
/// assignment/return checking, where the context type must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpContext {
    Add,
    Subtract,
    Nothing,
    Other,
}

/// `coerceForOp`. Returns the (possibly rewritten) node
/// on success, or `None` if `node`'s type is incompatible with
/// `context_type` under `op`.
pub fn coerce_for_op(node: AstNode, context_type: PrimitiveType, op: OpContext) -> Option<AstNode> {
    let node_type = node.ty;

    if node_type.is_integer() && context_type.is_integer() {
        if node_type == context_type {
            return Some(node);
        }
        if node_type.size_of() > context_type.size_of() {
            return None;
        }
        return Some(AstNode::make_unary(AstKind::Widen, context_type, node));
    }

    if node_type.is_pointer() && node_type == context_type && op == OpContext::Nothing {
        return Some(node);
    }

    if matches!(op, OpContext::Add | OpContext::Subtract)
        && node_type.is_integer()
        && context_type.is_pointer()
    {
        let pointee = context_type.pointee_size().ok()?;
        if pointee > 1 {
            return Some(AstNode::make_unary(AstKind::Scale(pointee), context_type, node));
        }
        return Some(node);
    }

    None
}

/// Binary-expression type reconciliation: try coercing each side to match
/// the other, accepting if at least one direction succeeds. Returns the
/// rewritten `(left, right)` pair and the resulting type.
pub fn reconcile_binary(
    left: AstNode,
    right: AstNode,
    op: OpContext,
    line: usize,
) -> Result<(AstNode, AstNode, PrimitiveType)> {
    let left_ty = left.ty;
    let right_ty = right.ty;

    if let Some(new_right) = coerce_for_op(right.clone(), left_ty, op) {
        return Ok((left, new_right, left_ty));
    }
    if let Some(new_left) = coerce_for_op(left, right_ty, op) {
        return Ok((new_left, right, right_ty));
    }
    Err(CompileError::semantic(
        line,
        format!("incompatible types {left_ty:?} and {right_ty:?} in binary expression"),
    ))
}

/// Assignment coercion: asymmetric, right-hand side must match the
/// left-hand side's type exactly (after any permitted widening).
pub fn coerce_assign(value: AstNode, target_type: PrimitiveType, line: usize) -> Result<AstNode> {
    let value_ty = value.ty;
    coerce_for_op(value, target_type, OpContext::Nothing).ok_or_else(|| {
        CompileError::semantic(
            line,
            format!("cannot assign value of type {value_ty:?} to {target_type:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;

    fn leaf(ty: PrimitiveType) -> AstNode {
        AstNode::make_leaf(AstKind::IntegerLiteral(1), ty)
    }

    #[test]
    fn widening_is_monotone_non_narrowing() {
        let widened = coerce_for_op(leaf(PrimitiveType::Char), PrimitiveType::Int, OpContext::Other);
        assert!(matches!(widened.unwrap().kind, AstKind::Widen));

        let unchanged = coerce_for_op(leaf(PrimitiveType::Int), PrimitiveType::Int, OpContext::Other);
        assert!(matches!(unchanged.unwrap().kind, AstKind::IntegerLiteral(_)));

        let narrowed = coerce_for_op(leaf(PrimitiveType::Long), PrimitiveType::Char, OpContext::Other);
        assert!(narrowed.is_none());
    }

    #[test]
    fn pointer_arithmetic_scales_when_pointee_is_wider_than_a_byte() {
        let idx = leaf(PrimitiveType::Int);
        let scaled = coerce_for_op(idx, PrimitiveType::LongPtr, OpContext::Add).unwrap();
        match scaled.kind {
            AstKind::Scale(8) => {}
            other => panic!("expected Scale(8), got {other:?}"),
        }
    }

    #[test]
    fn pointer_arithmetic_passes_through_for_byte_sized_pointee() {
        let idx = leaf(PrimitiveType::Int);
        let result = coerce_for_op(idx, PrimitiveType::CharPtr, OpContext::Add).unwrap();
        assert!(matches!(result.kind, AstKind::IntegerLiteral(_)));
    }

    #[test]
    fn reconcile_binary_succeeds_if_either_side_coerces() {
        let (l, r, ty) =
            reconcile_binary(leaf(PrimitiveType::Char), leaf(PrimitiveType::Int), OpContext::Other, 1)
                .unwrap();
        assert_eq!(ty, PrimitiveType::Int);
        assert!(matches!(l.kind, AstKind::Widen));
        assert!(matches!(r.kind, AstKind::IntegerLiteral(_)));
    }

    #[test]
    fn reconcile_binary_fails_when_both_directions_fail() {
        let err = reconcile_binary(leaf(PrimitiveType::IntPtr), leaf(PrimitiveType::CharPtr), OpContext::Other, 7)
            .unwrap_err();
        assert_eq!(err.line, 7);
    }

    #[test]
    fn pointer_to_pointee_bijection_round_trips() {
        for base in [PrimitiveType::Void, PrimitiveType::Char, PrimitiveType::Int, PrimitiveType::Long] {
            let ptr = base.to_pointer().unwrap();
            assert_eq!(ptr.to_pointee().unwrap(), base);
        }
    }
}
