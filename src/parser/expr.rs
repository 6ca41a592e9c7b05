//! Pratt / precedence-climbing expression parser.

use super::Parser;
use crate::ast::{AstKind, AstNode};
use crate::diagnostics::{CompileError, Result};
use crate::symtab::{StorageClass, StructuralType, Symbol};
use crate::token::{precedence, is_right_associative, TokenKind};
use crate::types::{self, OpContext, PrimitiveType};

impl Parser {
    /// Entry point: parse a full expression (`binexpr(0)`).
    pub(super) fn parse_expression(&mut self) -> Result<AstNode> {
        self.binexpr(0)
    }

    /// Precedence climbing: parse a prefix expression, then fold in
    /// operators whose precedence clears `min_prec`.
    fn binexpr(&mut self, min_prec: u8) -> Result<AstNode> {
        let mut left = self.prefix_expression()?;

        if is_terminator(self.kind()) {
            return Ok(left.rvalue());
        }

        while precedence(self.kind()) > min_prec
            || (is_right_associative(self.kind()) && precedence(self.kind()) == min_prec)
        {
            let op_tok = self.kind();
            let op_line = self.line();
            self.advance()?;

            let right = self.binexpr(precedence(op_tok))?;

            left = self.combine(left, op_tok, right, op_line)?;

            if is_terminator(self.kind()) {
                break;
            }
        }

        Ok(left)
    }

    fn combine(&mut self, left: AstNode, op: TokenKind, right: AstNode, line: usize) -> Result<AstNode> {
        if op == TokenKind::Assign {
            let target_type = left.ty;
            let value = right.rvalue();
            let value = types::coerce_assign(value, target_type, line)?;
            // Post-order already swapped: value (producer) becomes the new
            // left child so it's emitted before the destination is stored.
            let mut node = AstNode::make_binary(AstKind::Assign, target_type, value, left);
            node.right.as_mut().unwrap().is_rvalue = false;
            return Ok(node);
        }

        let left = left.rvalue();
        let right = right.rvalue();
        let ctx = op_context(op);
        let (left, right, result_ty) = types::reconcile_binary(left, right, ctx, line)?;
        Ok(AstNode::make_binary(ast_kind_for(op), result_ty, left, right))
    }

    /// Prefix operators: address-of, dereference, unary minus, invert,
    /// logical-not, pre-increment/decrement.
    fn prefix_expression(&mut self) -> Result<AstNode> {
        match self.kind() {
            TokenKind::Amper => {
                let line = self.line();
                self.advance()?;
                let operand = self.prefix_expression()?;
                match operand.kind {
                    AstKind::Identifier(id) => {
                        let ty = self.symtab.get(id).ty.to_pointer().map_err(|mut e| {
                            e.line = line;
                            e
                        })?;
                        Ok(AstNode::make_leaf(AstKind::AddressOf(id), ty))
                    }
                    _ => Err(CompileError::semantic(
                        line,
                        "address-of requires an identifier operand",
                    )),
                }
            }
            TokenKind::Star => {
                let line = self.line();
                self.advance()?;
                let operand = self.prefix_expression()?;
                match &operand.kind {
                    AstKind::Identifier(_) | AstKind::Dereference => {
                        let pointee = operand.ty.to_pointee().map_err(|mut e| {
                            e.line = line;
                            e
                        })?;
                        Ok(AstNode::make_unary(AstKind::Dereference, pointee, operand.rvalue()))
                    }
                    _ => Err(CompileError::semantic(
                        line,
                        "dereference requires an identifier or another dereference",
                    )),
                }
            }
            TokenKind::Minus => {
                self.advance()?;
                let operand = self.prefix_expression()?.rvalue();
                let ty = if operand.ty == PrimitiveType::Char {
                    PrimitiveType::Int
                } else {
                    operand.ty
                };
                let operand = if ty != operand.ty {
                    AstNode::make_unary(AstKind::Widen, ty, operand)
                } else {
                    operand
                };
                Ok(AstNode::make_unary(AstKind::Negate, ty, operand))
            }
            TokenKind::Invert => {
                self.advance()?;
                let operand = self.prefix_expression()?.rvalue();
                let ty = operand.ty;
                Ok(AstNode::make_unary(AstKind::Invert, ty, operand))
            }
            TokenKind::Not => {
                self.advance()?;
                let operand = self.prefix_expression()?.rvalue();
                let ty = operand.ty;
                Ok(AstNode::make_unary(AstKind::LogicalNot, ty, operand))
            }
            TokenKind::Inc => {
                let line = self.line();
                self.advance()?;
                let (id, ty) = self.expect_identifier_operand(line)?;
                Ok(AstNode::make_leaf(AstKind::PreIncrement(id), ty))
            }
            TokenKind::Dec => {
                let line = self.line();
                self.advance()?;
                let (id, ty) = self.expect_identifier_operand(line)?;
                Ok(AstNode::make_leaf(AstKind::PreDecrement(id), ty))
            }
            _ => self.primary_expression(),
        }
    }

    fn expect_identifier_operand(&mut self, line: usize) -> Result<(crate::symtab::SymbolId, PrimitiveType)> {
        let operand = self.prefix_expression()?;
        match operand.kind {
            AstKind::Identifier(id) => Ok((id, operand.ty)),
            _ => Err(CompileError::syntactic(
                line,
                "++/-- must precede an identifier",
            )),
        }
    }

    /// Primary expressions: literals, parenthesized subexpressions, and
    /// identifiers (delegated to postfix handling).
    fn primary_expression(&mut self) -> Result<AstNode> {
        let line = self.line();
        match self.kind() {
            TokenKind::IntegerLit => {
                let value = self.current.int_value;
                self.advance()?;
                let ty = if (0..=255).contains(&value) {
                    PrimitiveType::Char
                } else {
                    PrimitiveType::Int
                };
                Ok(AstNode::make_leaf(AstKind::IntegerLiteral(value), ty))
            }
            TokenKind::StringLit => {
                let text = self.ident_text();
                self.advance()?;
                let label = self.labels.alloc();
                self.strings.push((label, text));
                Ok(AstNode::make_leaf(AstKind::StringLiteral(label), PrimitiveType::CharPtr))
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.binexpr(0)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Identifier => self.postfix_expression(),
            TokenKind::Void | TokenKind::Char | TokenKind::Int | TokenKind::Long => Err(
                CompileError::syntactic(line, "unexpected type keyword inside an expression"),
            ),
            other => Err(CompileError::syntactic(line, format!("unexpected token {other:?}"))),
        }
    }

    /// Postfix handling following an identifier: call, subscript,
    /// post-increment/decrement, or a plain identifier leaf.
    fn postfix_expression(&mut self) -> Result<AstNode> {
        let line = self.line();
        let name = self.ident_text();
        self.advance()?;

        if self.kind() == TokenKind::LParen {
            return self.function_call(&name, line);
        }

        let id = self
            .symtab
            .lookup(&name)
            .ok_or_else(|| CompileError::semantic(line, format!("undeclared identifier '{name}'")))?;
        let symbol = self.symtab.get(id);
        let ty = symbol.ty;
        let structural = symbol.structural;

        if self.kind() == TokenKind::LBracket {
            return self.array_index(id, ty, structural, line);
        }

        match self.kind() {
            TokenKind::Inc => {
                self.advance()?;
                Ok(AstNode::make_leaf(AstKind::PostIncrement(id), ty))
            }
            TokenKind::Dec => {
                self.advance()?;
                Ok(AstNode::make_leaf(AstKind::PostDecrement(id), ty))
            }
            _ => Ok(AstNode::make_leaf(AstKind::Identifier(id), ty)),
        }
    }

    fn function_call(&mut self, name: &str, line: usize) -> Result<AstNode> {
        let id = self
            .symtab
            .lookup(name)
            .ok_or_else(|| CompileError::semantic(line, format!("undeclared function '{name}'")))?;
        let symbol = self.symtab.get(id);
        if symbol.structural != StructuralType::Function {
            return Err(CompileError::semantic(line, format!("'{name}' is not a function")));
        }
        let ret_ty = symbol.ty;

        self.expect(TokenKind::LParen, "'('")?;
        let arg = if self.kind() != TokenKind::RParen {
            Some(self.binexpr(0)?.rvalue())
        } else {
            None
        };
        self.expect(TokenKind::RParen, "')'")?;

        Ok(AstNode::make_node(AstKind::FunctionCall(id), ret_ty, arg, None, None))
    }

    fn array_index(
        &mut self,
        id: crate::symtab::SymbolId,
        base_ty: PrimitiveType,
        structural: StructuralType,
        line: usize,
    ) -> Result<AstNode> {
        if structural != StructuralType::Array {
            return Err(CompileError::semantic(line, "subscript applied to a non-array"));
        }
        self.advance()?; // consume '['
        let index = self.binexpr(0)?.rvalue();
        if !index.ty.is_integer() {
            return Err(CompileError::semantic(line, "array index must have integer type"));
        }
        self.expect(TokenKind::RBracket, "']'")?;

        let ptr_ty = base_ty.to_pointer().map_err(|mut e| {
            e.line = line;
            e
        })?;
        let scaled_index = types::coerce_for_op(index, ptr_ty, OpContext::Add).ok_or_else(|| {
            CompileError::internal(line, "failed to scale array index")
        })?;
        let base = AstNode::make_leaf(AstKind::AddressOf(id), ptr_ty).rvalue();
        let addr = AstNode::make_binary(AstKind::Add, ptr_ty, base, scaled_index);
        Ok(AstNode::make_unary(AstKind::Dereference, base_ty, addr))
    }
}

fn is_terminator(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Semi | TokenKind::RParen | TokenKind::RBracket | TokenKind::Eof)
}

fn op_context(op: TokenKind) -> OpContext {
    match op {
        TokenKind::Plus => OpContext::Add,
        TokenKind::Minus => OpContext::Subtract,
        _ => OpContext::Other,
    }
}

fn ast_kind_for(op: TokenKind) -> AstKind {
    use TokenKind::*;
    match op {
        Plus => AstKind::Add,
        Minus => AstKind::Subtract,
        Star => AstKind::Multiply,
        Slash => AstKind::Divide,
        Shl => AstKind::LShift,
        Shr => AstKind::RShift,
        Amper => AstKind::BitwiseAnd,
        Or => AstKind::BitwiseOr,
        Xor => AstKind::BitwiseXor,
        LogAnd => AstKind::LogicalAnd,
        LogOr => AstKind::LogicalOr,
        Eq => AstKind::Eq,
        Ne => AstKind::Ne,
        Lt => AstKind::Lt,
        Gt => AstKind::Gt,
        Le => AstKind::Le,
        Ge => AstKind::Ge,
        other => unreachable!("{other:?} is not a binary operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CharSource;
    use crate::scanner::Scanner;
    use crate::symtab::{StorageClass, StructuralType, Symbol};

    fn parser_for(src: &str) -> Parser {
        Parser::new(Scanner::new(CharSource::from_string(src.to_string()))).unwrap()
    }

    #[test]
    fn precedence_law_binds_higher_precedence_tighter() {
        // 2 + 3 * 4 should parse as 2 + (3 * 4)
        let mut p = parser_for("2 + 3 * 4;");
        let node = p.parse_expression().unwrap();
        assert!(matches!(node.kind, AstKind::Add));
        assert!(matches!(node.right.as_ref().unwrap().kind, AstKind::Multiply));
    }

    #[test]
    fn equal_precedence_left_associative_ops_nest_left() {
        // 8 - 3 - 2 should parse as (8 - 3) - 2
        let mut p = parser_for("8 - 3 - 2;");
        let node = p.parse_expression().unwrap();
        assert!(matches!(node.kind, AstKind::Subtract));
        assert!(matches!(node.left.as_ref().unwrap().kind, AstKind::Subtract));
    }

    #[test]
    fn assignment_is_right_associative_and_swaps_children() {
        let mut p = parser_for("a = b = 5;");
        p.symtab
            .add_global(Symbol {
                name: "a".into(),
                ty: PrimitiveType::Int,
                structural: StructuralType::Variable,
                storage: StorageClass::Global,
                end_label: None,
                size: 1,
                stack_offset: 0,
                frame_bytes: 0,
            })
            .unwrap();
        p.symtab
            .add_global(Symbol {
                name: "b".into(),
                ty: PrimitiveType::Int,
                structural: StructuralType::Variable,
                storage: StorageClass::Global,
                end_label: None,
                size: 1,
                stack_offset: 0,
                frame_bytes: 0,
            })
            .unwrap();
        let node = p.parse_expression().unwrap();
        assert!(matches!(node.kind, AstKind::Assign));
        // Left child is the value-producing subtree (b = 5), right is the
        // destination (a), so post-order emits the value first.
        assert!(matches!(node.left.as_ref().unwrap().kind, AstKind::Assign));
        assert!(matches!(node.right.as_ref().unwrap().kind, AstKind::Identifier(_)));
    }

    #[test]
    fn integer_literal_classified_as_char_when_in_byte_range() {
        let mut p = parser_for("65;");
        let node = p.parse_expression().unwrap();
        assert_eq!(node.ty, PrimitiveType::Char);

        let mut p = parser_for("65536;");
        let node = p.parse_expression().unwrap();
        assert_eq!(node.ty, PrimitiveType::Int);
    }

    #[test]
    fn address_of_non_identifier_is_a_semantic_error() {
        let mut p = parser_for("&5;");
        let err = p.parse_expression().unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Semantic);
    }
}
