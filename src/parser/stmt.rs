//! Statement and declaration parser.

use super::Parser;
use crate::ast::{AstKind, AstNode};
use crate::diagnostics::{CompileError, Result};
use crate::symtab::{StorageClass, StructuralType, Symbol};
use crate::token::TokenKind;
use crate::types::{self, PrimitiveType};

impl Parser {
    /// Loops over top-level declarations until EOF.
    pub(super) fn global_declarations(&mut self) -> Result<()> {
        while self.kind() != TokenKind::Eof {
            let (base_ty, line) = self.parse_base_type()?;
            let ptr_ty = self.parse_pointer_suffix(base_ty, line)?;
            let name = self.expect_identifier(line)?;

            if self.kind() == TokenKind::LParen {
                self.parse_function(&name, ptr_ty)?;
            } else {
                self.parse_global_var_list(&name, ptr_ty, line)?;
            }
        }
        Ok(())
    }

    /// Parses the base keyword of a type (`void|char|int|long`).
    fn parse_base_type(&mut self) -> Result<(PrimitiveType, usize)> {
        let line = self.line();
        let ty = match self.kind() {
            TokenKind::Void => PrimitiveType::Void,
            TokenKind::Char => PrimitiveType::Char,
            TokenKind::Int => PrimitiveType::Int,
            TokenKind::Long => PrimitiveType::Long,
            other => return Err(CompileError::syntactic(line, format!("expected a type, found {other:?}"))),
        };
        self.advance()?;
        Ok((ty, line))
    }

    /// Consumes zero or one trailing `*`. This language supports exactly
    /// one level of pointer; a second `*` is a semantic error rather than a
    /// silent internal one.
    fn parse_pointer_suffix(&mut self, base: PrimitiveType, line: usize) -> Result<PrimitiveType> {
        if self.kind() != TokenKind::Star {
            return Ok(base);
        }
        self.advance()?;
        let ptr = base
            .to_pointer()
            .map_err(|_| CompileError::semantic(line, format!("{base:?} has no pointer form")))?;
        if self.kind() == TokenKind::Star {
            return Err(CompileError::semantic(line, "pointer-to-pointer types are not supported"));
        }
        Ok(ptr)
    }

    fn expect_identifier(&mut self, line: usize) -> Result<String> {
        if self.kind() != TokenKind::Identifier {
            return Err(CompileError::syntactic(line, "expected an identifier"));
        }
        let name = self.ident_text();
        self.advance()?;
        Ok(name)
    }

    fn parse_global_var_list(&mut self, first_name: &str, ty: PrimitiveType, line: usize) -> Result<()> {
        let mut name = first_name.to_string();
        loop {
            if self.kind() == TokenKind::LBracket {
                self.advance()?;
                let size_tok = self.expect(TokenKind::IntegerLit, "an array size")?;
                let size = size_tok.int_value as usize;
                self.expect(TokenKind::RBracket, "']'")?;
                self.symtab.add_global(Symbol {
                    name: name.clone(),
                    ty,
                    structural: StructuralType::Array,
                    storage: StorageClass::Global,
                    end_label: None,
                    size,
                    stack_offset: 0,
                    frame_bytes: 0,
                })?;
            } else {
                self.symtab.add_global(Symbol {
                    name: name.clone(),
                    ty,
                    structural: StructuralType::Variable,
                    storage: StorageClass::Global,
                    end_label: None,
                    size: 1,
                    stack_offset: 0,
                    frame_bytes: 0,
                })?;
            }

            if self.matches(TokenKind::Comma)? {
                name = self.expect_identifier(line)?;
                continue;
            }
            break;
        }
        self.expect(TokenKind::Semi, "';'")?;
        Ok(())
    }

    fn parse_function(&mut self, name: &str, ret_ty: PrimitiveType) -> Result<()> {
        let end_label = self.labels.alloc();
        let id = self.symtab.add_global(Symbol {
            name: name.to_string(),
            ty: ret_ty,
            structural: StructuralType::Function,
            storage: StorageClass::Global,
            end_label: Some(end_label),
            size: 0,
            stack_offset: 0,
            frame_bytes: 0,
        })?;

        self.expect(TokenKind::LParen, "'('")?;
        self.expect(TokenKind::RParen, "')'")?;

        let previous_function = self.current_function.replace(id);
        self.symtab.begin_function_scope();
        let previous_frame_offset = std::mem::replace(&mut self.current_frame_offset, 0);
        let body = self.compound_statement()?;
        self.current_function = previous_function;
        self.symtab.get_mut(id).frame_bytes = align_up(self.current_frame_offset as usize, 16);
        self.current_frame_offset = previous_frame_offset;

        let func = AstNode::make_unary(AstKind::Function(id), ret_ty, body);
        self.functions.push(func);
        Ok(())
    }

    /// Reserves `count * ty.size_of()` bytes of frame space for a local
    /// declaration and returns its frame-pointer-relative offset (negative,
    /// growing downward as more locals are added).
    fn allocate_local_slot(&mut self, ty: PrimitiveType, count: usize) -> i64 {
        let bytes = ty.size_of() * count.max(1);
        self.current_frame_offset += bytes as i64;
        -self.current_frame_offset
    }

    /// Glues successive statements into a left-leaning chain with `GLUE`.
    pub(super) fn compound_statement(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut chain: Option<AstNode> = None;
        while self.kind() != TokenKind::RBrace {
            let stmt = self.single_statement()?;
            chain = Some(match chain {
                None => stmt,
                Some(prior) => AstNode::make_binary(AstKind::Glue, PrimitiveType::None, prior, stmt),
            });
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(chain.unwrap_or_else(|| AstNode::make_leaf(AstKind::Glue, PrimitiveType::None)))
    }

    /// Dispatches on the current token's statement kind.
    fn single_statement(&mut self) -> Result<AstNode> {
        match self.kind() {
            TokenKind::Void | TokenKind::Char | TokenKind::Int | TokenKind::Long => {
                self.local_declaration()
            }
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Return => self.return_statement(),
            _ => {
                let expr = self.parse_expression()?;
                // Only assignment/return/call statements require a trailing
                // semicolon; other expression statements end wherever their
                // precedence naturally stops (not full C semantics).
                if requires_semicolon(&expr.kind) {
                    self.expect(TokenKind::Semi, "';' after statement")?;
                }
                Ok(expr)
            }
        }
    }

    fn local_declaration(&mut self) -> Result<AstNode> {
        let (base_ty, line) = self.parse_base_type()?;
        let ty = self.parse_pointer_suffix(base_ty, line)?;
        let name = self.expect_identifier(line)?;

        if self.kind() == TokenKind::LBracket {
            self.advance()?;
            let size_tok = self.expect(TokenKind::IntegerLit, "an array size")?;
            let size = size_tok.int_value as usize;
            self.expect(TokenKind::RBracket, "']'")?;
            let stack_offset = self.allocate_local_slot(ty, size);
            self.symtab.add_local(Symbol {
                name,
                ty,
                structural: StructuralType::Array,
                storage: StorageClass::Local,
                end_label: None,
                size,
                stack_offset,
                frame_bytes: 0,
            })?;
        } else {
            let stack_offset = self.allocate_local_slot(ty, 1);
            self.symtab.add_local(Symbol {
                name,
                ty,
                structural: StructuralType::Variable,
                storage: StorageClass::Local,
                end_label: None,
                size: 1,
                stack_offset,
                frame_bytes: 0,
            })?;
        }
        self.expect(TokenKind::Semi, "';'")?;
        // A bare declaration contributes no executable statement; the
        // caller's GLUE chain treats an empty marker as a no-op.
        Ok(AstNode::make_leaf(AstKind::Glue, PrimitiveType::None))
    }

    /// Wraps a condition in a to-boolean comparison-to-jump if it isn't
    /// already a comparison.
    fn boolean_condition(&mut self, cond: AstNode, line: usize) -> Result<AstNode> {
        if is_comparison(&cond.kind) {
            return Ok(cond);
        }
        let cond = cond.rvalue();
        let zero = AstNode::make_leaf(AstKind::IntegerLiteral(0), cond.ty);
        let (cond, zero, _) = types::reconcile_binary(cond, zero, types::OpContext::Other, line)?;
        Ok(AstNode::make_binary(AstKind::Ne, PrimitiveType::Int, cond, zero))
    }

    fn if_statement(&mut self) -> Result<AstNode> {
        let line = self.line();
        self.advance()?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expression()?;
        let cond = self.boolean_condition(cond, line)?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_branch = self.compound_statement()?;

        let else_branch = if self.matches(TokenKind::Else)? {
            Some(self.compound_statement()?)
        } else {
            None
        };

        Ok(AstNode::make_node(AstKind::If, PrimitiveType::None, Some(cond), Some(then_branch), else_branch))
    }

    fn while_statement(&mut self) -> Result<AstNode> {
        let line = self.line();
        self.advance()?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expression()?;
        let cond = self.boolean_condition(cond, line)?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.compound_statement()?;
        Ok(AstNode::make_binary(AstKind::While, PrimitiveType::None, cond, body))
    }

    /// `for` is desugared to `GLUE(pre, WHILE(cond, GLUE(body, post)))`.
    fn for_statement(&mut self) -> Result<AstNode> {
        let line = self.line();
        self.advance()?;
        self.expect(TokenKind::LParen, "'('")?;
        let pre = self.parse_expression()?;
        self.expect(TokenKind::Semi, "';'")?;
        let cond = self.parse_expression()?;
        let cond = self.boolean_condition(cond, line)?;
        self.expect(TokenKind::Semi, "';'")?;
        let post = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.compound_statement()?;

        let body_then_post = AstNode::make_binary(AstKind::Glue, PrimitiveType::None, body, post);
        let loop_node = AstNode::make_binary(AstKind::While, PrimitiveType::None, cond, body_then_post);
        Ok(AstNode::make_binary(AstKind::Glue, PrimitiveType::None, pre, loop_node))
    }

    fn return_statement(&mut self) -> Result<AstNode> {
        let line = self.line();
        self.advance()?;
        let func_id = self
            .current_function
            .ok_or_else(|| CompileError::semantic(line, "return outside of a function"))?;
        let ret_ty = self.symtab.get(func_id).ty;

        if ret_ty == PrimitiveType::Void {
            return Err(CompileError::semantic(line, "return is not allowed in a void function"));
        }

        self.expect(TokenKind::LParen, "'('")?;
        let expr = self.parse_expression()?.rvalue();
        let expr = types::coerce_assign(expr, ret_ty, line)?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Semi, "';'")?;

        Ok(AstNode::make_unary(AstKind::Return, ret_ty, expr))
    }
}

/// Rounds `n` up to the next multiple of `align` (a power of two).
fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

fn requires_semicolon(kind: &AstKind) -> bool {
    matches!(kind, AstKind::Assign | AstKind::Return | AstKind::FunctionCall(_))
}

fn is_comparison(kind: &AstKind) -> bool {
    matches!(
        kind,
        AstKind::Eq | AstKind::Ne | AstKind::Lt | AstKind::Gt | AstKind::Le | AstKind::Ge
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CharSource;
    use crate::scanner::Scanner;

    fn parse(src: &str) -> super::Program {
        let parser = Parser::new(Scanner::new(CharSource::from_string(src.to_string()))).unwrap();
        parser.parse_program().unwrap()
    }

    /// Depth-first search for the first node whose kind matches `pred`.
    fn find<'a>(node: &'a AstNode, pred: &dyn Fn(&AstKind) -> bool) -> Option<&'a AstNode> {
        if pred(&node.kind) {
            return Some(node);
        }
        for child in [&node.left, &node.middle, &node.right].into_iter().flatten() {
            if let Some(hit) = find(child, pred) {
                return Some(hit);
            }
        }
        None
    }

    #[test]
    fn parses_a_function_with_return() {
        let program = parse("int main() { return(3 + 4 * 2); }");
        assert_eq!(program.functions.len(), 1);
        assert!(program.symtab.lookup("main").is_some());
    }

    #[test]
    fn global_scalar_and_array_declarations_register_symbols() {
        let program = parse("int a; int b[5]; int main() { return(0); }");
        let a = program.symtab.get(program.symtab.lookup("a").unwrap());
        assert_eq!(a.structural, StructuralType::Variable);
        let b = program.symtab.get(program.symtab.lookup("b").unwrap());
        assert_eq!(b.structural, StructuralType::Array);
        assert_eq!(b.size, 5);
    }

    #[test]
    fn for_loop_desugars_to_contain_a_while_node() {
        let program = parse(
            "int main() { int i; for (i = 0; i < 5; i = i + 1) { i = i; } return(0); }",
        );
        let body = program.functions[0].left.as_ref().unwrap();
        assert!(find(body, &|k| matches!(k, AstKind::While)).is_some());
    }

    #[test]
    fn return_in_void_function_is_a_semantic_error() {
        let parser = Parser::new(Scanner::new(CharSource::from_string(
            "void main() { return(1); }".to_string(),
        )))
        .unwrap();
        let err = parser.parse_program().unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Semantic);
    }

    #[test]
    fn non_comparison_condition_is_wrapped_to_boolean() {
        let program = parse("int x; void main() { if (x) { x = 1; } }");
        let body = program.functions[0].left.as_ref().unwrap();
        let if_node = find(body, &|k| matches!(k, AstKind::If)).expect("an If node");
        assert!(matches!(if_node.left.as_ref().unwrap().kind, AstKind::Ne));
    }
}
