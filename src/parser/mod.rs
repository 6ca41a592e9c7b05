//! Recursive-descent parser: token-stream plumbing shared by the
//! expression parser ([`expr`]) and the statement/declaration parser
//! ([`stmt`]).
//!
//! Contract for every parsing rule: the first token of the rule's
//! production is already the "current" token on entry; after the rule
//! returns, the token following its production is current.

mod expr;
mod stmt;

use crate::ast::AstNode;
use crate::diagnostics::{CompileError, Result};
use crate::scanner::Scanner;
use crate::symtab::{StorageClass, StructuralType, Symbol, SymbolId, SymbolTable};
use crate::token::{Token, TokenKind};
use crate::types::PrimitiveType;

/// Monotonically increasing label counter. `NOLABEL` is the sentinel
/// passed where no jump target is meaningful.
pub const NOLABEL: u32 = 0;

#[derive(Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn new() -> Self {
        LabelAllocator { next: 1 }
    }

    pub fn alloc(&mut self) -> u32 {
        let l = self.next;
        self.next += 1;
        l
    }
}

/// A fully parsed program: the symbol table (globals and function
/// metadata), one `Function`-kinded AST per function body, and the
/// collected string-literal rodata entries (label, content).
pub struct Program {
    pub symtab: SymbolTable,
    pub functions: Vec<AstNode>,
    pub strings: Vec<(u32, String)>,
    pub labels: LabelAllocator,
}

/// Runtime functions every emitted program may call without a source-level
/// declaration: `printint(long)`, `printchar(long)`, `printstring(char*)`.
/// They're external and never get a generated body, so they're seeded here
/// as bodiless `Function` symbols rather than discovered via a declaration.
const BUILTIN_FUNCTIONS: &[(&str, PrimitiveType)] = &[
    ("printint", PrimitiveType::Void),
    ("printchar", PrimitiveType::Void),
    ("printstring", PrimitiveType::Void),
];

pub struct Parser {
    scanner: Scanner,
    current: Token,
    symtab: SymbolTable,
    labels: LabelAllocator,
    current_function: Option<SymbolId>,
    functions: Vec<AstNode>,
    strings: Vec<(u32, String)>,
    /// Running count of local-variable bytes allocated in the function
    /// currently being parsed; reset at each function's entry.
    current_frame_offset: i64,
}

impl Parser {
    pub fn new(mut scanner: Scanner) -> Result<Self> {
        let current = scanner.scan()?;
        let mut symtab = SymbolTable::new();
        for (name, ty) in BUILTIN_FUNCTIONS {
            symtab.add_global(Symbol {
                name: name.to_string(),
                ty: *ty,
                structural: StructuralType::Function,
                storage: StorageClass::Global,
                end_label: None,
                size: 0,
                stack_offset: 0,
                frame_bytes: 0,
            })?;
        }
        Ok(Parser {
            scanner,
            current,
            symtab,
            labels: LabelAllocator::new(),
            current_function: None,
            functions: Vec::new(),
            strings: Vec::new(),
            current_frame_offset: 0,
        })
    }

    pub fn parse_program(mut self) -> Result<Program> {
        self.global_declarations()?;
        Ok(Program {
            symtab: self.symtab,
            functions: self.functions,
            strings: self.strings,
            labels: self.labels,
        })
    }

    fn line(&self) -> usize {
        self.scanner.line()
    }

    fn kind(&self) -> TokenKind {
        self.current.kind
    }

    /// Advances past the current token, scanning the next one.
    fn advance(&mut self) -> Result<Token> {
        let tok = std::mem::replace(&mut self.current, self.scanner.scan()?);
        Ok(tok)
    }

    /// Asserts the current token has `kind`, then advances.
    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.kind() != kind {
            return Err(CompileError::syntactic(
                self.line(),
                format!("expected {what}, found {:?}", self.kind()),
            ));
        }
        self.advance()
    }

    fn matches(&mut self, kind: TokenKind) -> Result<bool> {
        if self.kind() == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The shared identifier text buffer, valid for the token just scanned.
    fn ident_text(&self) -> String {
        self.scanner.text().to_string()
    }
}
