//! Ahead-of-time compiler for a small C-like subset, emitting NASM x86-64
//! or AArch64 assembly text.
//!
//! Pipeline: [`scanner`] tokenizes, [`parser`] builds an owned [`ast::AstNode`]
//! tree per function plus a [`symtab::SymbolTable`], and [`codegen`] walks
//! the tree once, driving a [`codegen::backend::Backend`] implementation to
//! produce the final assembly text. [`diagnostics::CompileError`] is the one
//! error type threaded through every stage.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod parser;
pub mod scanner;
pub mod symtab;
pub mod token;
pub mod types;

pub use ast::AstNode;
pub use codegen::backend::Backend;
pub use codegen::CodeGen;
pub use config::{CompilerConfig, Target};
pub use diagnostics::{CompileError, Result};
pub use parser::{Parser, Program};

use codegen::aarch64::Aarch64Backend;
use codegen::x86_64_nasm::NasmBackend;
use diagnostics::CharSource;
use scanner::Scanner;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parses `source` into a [`Program`], without generating any code.
pub fn parse_source(source: String) -> Result<Program> {
    debug!("scanning and parsing");
    let scanner = Scanner::new(CharSource::from_string(source));
    Parser::new(scanner)?.parse_program()
}

/// Generates assembly text for an already-parsed program, per `config`'s
/// selected target.
pub fn generate(program: Program, config: &CompilerConfig) -> Result<String> {
    debug!(target = ?config.target, "generating code");
    match config.target {
        Target::Nasm => {
            let mut backend = NasmBackend;
            CodeGen::generate_program(&mut backend, program)
        }
        Target::Aarch64 => {
            let mut backend = Aarch64Backend;
            CodeGen::generate_program(&mut backend, program)
        }
    }
}

/// Compiles `source` straight to an assembly string, for callers that don't
/// need the intermediate [`Program`] (e.g. tests).
pub fn compile_to_asm(source: String, config: &CompilerConfig) -> Result<String> {
    let program = parse_source(source)?;
    generate(program, config)
}

/// Compiles the file at `input_path` and writes the resulting assembly to
/// `config`'s resolved output path (or the derived default), returning that
/// path.
pub fn compile_file(input_path: &Path, config: &CompilerConfig) -> Result<std::path::PathBuf> {
    let source = fs::read_to_string(input_path)?;
    let asm = compile_to_asm(source, config)?;
    let output_path = config.output_path(input_path);
    fs::write(&output_path, asm)?;
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiling_a_minimal_program_produces_nonempty_nasm_text() {
        let config = CompilerConfig::new(Target::Nasm);
        let asm = compile_to_asm("int main() { return 0; }".to_string(), &config).unwrap();
        assert!(asm.contains("main:"));
        assert!(asm.contains("global main"));
        assert!(asm.contains("extern printint"));
    }

    #[test]
    fn compiling_a_minimal_program_produces_nonempty_aarch64_text() {
        let config = CompilerConfig::new(Target::Aarch64);
        let asm = compile_to_asm("int main() { return 0; }".to_string(), &config).unwrap();
        assert!(asm.contains("main:"));
        assert!(asm.contains(".globl main"));
    }

    #[test]
    fn compile_file_writes_to_the_configured_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hello.nc");
        let expected_output = dir.path().join("hello.s");
        fs::write(&input, "int main() { return 0; }").unwrap();

        let config = CompilerConfig::default().with_output(expected_output.clone());
        let output = compile_file(&input, &config).unwrap();

        assert_eq!(output, expected_output);
        assert!(expected_output.exists());
    }

    #[test]
    fn a_syntax_error_is_reported_as_a_compile_error() {
        let config = CompilerConfig::default();
        let err = compile_to_asm("int main( { return 0; }".to_string(), &config).unwrap_err();
        assert_eq!(err.kind, diagnostics::ErrorKind::Syntactic);
    }

    #[test]
    fn local_variables_get_distinct_frame_relative_slots() {
        let config = CompilerConfig::new(Target::Nasm);
        let src = "int main() { int i; i = 0; int s; s = 0; return(s); }".to_string();
        let asm = compile_to_asm(src, &config).unwrap();
        // Two 4-byte ints round up to a 16-byte-aligned frame.
        assert!(asm.contains("sub rsp, 16"));
        assert!(asm.contains("[rbp-4]"));
        assert!(asm.contains("[rbp-8]"));
    }

    #[test]
    fn builtin_runtime_functions_resolve_without_a_source_declaration() {
        let config = CompilerConfig::new(Target::Nasm);
        let src = "char c; int main() { c = 65; printchar(c); return(0); }".to_string();
        let asm = compile_to_asm(src, &config).unwrap();
        assert!(asm.contains("extern printchar"));
        assert!(asm.contains("call printchar"));
    }

    #[test]
    fn printstring_call_carries_a_rodata_string_literal() {
        let config = CompilerConfig::new(Target::Aarch64);
        let src = "int main() { printstring(\"hi\"); return(0); }".to_string();
        let asm = compile_to_asm(src, &config).unwrap();
        assert!(asm.contains(".extern printstring"));
        assert!(asm.contains("bl printstring"));
        assert!(asm.contains(".section .rodata"));
        assert!(asm.contains(".ascii \"hi\""));
    }

    #[test]
    fn indexing_a_global_array_with_a_local_index_addresses_the_array() {
        let config = CompilerConfig::new(Target::Nasm);
        let src = "int a[5]; int main() { int i; i = 0; a[i] = 1; return(0); }".to_string();
        let asm = compile_to_asm(src, &config).unwrap();
        assert!(asm.contains("a: resd 5"));
        assert!(asm.contains("lea"));
    }
}
