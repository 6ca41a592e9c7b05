//! Compiler configuration, threaded by reference from the CLI (or any other
//! caller) into the library entry points.

use std::path::PathBuf;

/// Selected backend. Each variant names the concrete operation-table
/// implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Nasm,
    Aarch64,
}

impl Target {
    /// Parses a `--target` flag value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nasm" => Some(Target::Nasm),
            "aarch64" => Some(Target::Aarch64),
            _ => None,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::Nasm
    }
}

/// Builder-style configuration for one compilation.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub target: Target,
    pub output: Option<PathBuf>,
    pub dump_ast: bool,
    pub dump_ast_compacted: bool,
}

impl CompilerConfig {
    pub fn new(target: Target) -> Self {
        CompilerConfig {
            target,
            output: None,
            dump_ast: false,
            dump_ast_compacted: false,
        }
    }

    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }

    pub fn with_dump_ast(mut self, dump: bool) -> Self {
        self.dump_ast = dump;
        self
    }

    pub fn with_dump_ast_compacted(mut self, dump: bool) -> Self {
        self.dump_ast_compacted = dump;
        self
    }

    /// The assembly output path: the explicit override, or the input
    /// file's stem with a `.s` extension in the current directory.
    pub fn output_path(&self, input: &std::path::Path) -> PathBuf {
        if let Some(path) = &self.output {
            return path.clone();
        }
        let stem = input.file_stem().unwrap_or_default();
        PathBuf::from(stem).with_extension("s")
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new(Target::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parses_the_two_documented_names() {
        assert_eq!(Target::parse("nasm"), Some(Target::Nasm));
        assert_eq!(Target::parse("aarch64"), Some(Target::Aarch64));
        assert_eq!(Target::parse("riscv"), None);
    }

    #[test]
    fn output_path_defaults_to_input_stem_with_s_extension() {
        let config = CompilerConfig::default();
        let path = config.output_path(std::path::Path::new("hello.nc"));
        assert_eq!(path, PathBuf::from("hello.s"));
    }

    #[test]
    fn explicit_output_override_wins() {
        let config = CompilerConfig::default().with_output(PathBuf::from("out.s"));
        let path = config.output_path(std::path::Path::new("hello.nc"));
        assert_eq!(path, PathBuf::from("out.s"));
    }
}
