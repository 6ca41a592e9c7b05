//! Structured compiler errors and the character-level input source.
//!
//! Diagnostics are a `Result`-propagated [`CompileError`] rather than a
//! process-exiting fatal call. The driver (`main.rs`) is the only place
//! that prints one and exits.

use std::fmt;
use std::io::{self, Read};

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntactic,
    Semantic,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntactic => "syntax error",
            ErrorKind::Semantic => "type error",
            ErrorKind::Internal => "internal error",
        };
        write!(f, "{s}")
    }
}

/// A single compiler diagnostic, tagged with the source line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
}

impl CompileError {
    pub fn new(kind: ErrorKind, line: usize, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            message: message.into(),
            line,
        }
    }

    pub fn lexical(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lexical, line, message)
    }

    pub fn syntactic(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntactic, line, message)
    }

    pub fn semantic(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Semantic, line, message)
    }

    pub fn internal(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, line, message)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}: {}", self.kind, self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<io::Error> for CompileError {
    fn from(e: io::Error) -> Self {
        CompileError::new(ErrorKind::Internal, 0, format!("I/O error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Character-level view of the source file with one-character pushback and
/// line tracking.
pub struct CharSource {
    bytes: Vec<u8>,
    pos: usize,
    putback: Option<u8>,
    pub line: usize,
}

impl CharSource {
    pub fn from_string(source: String) -> Self {
        CharSource {
            bytes: source.into_bytes(),
            pos: 0,
            putback: None,
            line: 1,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        Ok(Self::from_string(source))
    }

    /// Returns the next byte, or `None` at end of input. Increments the
    /// line counter on `\n`.
    pub fn next_char(&mut self) -> Option<u8> {
        if let Some(c) = self.putback.take() {
            return Some(c);
        }
        if self.pos >= self.bytes.len() {
            return None;
        }
        let c = self.bytes[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Stores a single character for the next [`CharSource::next_char`]
    /// call. At most one character may be pending at a time.
    pub fn putback_char(&mut self, c: u8) {
        debug_assert!(
            self.putback.is_none(),
            "CharSource: double putback without intervening next_char"
        );
        if c == b'\n' {
            self.line -= 1;
        }
        self.putback = Some(c);
    }

    /// Skips ASCII whitespace (space, tab, CR, LF, form feed) and line/block
    /// comments, returning the next non-whitespace character.
    pub fn skip_whitespace(&mut self) -> Option<u8> {
        loop {
            let c = self.next_char()?;
            match c {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0c => continue,
                b'/' => match self.next_char() {
                    Some(b'/') => {
                        while let Some(c) = self.next_char() {
                            if c == b'\n' {
                                break;
                            }
                        }
                        continue;
                    }
                    Some(b'*') => {
                        let mut prev = 0u8;
                        loop {
                            match self.next_char() {
                                Some(b'/') if prev == b'*' => break,
                                Some(c) => prev = c,
                                None => return None,
                            }
                        }
                        continue;
                    }
                    Some(other) => {
                        self.putback_char(other);
                        return Some(b'/');
                    }
                    None => return Some(b'/'),
                },
                other => return Some(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_char_tracks_lines() {
        let mut src = CharSource::from_string("a\nb\nc".to_string());
        assert_eq!(src.line, 1);
        assert_eq!(src.next_char(), Some(b'a'));
        assert_eq!(src.next_char(), Some(b'\n'));
        assert_eq!(src.line, 2);
        assert_eq!(src.next_char(), Some(b'b'));
    }

    #[test]
    fn putback_is_replayed_once() {
        let mut src = CharSource::from_string("xy".to_string());
        let c = src.next_char().unwrap();
        src.putback_char(c);
        assert_eq!(src.next_char(), Some(b'x'));
        assert_eq!(src.next_char(), Some(b'y'));
        assert_eq!(src.next_char(), None);
    }

    #[test]
    fn skip_whitespace_crosses_comments() {
        let mut src = CharSource::from_string("  // hi\n/* block */\tX".to_string());
        assert_eq!(src.skip_whitespace(), Some(b'X'));
    }

    #[test]
    fn end_of_input_yields_none() {
        let mut src = CharSource::from_string(String::new());
        assert_eq!(src.next_char(), None);
        assert_eq!(src.skip_whitespace(), None);
    }
}
