//! Hand-written lexical scanner with one-token pushback.

use crate::diagnostics::{CharSource, CompileError, Result};
use crate::token::{keyword, Token, TokenKind};
use tracing::trace;

/// Cap on identifier/string literal length, matching the source language's
/// fixed `TEXTLEN` scratch buffer.
pub const TEXTLEN: usize = 512;

pub struct Scanner {
    source: CharSource,
    rejected: Option<Token>,
    /// Shared scratch buffer: overwritten on each identifier or string scan.
    text: String,
}

impl Scanner {
    pub fn new(source: CharSource) -> Self {
        Scanner {
            source,
            rejected: None,
            text: String::new(),
        }
    }

    pub fn line(&self) -> usize {
        self.source.line
    }

    /// The text of the most recently scanned identifier or string literal.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stashes `tok` to be returned by the next call to [`Scanner::scan`].
    /// A second reject without an intervening scan is an internal error.
    pub fn reject(&mut self, tok: Token) -> Result<()> {
        if self.rejected.is_some() {
            return Err(CompileError::internal(
                self.line(),
                "double token rejection without an intervening scan",
            ));
        }
        self.rejected = Some(tok);
        Ok(())
    }

    /// Returns the next token, consuming input. Yields `TokenKind::Eof` at
    /// end of input (scan never errors on EOF itself).
    pub fn scan(&mut self) -> Result<Token> {
        if let Some(tok) = self.rejected.take() {
            return Ok(tok);
        }

        let c = match self.source.skip_whitespace() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof)),
        };

        let tok = match c {
            b'+' => self.follow(b'+', TokenKind::Inc, TokenKind::Plus),
            b'-' => self.follow(b'-', TokenKind::Dec, TokenKind::Minus),
            b'*' => Token::new(TokenKind::Star),
            b'/' => Token::new(TokenKind::Slash),
            b'=' => self.follow(b'=', TokenKind::Eq, TokenKind::Assign),
            b'!' => self.follow(b'=', TokenKind::Ne, TokenKind::Not),
            b'<' => {
                if self.peek_is(b'=') {
                    Token::new(TokenKind::Le)
                } else if self.peek_is(b'<') {
                    Token::new(TokenKind::Shl)
                } else {
                    Token::new(TokenKind::Lt)
                }
            }
            b'>' => {
                if self.peek_is(b'=') {
                    Token::new(TokenKind::Ge)
                } else if self.peek_is(b'>') {
                    Token::new(TokenKind::Shr)
                } else {
                    Token::new(TokenKind::Gt)
                }
            }
            b'&' => self.follow(b'&', TokenKind::LogAnd, TokenKind::Amper),
            b'|' => self.follow(b'|', TokenKind::LogOr, TokenKind::Or),
            b'^' => Token::new(TokenKind::Xor),
            b'~' => Token::new(TokenKind::Invert),
            b';' => Token::new(TokenKind::Semi),
            b',' => Token::new(TokenKind::Comma),
            b'{' => Token::new(TokenKind::LBrace),
            b'}' => Token::new(TokenKind::RBrace),
            b'(' => Token::new(TokenKind::LParen),
            b')' => Token::new(TokenKind::RParen),
            b'[' => Token::new(TokenKind::LBracket),
            b']' => Token::new(TokenKind::RBracket),
            b'\'' => self.scan_char_literal()?,
            b'"' => self.scan_string_literal()?,
            c if c.is_ascii_digit() => self.scan_integer_literal(c),
            c if c.is_ascii_alphabetic() || c == b'_' => self.scan_identifier_or_keyword(c),
            c => {
                return Err(CompileError::lexical(
                    self.line(),
                    format!("unrecognized character '{}'", c as char),
                ))
            }
        };
        trace!(line = self.line(), kind = ?tok.kind, "scanned token");
        Ok(tok)
    }

    /// Consumes one more character and peeks: if it equals `expected`,
    /// returns `wide`; otherwise puts the character back and returns
    /// `narrow`.
    fn follow(&mut self, expected: u8, wide: TokenKind, narrow: TokenKind) -> Token {
        if self.peek_is(expected) {
            Token::new(wide)
        } else {
            Token::new(narrow)
        }
    }

    fn peek_is(&mut self, expected: u8) -> bool {
        match self.source.next_char() {
            Some(c) if c == expected => true,
            Some(c) => {
                self.source.putback_char(c);
                false
            }
            None => false,
        }
    }

    fn scan_integer_literal(&mut self, first: u8) -> Token {
        let mut value: i64 = (first - b'0') as i64;
        while let Some(c) = self.source.next_char() {
            if c.is_ascii_digit() {
                value = value * 10 + (c - b'0') as i64;
            } else {
                self.source.putback_char(c);
                break;
            }
        }
        Token::with_value(TokenKind::IntegerLit, value)
    }

    fn scan_identifier_or_keyword(&mut self, first: u8) -> Token {
        self.text.clear();
        self.text.push(first as char);
        while let Some(c) = self.source.next_char() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                if self.text.len() < TEXTLEN - 1 {
                    self.text.push(c as char);
                }
            } else {
                self.source.putback_char(c);
                break;
            }
        }
        match keyword(&self.text) {
            Some(kind) => Token::new(kind),
            None => Token::new(TokenKind::Identifier),
        }
    }

    fn scan_escape(&mut self) -> Result<u8> {
        let c = self
            .source
            .next_char()
            .ok_or_else(|| CompileError::lexical(self.line(), "unterminated escape sequence"))?;
        Ok(match c {
            b'\\' => b'\\',
            b'"' => b'"',
            b'\'' => b'\'',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            other => {
                return Err(CompileError::lexical(
                    self.line(),
                    format!("unknown escape sequence '\\{}'", other as char),
                ))
            }
        })
    }

    fn scan_char_literal(&mut self) -> Result<Token> {
        let c = self
            .source
            .next_char()
            .ok_or_else(|| CompileError::lexical(self.line(), "unterminated character literal"))?;
        let value = if c == b'\\' {
            self.scan_escape()?
        } else {
            c
        };
        match self.source.next_char() {
            Some(b'\'') => Ok(Token::with_value(TokenKind::IntegerLit, value as i64)),
            _ => Err(CompileError::lexical(
                self.line(),
                "unterminated character literal, expected closing '",
            )),
        }
    }

    fn scan_string_literal(&mut self) -> Result<Token> {
        self.text.clear();
        loop {
            let c = self.source.next_char().ok_or_else(|| {
                CompileError::lexical(self.line(), "unterminated string literal")
            })?;
            if c == b'"' {
                break;
            }
            let byte = if c == b'\\' { self.scan_escape()? } else { c };
            if self.text.len() >= TEXTLEN - 1 {
                return Err(CompileError::lexical(
                    self.line(),
                    "string literal too long",
                ));
            }
            self.text.push(byte as char);
        }
        Ok(Token::new(TokenKind::StringLit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(src: &str) -> Vec<TokenKind> {
        let mut s = Scanner::new(CharSource::from_string(src.to_string()));
        let mut out = Vec::new();
        loop {
            let t = s.scan().unwrap();
            let eof = t.kind == TokenKind::Eof;
            out.push(t.kind);
            if eof {
                break;
            }
        }
        out
    }

    #[test]
    fn operator_alphabet_scans_to_documented_sequence() {
        use TokenKind::*;
        let kinds = scan_all("= || && | ^ & == != < > <= >= << >> + - * / ! ~ ++ --");
        assert_eq!(
            kinds,
            vec![
                Assign, LogOr, LogAnd, Or, Xor, Amper, Eq, Ne, Lt, Gt, Le, Ge, Shl, Shr, Plus,
                Minus, Star, Slash, Not, Invert, Inc, Dec, Eof,
            ]
        );
    }

    #[test]
    fn ends_with_exactly_one_eof_and_no_whitespace_tokens() {
        let kinds = scan_all("  int   x ;  \n\n ");
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Eof).count(), 1);
        assert_eq!(*kinds.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn reject_then_scan_returns_rejected_token() {
        let mut s = Scanner::new(CharSource::from_string("int x".to_string()));
        let first = s.scan().unwrap();
        s.reject(first.clone()).unwrap();
        let again = s.scan().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn double_reject_is_internal_error() {
        let mut s = Scanner::new(CharSource::from_string("int".to_string()));
        let tok = s.scan().unwrap();
        s.reject(tok.clone()).unwrap();
        let err = s.reject(tok).unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Internal);
    }

    #[test]
    fn identifier_and_keyword_classification() {
        let mut s = Scanner::new(CharSource::from_string("foo_1 while".to_string()));
        let t1 = s.scan().unwrap();
        assert_eq!(t1.kind, TokenKind::Identifier);
        assert_eq!(s.text(), "foo_1");
        let t2 = s.scan().unwrap();
        assert_eq!(t2.kind, TokenKind::While);
    }

    #[test]
    fn integer_literal_accumulates_base_ten() {
        let mut s = Scanner::new(CharSource::from_string("12345;".to_string()));
        let t = s.scan().unwrap();
        assert_eq!(t.kind, TokenKind::IntegerLit);
        assert_eq!(t.int_value, 12345);
    }

    #[test]
    fn char_literal_with_escape() {
        let mut s = Scanner::new(CharSource::from_string(r"'\n'".to_string()));
        let t = s.scan().unwrap();
        assert_eq!(t.kind, TokenKind::IntegerLit);
        assert_eq!(t.int_value, b'\n' as i64);
    }

    #[test]
    fn string_literal_collects_escaped_bytes() {
        let mut s = Scanner::new(CharSource::from_string(r#""hi\n""#.to_string()));
        let t = s.scan().unwrap();
        assert_eq!(t.kind, TokenKind::StringLit);
        assert_eq!(s.text(), "hi\n");
    }

    #[test]
    fn unterminated_char_literal_is_lexical_error() {
        let mut s = Scanner::new(CharSource::from_string("'a".to_string()));
        let err = s.scan().unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::ErrorKind::Lexical);
    }
}
