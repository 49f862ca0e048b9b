//! Token kinds and the token payload produced by the [`crate::lexer::Lexer`].
//!
//! Spec.md §3 represents a token's kind as a raw byte (single-ASCII kinds
//! use the character's codepoint, named kinds use values >= 256). Rust's
//! enums make that encoding unnecessary — `TokenKind::Char(u8)` carries
//! the same information as a variant rather than a magic number — so this
//! is a direct, differently-represented translation of the same idea, not
//! a behavioral change.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A single ASCII symbol not otherwise recognized: `( ) [ ] { } , . = ! < > + - * / %`.
    Char(u8),
    Eof,
    Eol,
    Name,
    Number,
    String,
    Eq,
    NEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AndL,
    OrL,
    KwNil,
    KwTrue,
    KwFalse,
    KwFunc,
    KwVar,
    KwIf,
    KwElse,
    KwWhile,
    KwPrint,
    KwBreak,
    KwContinue,
    KwReturn,
    /// Not part of spec.md's core keyword list; exposes `GetInst` as a
    /// primary-expression atom so method bodies can name the bound
    /// receiver (spec.md §8 scenario 4, §4.3 "Inst / Receiver").
    KwThis,
}

impl TokenKind {
    /// Human-readable description for "expected X before Y" diagnostics.
    pub fn describe(self) -> String {
        match self {
            TokenKind::Char(c) => format!("'{}'", c as char),
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Eol => "end of line".to_string(),
            TokenKind::Name => "a name".to_string(),
            TokenKind::Number => "a number".to_string(),
            TokenKind::String => "a string".to_string(),
            TokenKind::Eq => "'=='".to_string(),
            TokenKind::NEq => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::LtEq => "'<='".to_string(),
            TokenKind::GtEq => "'>='".to_string(),
            TokenKind::AndL => "'&&'".to_string(),
            TokenKind::OrL => "'||'".to_string(),
            TokenKind::KwNil => "'nil'".to_string(),
            TokenKind::KwTrue => "'true'".to_string(),
            TokenKind::KwFalse => "'false'".to_string(),
            TokenKind::KwFunc => "'func'".to_string(),
            TokenKind::KwVar => "'var'".to_string(),
            TokenKind::KwIf => "'if'".to_string(),
            TokenKind::KwElse => "'else'".to_string(),
            TokenKind::KwWhile => "'while'".to_string(),
            TokenKind::KwPrint => "'print'".to_string(),
            TokenKind::KwBreak => "'break'".to_string(),
            TokenKind::KwContinue => "'continue'".to_string(),
            TokenKind::KwReturn => "'return'".to_string(),
            TokenKind::KwThis => "'this'".to_string(),
        }
    }
}

/// A lexed token: kind, source line (0-based internally; spec.md §3), and
/// a variant payload for names/strings/numbers.
#[derive(Debug, Clone, Copy)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub line: usize,
    pub text: &'src str,
    pub number: f64,
}

impl<'src> Token<'src> {
    pub fn simple(kind: TokenKind, line: usize) -> Self {
        Token {
            kind,
            line,
            text: "",
            number: 0.0,
        }
    }

    pub fn with_text(kind: TokenKind, line: usize, text: &'src str) -> Self {
        Token {
            kind,
            line,
            text,
            number: 0.0,
        }
    }

    pub fn with_number(line: usize, number: f64) -> Self {
        Token {
            kind: TokenKind::Number,
            line,
            text: "",
            number,
        }
    }
}
