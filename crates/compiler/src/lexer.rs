//! A single-pass, context-sensitive lexer over a zero-terminated source
//! buffer. Newlines are significant only where the grammar can actually
//! end a statement; everywhere else they're swallowed as whitespace so an
//! expression can wrap across lines. See spec.md §4.1.

use crate::error::{CompileError, CompileResult};
use crate::token::{Token, TokenKind};

pub struct Lexer<'src> {
    file: &'src str,
    bytes: &'src [u8],
    pos: usize,
    /// 0-based; spec.md reports lines as 1-based only at diagnostic time.
    line: usize,
    /// Whether a bare `\n` is whitespace (statement continues) or ends
    /// the statement as an `Eol` token. Spec.md §4.1 "Newline policy".
    eol_is_ws: bool,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_word_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_word_part(c: u8) -> bool {
    is_word_start(c) || is_digit(c)
}

impl<'src> Lexer<'src> {
    /// `source` must end with a NUL byte (the caller's job — see
    /// spec.md §6 "Host -> Compiler").
    pub fn new(file: &'src str, source: &'src [u8]) -> Self {
        assert!(
            source.last() == Some(&0),
            "lexer requires a NUL-terminated source buffer"
        );
        Lexer {
            file,
            bytes: source,
            pos: 0,
            line: 0,
            eol_is_ws: true,
        }
    }

    fn peek(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        c
    }

    fn eat_whitespace(&mut self) -> bool {
        let is_ws = |c: u8| c == b' ' || c == b'\t' || c == b'\r' || (self.eol_is_ws && c == b'\n');
        if !is_ws(self.peek()) {
            return false;
        }
        while is_ws(self.peek()) {
            self.advance();
        }
        true
    }

    fn eat_comment(&mut self) -> bool {
        if self.peek() != b'#' {
            return false;
        }
        while self.peek() != b'\n' && self.peek() != 0 {
            self.advance();
        }
        true
    }

    fn eat_padding(&mut self) {
        while self.eat_whitespace() || self.eat_comment() {}
    }

    fn error(&self, line: usize, message: impl Into<String>) -> CompileError {
        CompileError::new(self.file, line, message)
    }

    fn eat_word_token(&mut self) -> Token<'src> {
        let line = self.line;
        let start = self.pos;
        while is_word_part(self.peek()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();

        // Statement-starting keywords keep the expression open across a
        // newline (spec.md §4.1); every other word token closes it.
        let (kind, continues) = match text {
            "nil" => (TokenKind::KwNil, false),
            "true" => (TokenKind::KwTrue, false),
            "false" => (TokenKind::KwFalse, false),
            "this" => (TokenKind::KwThis, false),
            "func" => (TokenKind::KwFunc, true),
            "var" => (TokenKind::KwVar, true),
            "if" => (TokenKind::KwIf, true),
            "else" => (TokenKind::KwElse, true),
            "while" => (TokenKind::KwWhile, true),
            "print" => (TokenKind::KwPrint, true),
            "break" => (TokenKind::KwBreak, false),
            "continue" => (TokenKind::KwContinue, false),
            "return" => (TokenKind::KwReturn, false),
            _ => (TokenKind::Name, false),
        };
        self.eol_is_ws = continues;
        Token::with_text(kind, line, text)
    }

    fn eat_number_token(&mut self) -> CompileResult<Token<'src>> {
        let line = self.line;
        let start = self.pos;
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == b'.' {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        if is_word_part(self.peek()) {
            return Err(self.error(line, "invalid character in number constant"));
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        let value: f64 = text.parse().expect("lexed number grammar is always valid f64 syntax");
        self.eol_is_ws = false;
        Ok(Token::with_number(line, value))
    }

    fn eat_string_token(&mut self) -> CompileResult<Token<'src>> {
        let start_line = self.line;
        self.advance(); // opening quote
        let start = self.pos;
        loop {
            match self.peek() {
                0 => return Err(self.error(start_line, "unclosed string constant")),
                b'\\' => {
                    self.advance();
                    if self.peek() != 0 {
                        self.advance();
                    }
                }
                _ => {
                    if self.advance() == b'"' {
                        break;
                    }
                }
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos - 1]).unwrap();
        self.eol_is_ws = false;
        Ok(Token::with_text(TokenKind::String, start_line, text))
    }

    fn eat_symbol_token(&mut self) -> Token<'src> {
        let line = self.line;
        self.eol_is_ws = true;
        let two_char = |this: &mut Self, second: u8, two: TokenKind| -> Option<Token<'src>> {
            if this.peek() == second {
                this.advance();
                Some(Token::simple(two, line))
            } else {
                None
            }
        };
        match self.peek() {
            b'=' => {
                self.advance();
                two_char(self, b'=', TokenKind::Eq).unwrap_or(Token::simple(TokenKind::Char(b'='), line))
            }
            b'!' => {
                self.advance();
                two_char(self, b'=', TokenKind::NEq).unwrap_or(Token::simple(TokenKind::Char(b'!'), line))
            }
            b'&' => {
                self.advance();
                two_char(self, b'&', TokenKind::AndL).unwrap_or(Token::simple(TokenKind::Char(b'&'), line))
            }
            b'|' => {
                self.advance();
                two_char(self, b'|', TokenKind::OrL).unwrap_or(Token::simple(TokenKind::Char(b'|'), line))
            }
            b'<' => {
                self.advance();
                two_char(self, b'=', TokenKind::LtEq).unwrap_or(Token::simple(TokenKind::Char(b'<'), line))
            }
            b'>' => {
                self.advance();
                two_char(self, b'=', TokenKind::GtEq).unwrap_or(Token::simple(TokenKind::Char(b'>'), line))
            }
            _ => {
                let c = self.advance();
                self.eol_is_ws = c != b')' && c != b']' && c != b'}';
                Token::simple(TokenKind::Char(c), line)
            }
        }
    }

    pub fn next_token(&mut self) -> CompileResult<Token<'src>> {
        self.eat_padding();

        let c = self.peek();
        if c == 0 {
            return Ok(if self.eol_is_ws {
                Token::simple(TokenKind::Eof, self.line)
            } else {
                self.eol_is_ws = true;
                Token::simple(TokenKind::Eol, self.line)
            });
        }
        if c == b'\n' {
            self.advance();
            self.eol_is_ws = true;
            return Ok(Token::simple(TokenKind::Eol, self.line - 1));
        }
        if is_word_start(c) {
            return Ok(self.eat_word_token());
        }
        if is_digit(c) {
            return self.eat_number_token();
        }
        if c == b'"' {
            return self.eat_string_token();
        }
        Ok(self.eat_symbol_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<TokenKind> {
        let mut buf = src.as_bytes().to_vec();
        buf.push(0);
        let mut lexer = Lexer::new("test", &buf);
        let mut kinds = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            kinds.push(tok.kind);
            if tok.kind == TokenKind::Eof {
                break;
            }
        }
        kinds
    }

    #[test]
    fn simple_arithmetic_tokens() {
        let kinds = lex_all("1+2*3");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Char(b'+'),
                TokenKind::Number,
                TokenKind::Char(b'*'),
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn gt_and_gte_are_distinct() {
        let kinds = lex_all("a > b >= c");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Name,
                TokenKind::Gt,
                TokenKind::Name,
                TokenKind::GtEq,
                TokenKind::Name,
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_after_open_paren_is_whitespace() {
        let kinds = lex_all("(\n1)");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Char(b'('),
                TokenKind::Number,
                TokenKind::Char(b')'),
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_after_close_paren_is_significant() {
        let kinds = lex_all("(1)\n2");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Char(b'('),
                TokenKind::Number,
                TokenKind::Char(b')'),
                TokenKind::Eol,
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_after_if_keyword_is_whitespace() {
        let kinds = lex_all("if\ntrue {}");
        assert_eq!(
            kinds[0..2],
            [TokenKind::KwIf, TokenKind::KwTrue]
        );
    }

    #[test]
    fn comment_is_skipped() {
        let kinds = lex_all("1 # comment\n2");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut buf = b"\"abc".to_vec();
        buf.push(0);
        let mut lexer = Lexer::new("test", &buf);
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("unclosed string"));
    }

    #[test]
    fn invalid_number_char_is_an_error() {
        let mut buf = b"123abc".to_vec();
        buf.push(0);
        let mut lexer = Lexer::new("test", &buf);
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("invalid character in number"));
    }

    #[test]
    fn eof_without_trailing_newline_emits_eol_then_eof() {
        let kinds = lex_all("1");
        assert_eq!(kinds, vec![TokenKind::Number, TokenKind::Eol, TokenKind::Eof]);
    }
}
