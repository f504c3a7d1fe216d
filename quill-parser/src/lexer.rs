// quill-parser - Lexer for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Lexer producing a token stream with positions.
//!
//! Newlines terminate statements Go-style: a semicolon token is
//! inserted at a line break when the previous token can end a
//! statement.

use crate::error::ParseError;
use crate::source::Pos;
use crate::token::Token;

/// A token paired with its starting position.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: Pos,
}

/// The lexer. Call [`Lexer::tokenize`] to consume the input.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    offset: usize,
    tokens: Vec<SpannedToken>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Lexer<'a> {
        Lexer {
            src,
            bytes: src.as_bytes(),
            offset: 0,
            tokens: Vec::new(),
        }
    }

    /// Lex the whole input into a token vector ending with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, ParseError> {
        loop {
            self.skip_whitespace_and_comments()?;
            let start = self.offset;
            let Some(b) = self.peek_byte() else {
                self.maybe_insert_semicolon(start);
                self.push(Token::Eof, start);
                break;
            };
            match b {
                b'0'..=b'9' => self.lex_number(start)?,
                b'"' => self.lex_string(start)?,
                b'`' => self.lex_raw_string(start)?,
                b'\'' => self.lex_char(start)?,
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.lex_ident(start),
                _ => self.lex_operator(start)?,
            }
        }
        Ok(self.tokens)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn peek_byte_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.offset + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.offset += 1;
        Some(b)
    }

    fn push(&mut self, token: Token, start: usize) {
        self.tokens.push(SpannedToken {
            token,
            pos: Pos(start as u32),
        });
    }

    fn error(&self, start: usize, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, Pos(start as u32))
    }

    /// Whether a semicolon should be inserted after `token` at a
    /// line break.
    fn ends_statement(token: &Token) -> bool {
        matches!(
            token,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Char(_)
                | Token::Str(_)
                | Token::True
                | Token::False
                | Token::Null
                | Token::Break
                | Token::Continue
                | Token::Return
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        )
    }

    fn maybe_insert_semicolon(&mut self, at: usize) {
        if let Some(last) = self.tokens.last() {
            if Self::ends_statement(&last.token) {
                self.push(Token::Semicolon, at);
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek_byte() {
                Some(b'\n') => {
                    let at = self.offset;
                    self.offset += 1;
                    self.maybe_insert_semicolon(at);
                }
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.offset += 1;
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.offset += 1;
                    }
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    let start = self.offset;
                    self.offset += 2;
                    loop {
                        match self.peek_byte() {
                            Some(b'*') if self.peek_byte_at(1) == Some(b'/') => {
                                self.offset += 2;
                                break;
                            }
                            Some(_) => self.offset += 1,
                            None => {
                                return Err(self.error(start, "unterminated block comment"));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_ident(&mut self, start: usize) {
        while let Some(b) = self.peek_byte() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.offset += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.offset];
        let token = Token::lookup_keyword(text).unwrap_or_else(|| Token::Ident(text.to_string()));
        self.push(token, start);
    }

    fn lex_number(&mut self, start: usize) -> Result<(), ParseError> {
        let (radix, digits_start) = if self.peek_byte() == Some(b'0') {
            match self.peek_byte_at(1) {
                Some(b'x') | Some(b'X') => (16, start + 2),
                Some(b'o') | Some(b'O') => (8, start + 2),
                Some(b'b') | Some(b'B') => (2, start + 2),
                _ => (10, start),
            }
        } else {
            (10, start)
        };
        if radix != 10 {
            self.offset = digits_start;
            while let Some(b) = self.peek_byte() {
                if (b as char).is_digit(radix) || b == b'_' {
                    self.offset += 1;
                } else {
                    break;
                }
            }
            let text: String = self.src[digits_start..self.offset]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            let value = i64::from_str_radix(&text, radix)
                .map_err(|_| self.error(start, "invalid integer literal"))?;
            self.push(Token::Int(value), start);
            return Ok(());
        }

        let mut is_float = false;
        while let Some(b) = self.peek_byte() {
            match b {
                b'0'..=b'9' | b'_' => self.offset += 1,
                // A dot starts the fraction only when followed by a
                // digit, so `a[0].length` still lexes as a selector.
                b'.' if !is_float
                    && matches!(self.peek_byte_at(1), Some(d) if d.is_ascii_digit()) =>
                {
                    is_float = true;
                    self.offset += 1;
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.offset += 1;
                    if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                        self.offset += 1;
                    }
                }
                _ => break,
            }
        }
        let text: String = self.src[start..self.offset]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(start, "invalid float literal"))?;
            self.push(Token::Float(value), start);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(start, "invalid integer literal"))?;
            self.push(Token::Int(value), start);
        }
        Ok(())
    }

    fn lex_escape(&mut self, start: usize) -> Result<char, ParseError> {
        match self.bump() {
            Some(b'n') => Ok('\n'),
            Some(b't') => Ok('\t'),
            Some(b'r') => Ok('\r'),
            Some(b'0') => Ok('\0'),
            Some(b'\\') => Ok('\\'),
            Some(b'"') => Ok('"'),
            Some(b'\'') => Ok('\''),
            Some(b'`') => Ok('`'),
            _ => Err(self.error(start, "invalid escape sequence")),
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<(), ParseError> {
        self.offset += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                Some(b'"') => {
                    self.offset += 1;
                    break;
                }
                Some(b'\\') => {
                    self.offset += 1;
                    value.push(self.lex_escape(start)?);
                }
                Some(b'\n') | None => {
                    return Err(self.error(start, "unterminated string literal"));
                }
                Some(_) => {
                    let c = self.next_char();
                    value.push(c);
                }
            }
        }
        self.push(Token::Str(value), start);
        Ok(())
    }

    fn lex_raw_string(&mut self, start: usize) -> Result<(), ParseError> {
        self.offset += 1; // opening backquote
        let content_start = self.offset;
        loop {
            match self.peek_byte() {
                Some(b'`') => {
                    let value = self.src[content_start..self.offset].to_string();
                    self.offset += 1;
                    self.push(Token::Str(value), start);
                    return Ok(());
                }
                Some(_) => self.offset += 1,
                None => return Err(self.error(start, "unterminated raw string literal")),
            }
        }
    }

    fn lex_char(&mut self, start: usize) -> Result<(), ParseError> {
        self.offset += 1; // opening quote
        let value = match self.peek_byte() {
            Some(b'\\') => {
                self.offset += 1;
                self.lex_escape(start)?
            }
            Some(b'\'') | None => {
                return Err(self.error(start, "empty char literal"));
            }
            Some(_) => self.next_char(),
        };
        if self.bump() != Some(b'\'') {
            return Err(self.error(start, "unterminated char literal"));
        }
        self.push(Token::Char(value), start);
        Ok(())
    }

    /// Consume one full UTF-8 character.
    fn next_char(&mut self) -> char {
        let c = self.src[self.offset..].chars().next().unwrap();
        self.offset += c.len_utf8();
        c
    }

    fn lex_operator(&mut self, start: usize) -> Result<(), ParseError> {
        // Longest-match first.
        let rest = &self.src[self.offset..];
        let (token, len) = if rest.starts_with("...") {
            (Token::Ellipsis, 3)
        } else if rest.starts_with("&^=") {
            (Token::AndNotAssign, 3)
        } else if rest.starts_with("<<=") {
            (Token::ShlAssign, 3)
        } else if rest.starts_with(">>=") {
            (Token::ShrAssign, 3)
        } else if rest.starts_with("&^") {
            (Token::AndNot, 2)
        } else if rest.starts_with("<<") {
            (Token::Shl, 2)
        } else if rest.starts_with(">>") {
            (Token::Shr, 2)
        } else if rest.starts_with("&&") {
            (Token::LAnd, 2)
        } else if rest.starts_with("||") {
            (Token::LOr, 2)
        } else if rest.starts_with("==") {
            (Token::Equal, 2)
        } else if rest.starts_with("!=") {
            (Token::NotEqual, 2)
        } else if rest.starts_with("<=") {
            (Token::LessEq, 2)
        } else if rest.starts_with(">=") {
            (Token::GreaterEq, 2)
        } else if rest.starts_with(":=") {
            (Token::Define, 2)
        } else if rest.starts_with("+=") {
            (Token::AddAssign, 2)
        } else if rest.starts_with("-=") {
            (Token::SubAssign, 2)
        } else if rest.starts_with("*=") {
            (Token::MulAssign, 2)
        } else if rest.starts_with("/=") {
            (Token::QuoAssign, 2)
        } else if rest.starts_with("%=") {
            (Token::RemAssign, 2)
        } else if rest.starts_with("&=") {
            (Token::AndAssign, 2)
        } else if rest.starts_with("|=") {
            (Token::OrAssign, 2)
        } else if rest.starts_with("^=") {
            (Token::XorAssign, 2)
        } else {
            let single = match rest.as_bytes()[0] {
                b'+' => Token::Add,
                b'-' => Token::Sub,
                b'*' => Token::Mul,
                b'/' => Token::Quo,
                b'%' => Token::Rem,
                b'&' => Token::And,
                b'|' => Token::Or,
                b'^' => Token::Xor,
                b'!' => Token::Not,
                b'<' => Token::Less,
                b'>' => Token::Greater,
                b'=' => Token::Assign,
                b'(' => Token::LParen,
                b')' => Token::RParen,
                b'[' => Token::LBracket,
                b']' => Token::RBracket,
                b'{' => Token::LBrace,
                b'}' => Token::RBrace,
                b',' => Token::Comma,
                b':' => Token::Colon,
                b';' => Token::Semicolon,
                b'.' => Token::Dot,
                other => {
                    return Err(self.error(
                        start,
                        format!("unexpected character '{}'", other as char),
                    ));
                }
            };
            (single, 1)
        };
        self.offset += len;
        self.push(token, start);
        Ok(())
    }
}
