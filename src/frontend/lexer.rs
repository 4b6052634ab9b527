//! Lexer for tacc
//!
//! Converts source code into a lazy stream of tokens. The first
//! unexpected character ends the stream with an error.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Start lexing `source`. Restart by calling again.
pub fn lex(source: &str) -> Lexer {
    Lexer::new(source)
}

/// The lexer state
pub struct Lexer {
    /// Source code as characters
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
    /// Current line (1-based)
    line: usize,
    /// Position of the first character of the current line
    line_start: usize,
    /// Line and column where the current token began
    token_line: usize,
    token_column: usize,
    /// Set once an error has been yielded
    failed: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
            line: 1,
            line_start: 0,
            token_line: 1,
            token_column: 1,
            failed: false,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    /// Advance to the next character, keeping the line counter in sync
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        if c == Some('\n') {
            self.line += 1;
            self.line_start = self.pos;
        }
        c
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.token_line, self.token_column)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        let lexeme: String = self.source[self.start..self.pos].iter().collect();
        Token::new(kind, lexeme, self.make_span())
    }

    /// Error for the character the current token started with
    fn error_at_start(&self) -> Error {
        let ch = self.source[self.start];
        Error::UnexpectedChar {
            ch,
            line: self.token_line,
            column: self.token_column,
            span: Span::new(self.start, self.start + 1, self.token_line, self.token_column),
        }
    }

    /// Skip whitespace, newlines and line comments
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        if TokenKind::is_keyword(&text) {
            self.make_token(TokenKind::Keyword)
        } else {
            self.make_token(TokenKind::Id)
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Read a number literal: `123`, `1.`, `1.5`, `.5`, each with an optional exponent
    fn read_number(&mut self) -> Result<Token> {
        self.skip_digits();

        if self.peek() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let digit_at = if matches!(self.peek_next(), Some('+') | Some('-')) { 2 } else { 1 };
            if self.peek_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        // `1abc` has no word boundary after the digits
        if self.peek().map_or(false, |c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(self.error_at_start());
        }

        Ok(self.make_token(TokenKind::Number))
    }

    /// Read a string literal, keeping quotes and escapes in the lexeme
    fn read_string(&mut self) -> Result<Token> {
        self.advance(); // opening quote

        loop {
            match self.peek() {
                None => return Err(self.error_at_start()),
                Some('"') => {
                    self.advance();
                    return Ok(self.make_token(TokenKind::StringLiteral));
                }
                Some('\\') => {
                    self.advance();
                    if self.advance().is_none() {
                        return Err(self.error_at_start());
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Read a character literal: one character or one escape
    fn read_char(&mut self) -> Result<Token> {
        self.advance(); // opening quote

        match self.peek() {
            Some('\\') => {
                self.advance();
                match self.peek() {
                    Some(c) if c != '\n' => {
                        self.advance();
                    }
                    _ => return Err(self.error_at_start()),
                }
            }
            Some(c) if c != '\'' && c != '\n' => {
                self.advance();
            }
            _ => return Err(self.error_at_start()),
        }

        if self.peek() == Some('\'') {
            self.advance();
            Ok(self.make_token(TokenKind::CharLiteral))
        } else {
            Err(self.error_at_start())
        }
    }

    /// Get the next token, or `None` at end of input
    pub fn next_token(&mut self) -> Option<Result<Token>> {
        self.skip_whitespace();
        if self.is_at_end() {
            return None;
        }

        self.start = self.pos;
        self.token_line = self.line;
        self.token_column = self.pos - self.line_start + 1;

        let c = self.peek()?;

        if c == '"' {
            return Some(self.read_string());
        }
        if c == '\'' {
            return Some(self.read_char());
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return Some(Ok(self.read_identifier()));
        }
        if c.is_ascii_digit() || (c == '.' && self.peek_next().map_or(false, |n| n.is_ascii_digit())) {
            return Some(self.read_number());
        }

        self.advance();
        let kind = match c {
            '=' | '!' | '<' | '>' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::RelOp
            }
            '<' | '>' => TokenKind::RelOp,
            '=' => TokenKind::Assign,
            '+' | '-' | '*' | '/' => TokenKind::Op,
            '{' | '}' | '(' | ')' | ';' => TokenKind::Symbol,
            _ => return Some(Err(self.error_at_start())),
        };

        Some(Ok(self.make_token(kind)))
    }

    /// Tokenize the entire source, stopping at the first error
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        self.collect()
    }
}

impl Iterator for Lexer {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_token();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
