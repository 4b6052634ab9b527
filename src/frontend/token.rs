//! Token definitions for tacc

use std::fmt;

use serde::Serialize;

use crate::utils::Span;

/// Reserved words. Type keywords come first.
pub const KEYWORDS: [&str; 9] = [
    "for", "int", "float", "string", "double", "char", "bool", "true", "false",
];

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip)]
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line: span.line,
            column: span.column,
            span,
        }
    }

    /// Check kind and, when given, the exact lexeme
    pub fn is(&self, kind: TokenKind, lexeme: Option<&str>) -> bool {
        self.kind == kind && lexeme.map_or(true, |l| self.lexeme == l)
    }

    /// `'lexeme' (KIND)`, as used in parser messages
    pub fn describe(&self) -> String {
        format!("'{}' ({})", self.lexeme, self.kind)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.kind, self.lexeme)
    }
}

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// for, int, float, string, double, char, bool, true, false
    Keyword,
    /// Identifier
    Id,
    /// Integer or decimal literal, optional exponent
    Number,
    /// "..."
    StringLiteral,
    /// '.'
    CharLiteral,
    /// + - * /
    Op,
    /// =
    Assign,
    /// == != <= >= < >
    RelOp,
    /// { } ( ) ;
    Symbol,
}

impl TokenKind {
    /// Check if a word is reserved
    pub fn is_keyword(s: &str) -> bool {
        KEYWORDS.contains(&s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Id => "ID",
            TokenKind::Number => "NUMBER",
            TokenKind::StringLiteral => "STRING_LITERAL",
            TokenKind::CharLiteral => "CHAR_LITERAL",
            TokenKind::Op => "OP",
            TokenKind::Assign => "ASSIGN",
            TokenKind::RelOp => "REL_OP",
            TokenKind::Symbol => "SYMBOL",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table() {
        assert!(TokenKind::is_keyword("for"));
        assert!(TokenKind::is_keyword("false"));
        assert!(!TokenKind::is_keyword("while"));
        assert!(!TokenKind::is_keyword("For"));
    }

    #[test]
    fn test_token_match() {
        let tok = Token::new(TokenKind::Symbol, ";", Span::dummy());
        assert!(tok.is(TokenKind::Symbol, Some(";")));
        assert!(tok.is(TokenKind::Symbol, None));
        assert!(!tok.is(TokenKind::Op, None));
        assert_eq!(tok.describe(), "';' (SYMBOL)");
        assert_eq!(tok.to_string(), "(SYMBOL, \";\")");
    }
}
