//! Error handling for tacc

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal compiler error. Lexing and parsing stop at the first one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("Unexpected character: {ch} at line {line}, column {column}")]
    UnexpectedChar {
        ch: char,
        line: usize,
        column: usize,
        span: Span,
    },

    // ==================== Parser Errors ====================

    #[error("Expected {expected} but found {found} at position {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
        span: Option<Span>,
    },

    #[error("Unexpected token {found} at position {position}. Expected start of a statement (for, type, or ID).")]
    ExpectedStatement {
        found: String,
        position: usize,
        span: Option<Span>,
    },

    #[error("Unexpected token {found} at position {position}. Expected a valid factor (ID, Number, Literal, '(', or unary op).")]
    ExpectedFactor {
        found: String,
        position: usize,
        span: Option<Span>,
    },

    #[error("Expected type but found '{found}'")]
    ExpectedType { found: String, span: Option<Span> },

    #[error("Nesting deeper than {limit} levels at position {position}")]
    NestingTooDeep {
        limit: usize,
        position: usize,
        span: Option<Span>,
    },

    // ==================== Pipeline Errors ====================

    #[error("{0} semantic error(s) found; TAC generation aborted")]
    SemanticErrors(usize),
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedChar { span, .. } => Some(*span),
            Self::UnexpectedToken { span, .. } => *span,
            Self::ExpectedStatement { span, .. } => *span,
            Self::ExpectedFactor { span, .. } => *span,
            Self::ExpectedType { span, .. } => *span,
            Self::NestingTooDeep { span, .. } => *span,
            Self::SemanticErrors(_) => None,
        }
    }

    /// Whether the error was raised by the lexer
    pub fn is_lexical(&self) -> bool {
        matches!(self, Self::UnexpectedChar { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_text() {
        let err = Error::UnexpectedChar {
            ch: '@',
            line: 3,
            column: 7,
            span: Span::new(20, 21, 3, 7),
        };
        assert_eq!(err.to_string(), "Unexpected character: @ at line 3, column 7");
        assert!(err.is_lexical());
        assert_eq!(err.span().map(|s| s.column), Some(7));
    }

    #[test]
    fn test_parse_error_text() {
        let err = Error::UnexpectedToken {
            expected: "';' (SYMBOL)".to_string(),
            found: "end of input".to_string(),
            position: 4,
            span: None,
        };
        assert_eq!(
            err.to_string(),
            "Expected ';' (SYMBOL) but found end of input at position 4"
        );
        assert!(!err.is_lexical());
    }
}
