//! Parse error types

use crate::token::{Span, Token};
use thiserror::Error;

/// A parse error with location and contextual information.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at {span}: {message}")]
pub struct ParseError {
    /// The kind of error that occurred
    pub kind: ParseErrorKind,

    /// Source location of the error
    pub span: Span,

    /// Human-readable error message
    pub message: String,
}

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token found
    UnexpectedToken { expected: Vec<Token>, found: Token },

    /// Unexpected end of file
    UnexpectedEof { expected: Vec<Token> },

    /// Invalid syntax with a free-form reason
    InvalidSyntax { reason: String },
}

impl ParseError {
    /// Create an "unexpected token" error.
    pub fn unexpected_token(expected: Vec<Token>, found: Token, span: Span) -> Self {
        let message = if expected.len() == 1 {
            format!("expected {:?}, found {:?}", expected[0], found)
        } else {
            format!("expected one of {:?}, found {:?}", expected, found)
        };
        Self {
            kind: ParseErrorKind::UnexpectedToken { expected, found },
            span,
            message,
        }
    }

    /// Create an "unexpected EOF" error.
    pub fn unexpected_eof(expected: Vec<Token>, span: Span) -> Self {
        let message = format!("unexpected end of file, expected {:?}", expected);
        Self {
            kind: ParseErrorKind::UnexpectedEof { expected },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(reason: impl Into<String>, span: Span) -> Self {
        let reason = reason.into();
        Self {
            kind: ParseErrorKind::InvalidSyntax {
                reason: reason.clone(),
            },
            span,
            message: reason,
        }
    }
}
