//! Compiler error types.

use strand_parser::{LexError, ParseError, Span};
use thiserror::Error;

/// Any error that aborts compilation. There are no retries.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lex error: {}", format_lex_errors(.0))]
    Lex(Vec<LexError>),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("type error at {span}: {message}")]
    Type { message: String, span: Span },

    #[error("compilation manager error: {0}")]
    Manager(String),

    #[error("link error: unresolved label '{0}'")]
    Link(String),

    #[error("jit error: {0}")]
    Jit(String),
}

impl CompileError {
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        CompileError::Type {
            message: message.into(),
            span,
        }
    }
}

fn format_lex_errors(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
