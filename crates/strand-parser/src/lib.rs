//! Strand Language Parser
//!
//! Lexer and parser for the Strand programming language: source text to a
//! token stream to an AST, with function expressions collected into an
//! arena for the compilation manager.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, Parser, Program};
pub use token::{Span, Token};
