//! Abstract syntax tree for the Strand language.
//!
//! Two node families: expressions (produce a value) and statements.
//! Function expressions live in a side arena owned by the compilation unit
//! and are referenced by index, so downstream passes (discovery, code
//! generation) can address them without pointers into the tree.

pub mod expression;
pub mod statement;
pub mod types;

pub use expression::*;
pub use statement::*;
pub use types::*;
