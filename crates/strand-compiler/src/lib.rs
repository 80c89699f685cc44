//! Strand compiler
//!
//! Lowers the parsed AST directly to x86-64 machine code: type inference
//! with a per-function stack-frame layout, an encoding-agnostic emitter
//! implemented by the SysV x86-64 encoder, three-phase compilation of
//! nested function expressions, per-node code generators, and the JIT
//! page loader. There is no bytecode intermediate.

pub mod codegen;
pub mod compiler;
pub mod emitter;
pub mod error;
pub mod infer;
pub mod jit;
pub mod manager;
pub mod types;
pub mod x86;

pub use compiler::Compiler;
pub use emitter::{Cond, Emitter, Reg};
pub use error::CompileError;
pub use infer::TypeInference;
pub use manager::{FuncRef, FuncState, FunctionCompilationManager, FunctionInfo};
pub use types::{cast_type, DataType, Scalar, NUMBER};
pub use x86::X86Emitter;
