//! Test harness for end-to-end compilation and execution.

use strand_compiler::{CompileError, Compiler};

/// Compile source to machine code without executing it.
pub fn compile(source: &str) -> Result<Compiler, CompileError> {
    let mut compiler = Compiler::new();
    compiler.compile(source)?;
    Ok(compiler)
}

/// Compile, install, and execute; returns the entry point's result.
///
/// Executions are serialized: the executable-memory base and the function
/// registries are process-wide, so concurrent installs would race.
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
pub fn run(source: &str) -> i64 {
    use std::sync::Mutex;
    static JIT_LOCK: Mutex<()> = Mutex::new(());
    let _guard = JIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Compiler::compile_and_run(source).expect("compile and run")
}

/// Assert that the program's `__main` returns the expected value.
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
pub fn expect_i64(source: &str, expected: i64) {
    assert_eq!(run(source), expected, "program: {}", source);
}
