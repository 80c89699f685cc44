//! Strand CLI
//!
//! Compiles a source file to native code and executes it. Output is
//! whatever the program writes through the console helpers; the exit code
//! is 0 on success and non-zero on a compile or execute error.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use strand_compiler::Compiler;

#[derive(Parser)]
#[command(name = "strand")]
#[command(about = "Strand language JIT compiler and runtime")]
#[command(version)]
struct Cli {
    /// Source file to compile and run
    file: PathBuf,

    /// Print the emitted machine-code size instead of executing
    #[arg(long)]
    dump_code: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let mut compiler = Compiler::new();
    compiler
        .compile(&source)
        .with_context(|| format!("failed to compile {}", cli.file.display()))?;

    if cli.dump_code {
        println!("{} bytes of machine code", compiler.machine_code().len());
        return Ok(());
    }

    compiler
        .execute()
        .with_context(|| format!("failed to execute {}", cli.file.display()))?;
    Ok(())
}
