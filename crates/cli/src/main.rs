//! Command-line host for Quill: reads each argument as a source file,
//! compiles it, and runs it with zero arguments through a shared heap
//! and thread. Spec.md §6 "CLI (informative)" — no flags beyond the
//! ones `clap` gives every binary for free (`--help`/`--version`).

use clap::Parser;
use quill_core::{Heap, Value};
use quill_runtime::Thread;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "quill")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run Quill source files")]
struct Cli {
    /// Source files to compile and run, in order.
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let heap = Heap::new();
    let global = Value::Struct(heap.alloc_struct());
    let mut thread = Thread::new(&heap);

    for path in &cli.files {
        let source = match read_source(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        };

        let func = match quill_compiler::compile(&heap, &path.display().to_string(), &source) {
            Ok(func) => func,
            Err(err) => {
                // Spec.md §7: compile diagnostics are written to stdout, not stderr.
                println!("{err}");
                return ExitCode::FAILURE;
            }
        };

        thread.call(func, global, &[]);
    }

    ExitCode::SUCCESS
}

/// Reads `path` into a buffer with an appended NUL — the lexer requires
/// a zero-terminated source buffer (spec.md §4.1).
fn read_source(path: &PathBuf) -> std::io::Result<Vec<u8>> {
    let mut bytes = std::fs::read(path)?;
    bytes.push(0);
    Ok(bytes)
}
