//! Lexer and one-pass compiler for the Quill scripting language.
//!
//! `compile`/`compile_with_config` take a [`quill_core::Heap`], a file
//! name (for diagnostics), and a NUL-terminated source buffer, and
//! produce a compiled [`quill_core::Func`] ready for
//! `quill_runtime::Thread::call`. See spec.md §4.1/§4.2.

pub mod compiler;
pub mod config;
pub mod error;
pub mod lexer;
pub mod token;

pub use compiler::{compile, compile_with_config};
pub use config::CompilerConfig;
pub use error::{CompileError, CompileResult};
