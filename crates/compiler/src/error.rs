//! Compile-time diagnostics.
//!
//! The teacher's codegen module (`crates/compiler/src/codegen/error.rs`)
//! hand-rolls a small `Display`/`Error`-implementing enum rather than
//! reaching for `thiserror` — this crate's dependency graph has no
//! `thiserror`, so `CompileError` follows the same shape. Diagnostics are
//! always fatal (spec.md §7): there is exactly one error type, no
//! recoverable-vs-fatal split, and no wrapped cause.

use std::fmt;

/// A fatal compile-time diagnostic: `file:line: message`, per spec.md
/// §4.2 "Error policy" and §7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub file: String,
    /// 1-based line, ready to print.
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(file: impl Into<String>, line_0based: usize, message: impl Into<String>) -> Self {
        CompileError {
            file: file.into(),
            line: line_0based + 1,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;
