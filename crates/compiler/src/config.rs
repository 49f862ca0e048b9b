//! Optional compiler configuration.
//!
//! Mirrors the teacher's builder-pattern `CompilerConfig`
//! (`crates/compiler/src/config.rs`), trimmed to the one knob this
//! compiler actually varies: whether a compile unit gets its own
//! `tracing` span.

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    trace: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn trace(&self) -> bool {
        self.trace
    }
}
