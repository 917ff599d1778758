//! CodeCritic Sandbox - Isolated Execution of Candidate Programs
//!
//! This crate runs the analyzed program in an isolated process and turns
//! runtime failures into classifier hypotheses:
//! - Sandbox executor with container and subprocess back-ends
//! - Deny-set import scanning for the weak back-end
//! - Instrumented harness generation (namespace isolation, smoke calls)
//! - The dynamic analyzer mapping captured exceptions to patterns

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod executor;
pub mod harness;
pub mod dynamic;

pub use dynamic::{DynamicAnalyzer, DynamicReport};
pub use executor::{
    parse_last_json, scan_denied_imports, ExecutionOutcome, SandboxBackend, SandboxConfig,
    SandboxExecutor,
};
pub use harness::build_harness;

/// Result type for sandbox operations
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

/// Error types for sandbox operations
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// I/O error while staging or launching the process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured back-end cannot run
    #[error("Sandbox back-end unavailable: {0}")]
    BackendUnavailable(String),

    /// JSON handling error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
