//! CodeCritic Core - Defect Analysis Engine and Data Structures
//!
//! This crate provides the core analysis engine for CodeCritic, including:
//! - The ten-pattern defect taxonomy and finding/record data model
//! - The Python parse layer (tree-sitter based, with partial-strip recovery)
//! - The nine static detectors and the static analyzer that runs them
//! - The taxonomy classifier that merges static, dynamic, and linguistic signals
//! - The explainer that renders findings for humans
//! - The record store contract with SQLite and in-memory implementations

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::multiple_crate_versions,  // Common in large dependency trees
    clippy::module_name_repetitions,  // Often necessary for clarity
)]

pub mod models;
pub mod parse;
pub mod detectors;
pub mod analyzer;
pub mod classifier;
pub mod explainer;
pub mod store;

// Re-export commonly used types for convenience
pub use models::{
    finding::{severity_label, DetectionStage, Finding, Pattern},
    record::{AnalysisRecord, AnalysisStatus, LinguisticExtras, StageLog},
};
pub use analyzer::{StaticAnalyzer, StaticReport};
pub use classifier::{DynamicSignal, ExceptionKind, TaxonomyClassifier};
pub use explainer::Explainer;
pub use parse::ParsedSource;
pub use store::{Feedback, MemoryStore, RecordStore, SqliteStore};

/// Result type used throughout CodeCritic core
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for CodeCritic core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Detector internal error
    #[error("Detector error: {detector}: {message}")]
    Detector { detector: String, message: String },

    /// Classification error
    #[error("Classification error: {0}")]
    Classify(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(String),

    /// Unknown taxonomy tag rejected at a persistence boundary
    #[error("Unknown pattern tag: {0}")]
    UnknownPattern(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
