//! CodeCritic Analysis - Two-Phase Orchestration
//!
//! Phase A runs the static and dynamic layers synchronously, classifies
//! provisionally, persists the record with `processing` status, and
//! returns it. Phase B runs the four linguistic detectors in a detached
//! background task, re-classifies with all three signal sources, and
//! commits the single `processing -> complete` transition.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod orchestrator;

pub use orchestrator::{CriticConfig, Orchestrator};

/// Result type for orchestration
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

/// Error types for orchestration
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The submitted input cannot be analyzed at all
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence failure: fatal to the request, no partial records
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Core engine failure
    #[error("Core error: {0}")]
    Core(#[from] codecritic_core::Error),
}
