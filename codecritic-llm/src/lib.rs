//! CodeCritic LLM - Linguistic Analysis of Prompt/Code Semantics
//!
//! Four detectors, one per semantic question (non-prompted consideration,
//! prompt bias, missing feature, misinterpretation), each running a
//! three-tier cascade:
//! - Tier 1: regex/textual scans (high recall, low precision)
//! - Tier 2: AST cross-checks that discard refuted candidates
//! - Tier 3: an external language model rendering the verdict
//!
//! Tiers 1 and 2 are evidence producers only; the model (or, when no
//! provider responds, the fallback rule) is the single verdict authority.
//! Disagreements are never vote-averaged across tiers.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod detectors;
pub mod intent;
pub mod reasoner;
pub mod rules;
pub mod verifier;

pub use detectors::{
    DetectorVerdict, LinguisticAnalyzer, LinguisticQuestion, LinguisticReport, VerdictAuthority,
};
pub use intent::intent_match_score;
pub use reasoner::{ProviderConfig, Reasoner, ReasonerConfig, ReasonerQuestion, ReasonerVerdict};
pub use rules::TierEvidence;

/// Result type for linguistic operations
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Error types for linguistic operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The model reply did not match the declared schema
    #[error("Malformed model reply: {0}")]
    MalformedReply(String),

    /// No provider produced a usable verdict
    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),

    /// No provider credentials are configured
    #[error("No providers configured")]
    NoProviders,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
