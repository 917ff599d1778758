//! The nine static detectors.
//!
//! Each detector is a pure function of the prompt and the parsed source; it
//! emits finding records for exactly one taxonomy pattern. Detectors never
//! see each other's output; reconciliation is the classifier's job.

use crate::models::finding::Finding;
use crate::parse::ParsedSource;

pub mod syntax;
pub mod hallucination;
pub mod incomplete;
pub mod silly_mistake;
pub mod wrong_attribute;
pub mod wrong_input_type;
pub mod prompt_literals;
pub mod missing_corner_case;
pub mod return_shape;

pub use prompt_literals::{candidate_literals, LiteralCandidate};

pub trait StaticDetector {
    fn name(&self) -> &'static str;

    fn detect(&self, prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>>;
}

pub struct StaticDetectorRegistry {
    detectors: Vec<Box<dyn StaticDetector + Send + Sync>>,
}

impl Default for StaticDetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticDetectorRegistry {
    pub fn new() -> Self {
        let detectors: Vec<Box<dyn StaticDetector + Send + Sync>> = vec![
            Box::new(syntax::SyntaxDetector),
            Box::new(hallucination::HallucinationDetector),
            Box::new(incomplete::IncompleteGenerationDetector),
            Box::new(silly_mistake::SillyMistakeDetector),
            Box::new(wrong_attribute::WrongAttributeDetector),
            Box::new(wrong_input_type::WrongInputTypeDetector),
            Box::new(missing_corner_case::MissingCornerCaseDetector),
            Box::new(return_shape::ReturnShapeDetector),
        ];
        Self { detectors }
    }

    /// Runs every detector, containing individual failures so one broken
    /// detector cannot suppress the others. Returns the findings plus the
    /// `(detector, error)` pairs for the stage log.
    pub fn detect_all(
        &self,
        prompt: &str,
        parsed: &ParsedSource,
    ) -> (Vec<Finding>, Vec<(String, String)>) {
        let mut findings = Vec::new();
        let mut errors = Vec::new();
        for detector in &self.detectors {
            match detector.detect(prompt, parsed) {
                Ok(found) => findings.extend(found),
                Err(e) => {
                    tracing::warn!(detector = detector.name(), error = %e, "static detector failed");
                    errors.push((detector.name().to_string(), e.to_string()));
                }
            }
        }
        (findings, errors)
    }
}
