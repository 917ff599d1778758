//! Static analyzer: parses the source once and runs all static detectors.

use crate::detectors::{candidate_literals, LiteralCandidate, StaticDetectorRegistry};
use crate::models::finding::Finding;
use crate::parse::ParsedSource;
use crate::Result;

/// Output of the static stage.
#[derive(Debug, Default)]
pub struct StaticReport {
    pub findings: Vec<Finding>,
    /// Candidate literals for the prompt-bias question (judged linguistically).
    pub literal_candidates: Vec<LiteralCandidate>,
    /// True when the source failed to parse cleanly.
    pub syntax_error: bool,
    /// `(detector, error)` pairs for detectors that failed internally.
    pub detector_errors: Vec<(String, String)>,
}

pub struct StaticAnalyzer {
    registry: StaticDetectorRegistry,
}

impl Default for StaticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticAnalyzer {
    pub fn new() -> Self {
        Self {
            registry: StaticDetectorRegistry::new(),
        }
    }

    /// Parses `code` and runs the nine detectors over it. A failing
    /// detector is logged into the report; it never suppresses the others.
    pub fn analyze(&self, prompt: &str, code: &str) -> Result<StaticReport> {
        if code.trim().is_empty() {
            return Ok(StaticReport::default());
        }

        let parsed = ParsedSource::parse(code)?;
        let (findings, detector_errors) = self.registry.detect_all(prompt, &parsed);
        let literal_candidates = candidate_literals(&parsed);
        tracing::debug!(
            findings = findings.len(),
            candidates = literal_candidates.len(),
            "static analysis complete"
        );
        Ok(StaticReport {
            syntax_error: parsed.syntax_error.is_some(),
            findings,
            literal_candidates,
            detector_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::Pattern;

    #[test]
    fn test_empty_code_produces_empty_report() {
        let report = StaticAnalyzer::new().analyze("anything", "   \n").unwrap();
        assert!(report.findings.is_empty());
        assert!(!report.syntax_error);
    }

    #[test]
    fn test_clean_code_produces_no_findings() {
        let report = StaticAnalyzer::new()
            .analyze("add two numbers", "def add(a,b):\n    return a+b\n")
            .unwrap();
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_syntax_error_is_reported_and_flagged() {
        let report = StaticAnalyzer::new()
            .analyze("add two numbers", "def add(a,b)\n    return a+b")
            .unwrap();
        assert!(report.syntax_error);
        assert!(report
            .findings
            .iter()
            .any(|f| f.pattern == Pattern::SyntaxError));
    }

    #[test]
    fn test_multiple_detectors_contribute() {
        let source = "def divide(a,b):\n    return a/b\n\ndef f(n):\n    return calc.factorial(n)\n";
        let report = StaticAnalyzer::new().analyze("divide things", source).unwrap();
        let patterns: Vec<Pattern> = report.findings.iter().map(|f| f.pattern).collect();
        assert!(patterns.contains(&Pattern::MissingCornerCase));
        assert!(patterns.contains(&Pattern::HallucinatedObject));
    }
}
