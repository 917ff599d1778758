//! Explainer: pattern-keyed templates for human-readable output.

use crate::models::finding::{severity_label, Finding, Pattern};

/// Default prose per pattern, used when a detector supplied none.
fn pattern_template(pattern: Pattern) -> (&'static str, &'static str) {
    match pattern {
        Pattern::SyntaxError => (
            "The code does not parse as valid Python",
            "Fix the reported syntax error first",
        ),
        Pattern::HallucinatedObject => (
            "The code references a name that does not exist",
            "Define or import the missing name",
        ),
        Pattern::IncompleteGeneration => (
            "Part of the code is a placeholder rather than an implementation",
            "Complete the unfinished section",
        ),
        Pattern::SillyMistake => (
            "The code contains a small logic slip a human reviewer would catch",
            "Re-read the flagged expression carefully",
        ),
        Pattern::WrongAttribute => (
            "An attribute is accessed on a value that does not have it",
            "Use the access style the value's type supports",
        ),
        Pattern::WrongInputType => (
            "A function receives an argument of an incompatible type",
            "Convert or correct the argument before the call",
        ),
        Pattern::NonPromptedConsideration => (
            "The code does things the prompt never asked for",
            "Remove the unrequested behavior or confirm it is wanted",
        ),
        Pattern::PromptBiasedCode => (
            "The code hardcodes example values from the prompt instead of computing the general answer",
            "Replace the hardcoded values with the general algorithm",
        ),
        Pattern::MissingCornerCase => (
            "A boundary input is not guarded and will fail at runtime",
            "Add the missing guard and decide the boundary behavior",
        ),
        Pattern::Misinterpretation => (
            "The code solves a different problem than the prompt describes",
            "Re-read the prompt and align the algorithm with it",
        ),
    }
}

/// The stable pattern catalog: `(tag, description, fix hint)` per pattern.
pub fn pattern_catalog() -> Vec<(Pattern, &'static str, &'static str)> {
    Pattern::ALL
        .iter()
        .map(|&pattern| {
            let (description, fix_hint) = pattern_template(pattern);
            (pattern, description, fix_hint)
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct Explainer;

impl Explainer {
    pub fn new() -> Self {
        Self
    }

    /// Fills empty descriptions and fix hints from the pattern templates,
    /// embellishing with evidence the detectors captured.
    pub fn explain(&self, findings: &mut [Finding]) {
        for finding in findings.iter_mut() {
            let (description, fix_hint) = pattern_template(finding.pattern);
            if finding.description.is_empty() {
                finding.description = match finding
                    .evidence
                    .get("identifier")
                    .and_then(|v| v.as_str())
                {
                    Some(identifier) => format!("{description} (`{identifier}`)"),
                    None => description.to_string(),
                };
            }
            if finding.fix_hint.is_none() {
                finding.fix_hint = Some(fix_hint.to_string());
            }
        }
    }

    /// The single-paragraph record summary.
    pub fn summarize(&self, findings: &[Finding], intent_match: Option<f64>) -> String {
        if findings.is_empty() {
            return "No defects detected; the code appears to satisfy the prompt.".to_string();
        }

        let max_severity = findings.iter().map(|f| f.severity).max().unwrap_or(0);
        let mut tags: Vec<&str> = findings.iter().map(|f| f.pattern.tag()).collect();
        tags.sort_unstable();
        tags.dedup();

        let lead = findings
            .iter()
            .max_by(|a, b| {
                (a.severity, a.confidence)
                    .partial_cmp(&(b.severity, b.confidence))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|f| f.description.clone())
            .unwrap_or_default();

        let mut summary = format!(
            "Found {} issue{} ({} severity): {}. Patterns involved: {}.",
            findings.len(),
            if findings.len() == 1 { "" } else { "s" },
            severity_label(max_severity),
            lead,
            tags.join(", ")
        );
        if let Some(score) = intent_match {
            if score < 0.4 {
                summary.push_str(&format!(
                    " The prompt/code intent match is low ({score:.2}), suggesting the code may not address the request."
                ));
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::DetectionStage;

    #[test]
    fn test_explain_fills_blanks_only() {
        let mut findings = vec![
            Finding::new(Pattern::HallucinatedObject, 8, DetectionStage::Static)
                .with_evidence(serde_json::json!({"identifier": "calc"})),
            Finding::new(Pattern::MissingCornerCase, 5, DetectionStage::Static)
                .with_description("Division by `b` is unguarded")
                .with_fix_hint("Guard it"),
        ];
        Explainer::new().explain(&mut findings);
        assert!(findings[0].description.contains("calc"));
        assert!(findings[0].fix_hint.is_some());
        assert_eq!(findings[1].description, "Division by `b` is unguarded");
        assert_eq!(findings[1].fix_hint.as_deref(), Some("Guard it"));
    }

    #[test]
    fn test_clean_summary() {
        let summary = Explainer::new().summarize(&[], None);
        assert!(summary.contains("No defects"));
    }

    #[test]
    fn test_summary_names_patterns_and_band() {
        let findings = vec![
            Finding::new(Pattern::SyntaxError, 9, DetectionStage::Static)
                .with_description("The code fails to parse"),
        ];
        let summary = Explainer::new().summarize(&findings, None);
        assert!(summary.contains("critical"));
        assert!(summary.contains("syntax_error"));
    }

    #[test]
    fn test_low_intent_match_is_mentioned() {
        let findings = vec![
            Finding::new(Pattern::PromptBiasedCode, 6, DetectionStage::Linguistic)
                .with_description("hardcoded example output"),
        ];
        let summary = Explainer::new().summarize(&findings, Some(0.2));
        assert!(summary.contains("0.20"));
    }
}
