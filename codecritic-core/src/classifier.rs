//! Taxonomy classifier: merges static, dynamic, and linguistic signals
//! into one deduplicated finding list.
//!
//! Merge rules, applied in order:
//! 1. Syntax errors suppress everything else.
//! 2. A dynamic name-unresolved confirms a static hallucination of the
//!    same identifier: one finding, severity bumped, confidence maxed.
//! 3. Dynamic wrong-attribute / wrong-input-type override static surface
//!    suggestions on the same line.
//! 4. Linguistic findings pass through untouched.
//! 5. More than three findings synthesize a composite misinterpretation.
//! 6. Deduplicate by `(pattern, location)`.

use crate::models::finding::{DetectionStage, Finding, Pattern};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref QUOTED_NAME: Regex = Regex::new(r"'([A-Za-z_][A-Za-z0-9_]*)'").unwrap();
}

/// Exception categories the dynamic harness reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /// Attribute-access failure
    AttributeError,
    /// Type incompatibility
    TypeError,
    /// Name unresolved at runtime
    NameError,
    /// Division by zero
    ZeroDivision,
    /// Indexing, key-not-found, or invalid value
    Lookup,
    /// Anything else
    Other,
    /// Wall-timeout in the sandbox
    Timeout,
}

impl ExceptionKind {
    /// Classifies a Python exception type name.
    pub fn from_exception_name(name: &str) -> Self {
        match name {
            "AttributeError" => ExceptionKind::AttributeError,
            "TypeError" => ExceptionKind::TypeError,
            "NameError" | "UnboundLocalError" => ExceptionKind::NameError,
            "ZeroDivisionError" => ExceptionKind::ZeroDivision,
            "IndexError" | "KeyError" | "ValueError" | "LookupError" => ExceptionKind::Lookup,
            _ => ExceptionKind::Other,
        }
    }

    /// `(pattern, severity seed)` this kind maps onto. `Other` and
    /// `Timeout` have no taxonomy tag of their own; they land on
    /// missing-corner-case at reduced severity so the closed pattern sum
    /// holds at the persistence boundary.
    fn hypothesis(self) -> (Pattern, u8) {
        match self {
            ExceptionKind::AttributeError => (Pattern::WrongAttribute, 6),
            ExceptionKind::TypeError => (Pattern::WrongInputType, 6),
            ExceptionKind::NameError => (Pattern::HallucinatedObject, 8),
            ExceptionKind::ZeroDivision => (Pattern::MissingCornerCase, 5),
            ExceptionKind::Lookup => (Pattern::MissingCornerCase, 5),
            ExceptionKind::Other => (Pattern::MissingCornerCase, 4),
            ExceptionKind::Timeout => (Pattern::MissingCornerCase, 3),
        }
    }
}

/// The sparse record the dynamic analyzer hands to the classifier: at most
/// one runtime failure hypothesis.
#[derive(Debug, Clone)]
pub struct DynamicSignal {
    pub kind: ExceptionKind,
    /// Python exception type name, or "timeout".
    pub exception_name: String,
    pub message: String,
    /// 1-based line inside the analyzed source, when attributable.
    pub line: Option<usize>,
}

impl DynamicSignal {
    /// The identifier a NameError complains about, when extractable.
    pub fn unresolved_name(&self) -> Option<String> {
        if self.kind != ExceptionKind::NameError {
            return None;
        }
        QUOTED_NAME
            .captures(&self.message)
            .map(|c| c[1].to_string())
    }
}

#[derive(Debug, Default)]
pub struct TaxonomyClassifier;

impl TaxonomyClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        static_findings: &[Finding],
        dynamic: Option<&DynamicSignal>,
        linguistic: &[Finding],
    ) -> Vec<Finding> {
        // Rule 1: a parse failure invalidates every other signal.
        let syntax: Vec<Finding> = static_findings
            .iter()
            .filter(|f| f.pattern == Pattern::SyntaxError)
            .cloned()
            .collect();
        if !syntax.is_empty() {
            return syntax;
        }

        let mut findings: Vec<Finding> = static_findings.to_vec();

        if let Some(signal) = dynamic {
            self.merge_dynamic(&mut findings, signal);
        }

        // Rule 4: linguistic findings are independent; they never suppress
        // and are never suppressed.
        findings.extend_from_slice(linguistic);

        // Rule 5: many distinct defects usually mean the model solved the
        // wrong problem; synthesize the composite signal.
        if findings.len() > 3 {
            findings.push(self.composite_misinterpretation(&findings));
        }

        // Rule 6.
        dedup_by_pattern_and_location(findings)
    }

    fn merge_dynamic(&self, findings: &mut Vec<Finding>, signal: &DynamicSignal) {
        let (pattern, seed) = signal.kind.hypothesis();

        // Rule 2: runtime NameError for the same identifier confirms the
        // static hallucination.
        if let Some(name) = signal.unresolved_name() {
            if let Some(existing) = findings.iter_mut().find(|f| {
                f.pattern == Pattern::HallucinatedObject
                    && f.evidence.get("identifier").and_then(|v| v.as_str()) == Some(name.as_str())
            }) {
                let merged_severity = existing.severity.max(seed).saturating_add(1).min(10);
                existing.severity = merged_severity;
                existing.confidence = existing.confidence.max(0.9);
                existing.detection_stage = DetectionStage::Dynamic;
                existing.description = format!(
                    "{} (confirmed at runtime: {})",
                    existing.description, signal.message
                );
                return;
            }
        }

        let mut finding = Finding::new(pattern, seed, DetectionStage::Dynamic)
            .with_confidence(0.9)
            .with_description(describe_dynamic(signal))
            .with_evidence(serde_json::json!({
                "exception": signal.exception_name,
                "message": signal.message,
            }));
        if let Some(line) = signal.line {
            finding = finding.at_line(line);
        }

        // Rule 3: the observed runtime failure outranks static surface
        // suggestions of the same pattern on the same line.
        if matches!(pattern, Pattern::WrongAttribute | Pattern::WrongInputType) {
            findings.retain(|f| {
                !(f.pattern == pattern
                    && f.detection_stage == DetectionStage::Static
                    && f.line() == signal.line)
            });
        }
        findings.push(finding);
    }

    fn composite_misinterpretation(&self, findings: &[Finding]) -> Finding {
        let mut severities: Vec<u8> = findings.iter().map(|f| f.severity).collect();
        severities.sort_unstable();
        let median = if severities.len() % 2 == 1 {
            severities[severities.len() / 2]
        } else {
            let hi = severities[severities.len() / 2];
            let lo = severities[severities.len() / 2 - 1];
            (u16::from(hi) + u16::from(lo)).div_ceil(2) as u8
        };

        let mut patterns: Vec<&str> = findings.iter().map(|f| f.pattern.tag()).collect();
        patterns.sort_unstable();
        patterns.dedup();

        Finding::new(Pattern::Misinterpretation, median, DetectionStage::Composite)
            .with_confidence(0.6)
            .with_description(format!(
                "The code shows {} distinct defect signals ({}); taken together they suggest the prompt was misunderstood",
                findings.len(),
                patterns.join(", ")
            ))
            .with_evidence(serde_json::json!({ "component_patterns": patterns }))
    }
}

fn describe_dynamic(signal: &DynamicSignal) -> String {
    match signal.kind {
        ExceptionKind::Timeout => {
            "Execution exceeded the wall timeout; the code may loop forever on some inputs"
                .to_string()
        }
        _ => {
            let at = signal
                .line
                .map(|l| format!(" at line {l}"))
                .unwrap_or_default();
            format!(
                "Running the code raised {}{at}: {}",
                signal.exception_name, signal.message
            )
        }
    }
}

/// Rule 6: within a `(pattern, location)` group, keep the highest-confidence
/// entry and fold the other descriptions into it.
fn dedup_by_pattern_and_location(findings: Vec<Finding>) -> Vec<Finding> {
    let mut order: Vec<(Pattern, Option<String>)> = Vec::new();
    let mut groups: HashMap<(Pattern, Option<String>), Finding> = HashMap::new();

    for finding in findings {
        let key = (finding.pattern, finding.location.clone());
        match groups.get_mut(&key) {
            None => {
                order.push(key.clone());
                groups.insert(key, finding);
            }
            Some(existing) => {
                let (keep, fold) = if finding.confidence > existing.confidence {
                    (finding, existing.clone())
                } else {
                    (existing.clone(), finding)
                };
                let mut merged = keep;
                if !fold.description.is_empty() && !merged.description.contains(&fold.description) {
                    merged.description = format!("{}; {}", merged.description, fold.description);
                }
                merged.severity = merged.severity.max(fold.severity);
                *existing = merged;
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_finding(pattern: Pattern, severity: u8, line: usize) -> Finding {
        Finding::new(pattern, severity, DetectionStage::Static)
            .with_confidence(0.7)
            .with_description(format!("{pattern} at line {line}"))
            .at_line(line)
    }

    #[test]
    fn test_syntax_suppresses_everything_else() {
        let statics = vec![
            static_finding(Pattern::SyntaxError, 9, 1),
            static_finding(Pattern::MissingCornerCase, 5, 2),
        ];
        let linguistic = vec![static_finding(Pattern::Misinterpretation, 6, 3)];
        let result = TaxonomyClassifier::new().classify(&statics, None, &linguistic);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pattern, Pattern::SyntaxError);
    }

    #[test]
    fn test_dynamic_confirms_static_hallucination() {
        let statics = vec![static_finding(Pattern::HallucinatedObject, 7, 2)
            .with_evidence(serde_json::json!({"identifier": "calc"}))];
        let signal = DynamicSignal {
            kind: ExceptionKind::NameError,
            exception_name: "NameError".to_string(),
            message: "name 'calc' is not defined".to_string(),
            line: Some(2),
        };
        let result = TaxonomyClassifier::new().classify(&statics, Some(&signal), &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pattern, Pattern::HallucinatedObject);
        // max(static 7, dynamic seed 8) + 1
        assert_eq!(result[0].severity, 9);
        assert_eq!(result[0].detection_stage, DetectionStage::Dynamic);
    }

    #[test]
    fn test_confirmation_bumps_severity_and_caps() {
        let statics = vec![static_finding(Pattern::HallucinatedObject, 9, 2)
            .with_evidence(serde_json::json!({"identifier": "ghost"}))];
        let signal = DynamicSignal {
            kind: ExceptionKind::NameError,
            exception_name: "NameError".to_string(),
            message: "name 'ghost' is not defined".to_string(),
            line: Some(2),
        };
        let result = TaxonomyClassifier::new().classify(&statics, Some(&signal), &[]);
        assert_eq!(result[0].severity, 10);
        assert!(result[0].confidence >= 0.9);
    }

    #[test]
    fn test_dynamic_overrides_static_same_line() {
        let statics = vec![static_finding(Pattern::WrongAttribute, 7, 4)];
        let signal = DynamicSignal {
            kind: ExceptionKind::AttributeError,
            exception_name: "AttributeError".to_string(),
            message: "'dict' object has no attribute 'name'".to_string(),
            line: Some(4),
        };
        let result = TaxonomyClassifier::new().classify(&statics, Some(&signal), &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].detection_stage, DetectionStage::Dynamic);
    }

    #[test]
    fn test_corner_case_confirmation_merges_by_location() {
        let statics = vec![static_finding(Pattern::MissingCornerCase, 5, 2)];
        let signal = DynamicSignal {
            kind: ExceptionKind::ZeroDivision,
            exception_name: "ZeroDivisionError".to_string(),
            message: "division by zero".to_string(),
            line: Some(2),
        };
        let result = TaxonomyClassifier::new().classify(&statics, Some(&signal), &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pattern, Pattern::MissingCornerCase);
        // Dedup keeps the runtime observation's confidence.
        assert!(result[0].confidence >= 0.9);
    }

    #[test]
    fn test_timeout_maps_into_taxonomy() {
        let signal = DynamicSignal {
            kind: ExceptionKind::Timeout,
            exception_name: "timeout".to_string(),
            message: "wall timeout exceeded".to_string(),
            line: None,
        };
        let result = TaxonomyClassifier::new().classify(&[], Some(&signal), &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pattern, Pattern::MissingCornerCase);
        assert_eq!(result[0].severity, 3);
    }

    #[test]
    fn test_linguistic_findings_pass_through() {
        let linguistic = vec![
            Finding::new(Pattern::Misinterpretation, 7, DetectionStage::Linguistic)
                .with_confidence(0.8)
                .with_description("returns sum instead of average"),
        ];
        let result = TaxonomyClassifier::new().classify(&[], None, &linguistic);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].detection_stage, DetectionStage::Linguistic);
    }

    #[test]
    fn test_composite_emitted_above_three_findings() {
        let statics = vec![
            static_finding(Pattern::MissingCornerCase, 4, 1),
            static_finding(Pattern::SillyMistake, 5, 2),
            static_finding(Pattern::WrongAttribute, 6, 3),
            static_finding(Pattern::HallucinatedObject, 7, 4),
        ];
        let result = TaxonomyClassifier::new().classify(&statics, None, &[]);
        let composite: Vec<&Finding> = result
            .iter()
            .filter(|f| f.detection_stage == DetectionStage::Composite)
            .collect();
        assert_eq!(composite.len(), 1);
        assert_eq!(composite[0].pattern, Pattern::Misinterpretation);
        // Median of 4,5,6,7 rounds to 6.
        assert_eq!(composite[0].severity, 6);
        assert!(composite[0].description.contains("silly_mistake"));
    }

    #[test]
    fn test_no_composite_at_three_or_fewer() {
        let statics = vec![
            static_finding(Pattern::MissingCornerCase, 4, 1),
            static_finding(Pattern::SillyMistake, 5, 2),
            static_finding(Pattern::WrongAttribute, 6, 3),
        ];
        let result = TaxonomyClassifier::new().classify(&statics, None, &[]);
        assert!(result
            .iter()
            .all(|f| f.detection_stage != DetectionStage::Composite));
    }

    #[test]
    fn test_dedup_keeps_highest_confidence_and_merges_descriptions() {
        let a = static_finding(Pattern::MissingCornerCase, 5, 2)
            .with_confidence(0.5)
            .with_description("statically unguarded");
        let b = static_finding(Pattern::MissingCornerCase, 4, 2)
            .with_confidence(0.8)
            .with_description("observed at runtime");
        let result = dedup_by_pattern_and_location(vec![a, b]);
        assert_eq!(result.len(), 1);
        assert!((result[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(result[0].severity, 5);
        assert!(result[0].description.contains("statically unguarded"));
        assert!(result[0].description.contains("observed at runtime"));
    }

    #[test]
    fn test_empty_inputs_classify_to_empty() {
        assert!(TaxonomyClassifier::new().classify(&[], None, &[]).is_empty());
    }
}
