//! The ten-pattern defect taxonomy and the Finding record.

use serde::{Deserialize, Serialize};

/// The ten canonical defect patterns.
///
/// These tags are a closed sum and a stable output contract; unknown tags
/// are rejected at persistence boundaries via [`Pattern::from_str`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    SyntaxError,
    HallucinatedObject,
    IncompleteGeneration,
    SillyMistake,
    WrongAttribute,
    WrongInputType,
    NonPromptedConsideration,
    PromptBiasedCode,
    MissingCornerCase,
    Misinterpretation,
}

impl Pattern {
    /// All ten tags in catalog order.
    pub const ALL: [Pattern; 10] = [
        Pattern::SyntaxError,
        Pattern::HallucinatedObject,
        Pattern::IncompleteGeneration,
        Pattern::SillyMistake,
        Pattern::WrongAttribute,
        Pattern::WrongInputType,
        Pattern::NonPromptedConsideration,
        Pattern::PromptBiasedCode,
        Pattern::MissingCornerCase,
        Pattern::Misinterpretation,
    ];

    /// The canonical snake_case tag string.
    pub fn tag(&self) -> &'static str {
        match self {
            Pattern::SyntaxError => "syntax_error",
            Pattern::HallucinatedObject => "hallucinated_object",
            Pattern::IncompleteGeneration => "incomplete_generation",
            Pattern::SillyMistake => "silly_mistake",
            Pattern::WrongAttribute => "wrong_attribute",
            Pattern::WrongInputType => "wrong_input_type",
            Pattern::NonPromptedConsideration => "non_prompted_consideration",
            Pattern::PromptBiasedCode => "prompt_biased_code",
            Pattern::MissingCornerCase => "missing_corner_case",
            Pattern::Misinterpretation => "misinterpretation",
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for Pattern {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Pattern::ALL
            .iter()
            .copied()
            .find(|p| p.tag() == s)
            .ok_or_else(|| crate::Error::UnknownPattern(s.to_string()))
    }
}

/// Which stage of the pipeline produced a finding.
///
/// The classifier is the only producer of `Composite`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStage {
    Static,
    Dynamic,
    Linguistic,
    Composite,
}

impl std::fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DetectionStage::Static => "static",
            DetectionStage::Dynamic => "dynamic",
            DetectionStage::Linguistic => "linguistic",
            DetectionStage::Composite => "composite",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for DetectionStage {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "static" => Ok(DetectionStage::Static),
            "dynamic" => Ok(DetectionStage::Dynamic),
            "linguistic" => Ok(DetectionStage::Linguistic),
            "composite" => Ok(DetectionStage::Composite),
            other => Err(crate::Error::Store(format!(
                "unknown detection stage: {other}"
            ))),
        }
    }
}

/// Severity band label for a 0-10 severity score.
///
/// Bands: critical >= 8, high 6-7, medium 4-5, low 1-3.
pub fn severity_label(severity: u8) -> &'static str {
    match severity {
        8..=u8::MAX => "critical",
        6..=7 => "high",
        4..=5 => "medium",
        1..=3 => "low",
        0 => "none",
    }
}

/// A single classified defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub pattern: Pattern,
    /// 0-10; see [`severity_label`] for bands.
    pub severity: u8,
    /// 0.0-1.0
    pub confidence: f64,
    pub description: String,
    /// "Line N" anchor when the defect has one.
    pub location: Option<String>,
    pub column: Option<usize>,
    pub fix_hint: Option<String>,
    pub detection_stage: DetectionStage,
    /// Identifier/literal/exception details the explainer embellishes with.
    #[serde(default)]
    pub evidence: serde_json::Value,
}

impl Finding {
    pub fn new(pattern: Pattern, severity: u8, stage: DetectionStage) -> Self {
        Self {
            pattern,
            severity: severity.min(10),
            confidence: 0.5,
            description: String::new(),
            location: None,
            column: None,
            fix_hint: None,
            detection_stage: stage,
            evidence: serde_json::json!({}),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.location = Some(format!("Line {line}"));
        self
    }

    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = evidence;
        self
    }

    /// Line number parsed back out of the "Line N" anchor.
    pub fn line(&self) -> Option<usize> {
        self.location
            .as_deref()
            .and_then(|loc| loc.strip_prefix("Line "))
            .and_then(|n| n.split(',').next())
            .and_then(|n| n.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tag_round_trip() {
        for pattern in Pattern::ALL {
            assert_eq!(Pattern::from_str(pattern.tag()).unwrap(), pattern);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(Pattern::from_str("other_error").is_err());
        assert!(Pattern::from_str("execution_timeout").is_err());
        assert!(Pattern::from_str("").is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_tags() {
        let json = serde_json::to_string(&Pattern::PromptBiasedCode).unwrap();
        assert_eq!(json, "\"prompt_biased_code\"");
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(severity_label(10), "critical");
        assert_eq!(severity_label(8), "critical");
        assert_eq!(severity_label(7), "high");
        assert_eq!(severity_label(5), "medium");
        assert_eq!(severity_label(1), "low");
        assert_eq!(severity_label(0), "none");
    }

    #[test]
    fn test_finding_line_anchor() {
        let finding = Finding::new(Pattern::SyntaxError, 9, DetectionStage::Static).at_line(3);
        assert_eq!(finding.location.as_deref(), Some("Line 3"));
        assert_eq!(finding.line(), Some(3));
    }

    #[test]
    fn test_severity_capped_at_ten() {
        let finding = Finding::new(Pattern::HallucinatedObject, 12, DetectionStage::Dynamic);
        assert_eq!(finding.severity, 10);
    }
}
