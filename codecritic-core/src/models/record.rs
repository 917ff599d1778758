//! The analysis record: the persistent aggregate for one (prompt, code) submission.

use super::finding::Finding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record lifecycle status. Transitions `Processing -> Complete` exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Processing,
    Complete,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::Processing => write!(f, "processing"),
            AnalysisStatus::Complete => write!(f, "complete"),
        }
    }
}

/// Outcome of one pipeline stage, kept for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLog {
    pub stage: String,
    pub success: bool,
    pub error: Option<String>,
    pub elapsed_seconds: f64,
}

impl StageLog {
    pub fn ok(stage: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self {
            stage: stage.into(),
            success: true,
            error: None,
            elapsed_seconds,
        }
    }

    pub fn failed(stage: impl Into<String>, error: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self {
            stage: stage.into(),
            success: false,
            error: Some(error.into()),
            elapsed_seconds,
        }
    }
}

/// Structured dump of the four linguistic detectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinguisticExtras {
    /// TF-IDF cosine between prompt tokens and code identifiers; below ~0.40
    /// suggests a significant semantic gap.
    pub intent_match_score: Option<f64>,
    pub unprompted_features: Vec<String>,
    pub missing_features: Vec<String>,
    pub hardcoded_values: Vec<String>,
}

/// Aggregate result for one `(prompt, code)` submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub prompt: String,
    pub code: String,
    /// Tag of the analyzed source language; always "python" in this build.
    pub language: String,
    pub status: AnalysisStatus,
    pub has_bugs: bool,
    /// Maximum severity across findings, 0 when there are none.
    pub overall_severity: u8,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub stage_logs: Vec<StageLog>,
    pub linguistic_extras: LinguisticExtras,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(prompt: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            code: code.into(),
            language: "python".to_string(),
            status: AnalysisStatus::Processing,
            has_bugs: false,
            overall_severity: 0,
            summary: String::new(),
            findings: Vec::new(),
            stage_logs: Vec::new(),
            linguistic_extras: LinguisticExtras::default(),
            created_at: Utc::now(),
        }
    }

    /// Re-derives `has_bugs` and `overall_severity` from `findings`,
    /// maintaining the record invariants after any findings change.
    pub fn refresh_rollups(&mut self) {
        self.has_bugs = !self.findings.is_empty();
        self.overall_severity = self
            .findings
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(0);
    }

    /// Mean confidence across findings, 0.0 when there are none.
    pub fn confidence(&self) -> f64 {
        if self.findings.is_empty() {
            return 0.0;
        }
        let total: f64 = self.findings.iter().map(|f| f.confidence).sum();
        total / self.findings.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::{DetectionStage, Finding, Pattern};

    #[test]
    fn test_new_record_is_clean_and_processing() {
        let record = AnalysisRecord::new("add two numbers", "def add(a,b):\n    return a+b");
        assert_eq!(record.status, AnalysisStatus::Processing);
        assert!(!record.has_bugs);
        assert_eq!(record.overall_severity, 0);
        assert_eq!(record.language, "python");
    }

    #[test]
    fn test_refresh_rollups_tracks_findings() {
        let mut record = AnalysisRecord::new("p", "c");
        record.findings.push(Finding::new(
            Pattern::MissingCornerCase,
            5,
            DetectionStage::Static,
        ));
        record.findings.push(Finding::new(
            Pattern::HallucinatedObject,
            8,
            DetectionStage::Dynamic,
        ));
        record.refresh_rollups();
        assert!(record.has_bugs);
        assert_eq!(record.overall_severity, 8);

        record.findings.clear();
        record.refresh_rollups();
        assert!(!record.has_bugs);
        assert_eq!(record.overall_severity, 0);
    }

    #[test]
    fn test_confidence_is_mean_of_findings() {
        let mut record = AnalysisRecord::new("p", "c");
        assert_eq!(record.confidence(), 0.0);
        record.findings.push(
            Finding::new(Pattern::SillyMistake, 5, DetectionStage::Static).with_confidence(0.4),
        );
        record.findings.push(
            Finding::new(Pattern::SillyMistake, 5, DetectionStage::Static).with_confidence(0.8),
        );
        assert!((record.confidence() - 0.6).abs() < 1e-9);
    }
}
