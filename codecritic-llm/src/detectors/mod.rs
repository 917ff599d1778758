//! The four linguistic detectors and the shared three-tier runner.
//!
//! Every detector produces the same verdict shape; only the item field
//! name differs by question. Tier 1 and tier 2 are evidence producers; the
//! model (or the fallback rule when no provider answers) is the single
//! verdict authority. Disagreements between tiers are never averaged away.

use crate::intent::intent_match_score;
use crate::reasoner::{reply_schema, Reasoner, ReasonerQuestion};
use crate::rules::TierEvidence;
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::parse::ParsedSource;
use codecritic_core::{DetectionStage, Finding, LinguisticExtras, Pattern};
use serde::Serialize;
use tracing::{debug, warn};

pub mod misinterpretation;
pub mod missing_feature;
pub mod npc;
pub mod prompt_bias;

/// The four semantic questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinguisticQuestion {
    NonPromptedConsideration,
    PromptBias,
    MissingFeature,
    Misinterpretation,
}

/// Who rendered the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictAuthority {
    Llm,
    Fallback,
}

/// One detector's verdict, shared shape across the four questions.
#[derive(Debug, Clone)]
pub struct DetectorVerdict {
    pub question: LinguisticQuestion,
    pub found: bool,
    pub items: Vec<String>,
    pub count: usize,
    pub confidence: f64,
    pub severity: u8,
    pub summary: String,
    pub verdict_by: VerdictAuthority,
    pub tier1: TierEvidence,
    pub tier2: TierEvidence,
}

impl DetectorVerdict {
    /// JSON dump using the question's item field name
    /// (issues / features / values / reasons).
    pub fn to_json(&self, item_label: &str) -> serde_json::Value {
        serde_json::json!({
            "found": self.found,
            item_label: self.items,
            "count": self.count,
            "confidence": self.confidence,
            "severity": self.severity,
            "summary": self.summary,
            "verdict_by": match self.verdict_by {
                VerdictAuthority::Llm => "llm",
                VerdictAuthority::Fallback => "fallback",
            },
            "evidence": {
                "tier1": self.tier1.items,
                "tier2": self.tier2.items,
            },
        })
    }
}

/// One linguistic detector: a question, a pattern, and the two evidence
/// tiers. The runner owns tier 3.
pub trait LinguisticDetector: Send + Sync {
    fn question_kind(&self) -> LinguisticQuestion;

    /// The question posed explicitly to the model.
    fn question_text(&self) -> &'static str;

    fn pattern(&self) -> Pattern;

    /// Field name for the items list in the verdict dump.
    fn item_label(&self) -> &'static str;

    fn tier1(&self, prompt: &str, code: &str) -> TierEvidence;

    fn tier2(
        &self,
        parsed: &ParsedSource,
        tier1: &TierEvidence,
        candidates: &[LiteralCandidate],
    ) -> TierEvidence;
}

/// Output of the linguistic stage.
#[derive(Debug, Default)]
pub struct LinguisticReport {
    pub findings: Vec<Finding>,
    pub extras: LinguisticExtras,
    /// Verdict dumps keyed by question, for the record's structured extras.
    pub verdicts: Vec<serde_json::Value>,
}

pub struct LinguisticAnalyzer {
    reasoner: Reasoner,
    detectors: Vec<Box<dyn LinguisticDetector>>,
}

impl LinguisticAnalyzer {
    pub fn new(reasoner: Reasoner) -> Self {
        let detectors: Vec<Box<dyn LinguisticDetector>> = vec![
            Box::new(npc::NpcDetector),
            Box::new(prompt_bias::PromptBiasDetector),
            Box::new(missing_feature::MissingFeatureDetector),
            Box::new(misinterpretation::MisinterpretationDetector),
        ];
        Self {
            reasoner,
            detectors,
        }
    }

    /// Runs the four detectors in sequence. Each runs tier 1, tier 2, and
    /// tier 3; a tier-3 failure degrades that one detector to its fallback
    /// verdict and never aborts the stage.
    pub async fn analyze(
        &self,
        prompt: &str,
        code: &str,
        candidates: &[LiteralCandidate],
    ) -> LinguisticReport {
        let mut report = LinguisticReport {
            extras: LinguisticExtras {
                intent_match_score: Some(intent_match_score(prompt, code)),
                ..LinguisticExtras::default()
            },
            ..LinguisticReport::default()
        };

        let parsed = match ParsedSource::parse(code) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "linguistic stage proceeding without a tree");
                None
            }
        };

        for detector in &self.detectors {
            let tier1 = detector.tier1(prompt, code);
            let tier2 = match &parsed {
                Some(parsed) => detector.tier2(parsed, &tier1, candidates),
                None => TierEvidence::default(),
            };
            let verdict = self.render_verdict(detector.as_ref(), prompt, code, tier1, tier2).await;

            let values = best_values(&verdict);
            match detector.question_kind() {
                LinguisticQuestion::NonPromptedConsideration => {
                    report.extras.unprompted_features = values;
                }
                LinguisticQuestion::MissingFeature => {
                    report.extras.missing_features = values;
                }
                LinguisticQuestion::PromptBias => {
                    report.extras.hardcoded_values = values;
                }
                LinguisticQuestion::Misinterpretation => {}
            }

            if verdict.found && verdict.severity > 0 {
                report.findings.push(
                    Finding::new(detector.pattern(), verdict.severity, DetectionStage::Linguistic)
                        .with_confidence(verdict.confidence)
                        .with_description(verdict.summary.clone())
                        .with_evidence(serde_json::json!({
                            "issues": verdict.items.clone(),
                            "verdict_by": match verdict.verdict_by {
                                VerdictAuthority::Llm => "llm",
                                VerdictAuthority::Fallback => "fallback",
                            },
                        })),
                );
            }
            report.verdicts.push(verdict.to_json(detector.item_label()));
        }
        report
    }

    async fn render_verdict(
        &self,
        detector: &dyn LinguisticDetector,
        prompt: &str,
        code: &str,
        tier1: TierEvidence,
        tier2: TierEvidence,
    ) -> DetectorVerdict {
        if self.reasoner.has_providers() {
            let question = ReasonerQuestion {
                prompt: prompt.to_string(),
                code: code.to_string(),
                question: detector.question_text().to_string(),
                tier1_evidence: tier1.items.clone(),
                tier2_evidence: tier2.items.clone(),
                reply_schema: reply_schema(),
            };
            match self.reasoner.ask(&question).await {
                Ok(reply) => {
                    debug!(question = ?detector.question_kind(), found = reply.found, "llm verdict");
                    return DetectorVerdict {
                        question: detector.question_kind(),
                        found: reply.found,
                        count: reply.issues.len(),
                        items: reply.issues,
                        confidence: tier1.confidence.max(tier2.confidence).max(0.75),
                        severity: reply.severity,
                        summary: reply.summary,
                        verdict_by: VerdictAuthority::Llm,
                        tier1,
                        tier2,
                    };
                }
                Err(e) => {
                    warn!(question = ?detector.question_kind(), error = %e, "tier 3 degraded to fallback");
                }
            }
        }
        fallback_verdict(detector, tier1, tier2)
    }
}

/// The degraded verdict when no provider responds: the union of tier-1 and
/// tier-2 issues, confidence the max of the tiers, severity tier-2's when
/// it produced evidence and tier-1's otherwise.
fn fallback_verdict(
    detector: &dyn LinguisticDetector,
    tier1: TierEvidence,
    tier2: TierEvidence,
) -> DetectorVerdict {
    let mut items = tier1.items.clone();
    for item in &tier2.items {
        if !items.contains(item) {
            items.push(item.clone());
        }
    }
    let found = !items.is_empty();
    let severity = if found {
        if tier2.is_empty() {
            tier1.severity
        } else {
            tier2.severity
        }
    } else {
        0
    };
    let summary = if found {
        format!(
            "{} ({} signal{} from rule and tree evidence)",
            items[0],
            items.len(),
            if items.len() == 1 { "" } else { "s" }
        )
    } else {
        "No evidence for this question.".to_string()
    };
    DetectorVerdict {
        question: detector.question_kind(),
        found,
        count: items.len(),
        items,
        confidence: if found {
            tier1.confidence.max(tier2.confidence)
        } else {
            0.0
        },
        severity,
        summary,
        verdict_by: VerdictAuthority::Fallback,
        tier1,
        tier2,
    }
}

/// Short feature values for the record extras: tier-2's survivors when it
/// ran, tier-1's candidates otherwise.
fn best_values(verdict: &DetectorVerdict) -> Vec<String> {
    if verdict.tier2.values.is_empty() {
        verdict.tier1.values.clone()
    } else {
        verdict.tier2.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::ReasonerConfig;
    use codecritic_core::detectors::candidate_literals;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fallback_analyzer() -> LinguisticAnalyzer {
        LinguisticAnalyzer::new(Reasoner::new(ReasonerConfig::default()))
    }

    fn candidates_for(code: &str) -> Vec<LiteralCandidate> {
        candidate_literals(&ParsedSource::parse(code).unwrap())
    }

    #[tokio::test]
    async fn test_clean_code_produces_no_findings() {
        let code = "def add(a, b):\n    return a + b\n";
        let report = fallback_analyzer()
            .analyze("add two numbers", code, &candidates_for(code))
            .await;
        assert!(report.findings.is_empty(), "findings: {:?}", report.findings);
        assert_eq!(report.verdicts.len(), 4);
    }

    #[tokio::test]
    async fn test_prompt_bias_seed_scenario() {
        let code = "def sort(x):\n    return [1,2,3]\n";
        let report = fallback_analyzer()
            .analyze("sort the list, e.g., [3,1,2]", code, &candidates_for(code))
            .await;
        let bias: Vec<&Finding> = report
            .findings
            .iter()
            .filter(|f| f.pattern == Pattern::PromptBiasedCode)
            .collect();
        assert_eq!(bias.len(), 1);
        assert!((5..=7).contains(&bias[0].severity));
        assert!(report.extras.intent_match_score.unwrap() < 0.5);
        assert!(report
            .extras
            .hardcoded_values
            .iter()
            .any(|v| v.contains("1,2,3")));
    }

    #[tokio::test]
    async fn test_misinterpretation_seed_scenario() {
        let code = "def avg(nums):\n    return sum(nums)\n";
        let report = fallback_analyzer()
            .analyze(
                "return the average of a list of numbers",
                code,
                &candidates_for(code),
            )
            .await;
        let finding = report
            .findings
            .iter()
            .find(|f| f.pattern == Pattern::Misinterpretation)
            .expect("expected a misinterpretation finding");
        assert!((6..=9).contains(&finding.severity));
        assert!(finding.description.contains("sum"));
    }

    #[tokio::test]
    async fn test_fallback_tag_set_when_no_providers() {
        let code = "def avg(nums):\n    return sum(nums)\n";
        let report = fallback_analyzer()
            .analyze("return the average", code, &candidates_for(code))
            .await;
        for verdict in &report.verdicts {
            assert_eq!(verdict["verdict_by"], serde_json::json!("fallback"));
        }
    }

    #[tokio::test]
    async fn test_llm_verdict_is_the_single_authority() {
        // The model says "not found" even though tier evidence exists; the
        // verdict stands and no finding is emitted for that question.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"found": false, "issues": [], "severity": 0, "summary": "intended behavior"}"#,
            ))
            .mount(&server)
            .await;
        let config = ReasonerConfig {
            providers: vec![crate::reasoner::ProviderConfig {
                name: "primary".to_string(),
                url: server.uri(),
                api_key: "k".to_string(),
                model: "m".to_string(),
            }],
            backoff: std::time::Duration::from_millis(5),
            ..ReasonerConfig::default()
        };
        let analyzer = LinguisticAnalyzer::new(Reasoner::new(config));
        let code = "def avg(nums):\n    return sum(nums)\n";
        let report = analyzer
            .analyze("return the average of the numbers", code, &candidates_for(code))
            .await;
        assert!(report.findings.is_empty());
        for verdict in &report.verdicts {
            assert_eq!(verdict["verdict_by"], serde_json::json!("llm"));
        }
    }

    #[tokio::test]
    async fn test_main_block_literal_never_reported_as_bias() {
        let code = "def sort(x):\n    return sorted(x)\n\nif __name__ == \"__main__\":\n    print(sort([3, 1, 2]))\n";
        let report = fallback_analyzer()
            .analyze("sort the list, e.g., [3,1,2]", code, &candidates_for(code))
            .await;
        assert!(report
            .findings
            .iter()
            .all(|f| f.pattern != Pattern::PromptBiasedCode));
        assert!(report.extras.hardcoded_values.is_empty());
    }
}
