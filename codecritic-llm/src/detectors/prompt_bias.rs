//! Prompt bias: literals from the prompt hardcoded into the code paths
//! that decide output.

use super::{LinguisticDetector, LinguisticQuestion};
use crate::rules::{prompt_bias_scan, TierEvidence};
use crate::verifier::verify_prompt_bias;
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::parse::ParsedSource;
use codecritic_core::Pattern;

pub struct PromptBiasDetector;

impl LinguisticDetector for PromptBiasDetector {
    fn question_kind(&self) -> LinguisticQuestion {
        LinguisticQuestion::PromptBias
    }

    fn question_text(&self) -> &'static str {
        "Does the code hardcode example values from the prompt (quoted strings, \
         numbers, example sequences) instead of implementing the general \
         algorithm the prompt describes?"
    }

    fn pattern(&self) -> Pattern {
        Pattern::PromptBiasedCode
    }

    fn item_label(&self) -> &'static str {
        "values"
    }

    fn tier1(&self, prompt: &str, code: &str) -> TierEvidence {
        prompt_bias_scan(prompt, code)
    }

    fn tier2(
        &self,
        _parsed: &ParsedSource,
        tier1: &TierEvidence,
        candidates: &[LiteralCandidate],
    ) -> TierEvidence {
        verify_prompt_bias(tier1, candidates)
    }
}
