//! Misinterpretation: the code solves a different problem than the prompt
//! requested (wrong return shape, print/return polarity reversed, missing
//! conditional selection, wrong algorithm).

use super::{LinguisticDetector, LinguisticQuestion};
use crate::rules::{misinterpretation_scan, TierEvidence};
use crate::verifier::verify_misinterpretation;
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::parse::ParsedSource;
use codecritic_core::Pattern;

pub struct MisinterpretationDetector;

impl LinguisticDetector for MisinterpretationDetector {
    fn question_kind(&self) -> LinguisticQuestion {
        LinguisticQuestion::Misinterpretation
    }

    fn question_text(&self) -> &'static str {
        "Does the code fundamentally solve a different problem than the prompt \
         describes? Consider return shape, print-versus-return polarity, \
         requested filtering, and the algorithm itself."
    }

    fn pattern(&self) -> Pattern {
        Pattern::Misinterpretation
    }

    fn item_label(&self) -> &'static str {
        "reasons"
    }

    fn tier1(&self, prompt: &str, code: &str) -> TierEvidence {
        misinterpretation_scan(prompt, code)
    }

    fn tier2(
        &self,
        parsed: &ParsedSource,
        tier1: &TierEvidence,
        _candidates: &[LiteralCandidate],
    ) -> TierEvidence {
        verify_misinterpretation(parsed, tier1)
    }
}
