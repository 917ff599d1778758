//! Non-prompted consideration: behavior in the code the prompt never
//! asked for (debug prints, logging, validation, error handling,
//! authorization, caching, sorting).

use super::{LinguisticDetector, LinguisticQuestion};
use crate::rules::{npc_scan, TierEvidence};
use crate::verifier::verify_npc;
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::parse::ParsedSource;
use codecritic_core::Pattern;

pub struct NpcDetector;

impl LinguisticDetector for NpcDetector {
    fn question_kind(&self) -> LinguisticQuestion {
        LinguisticQuestion::NonPromptedConsideration
    }

    fn question_text(&self) -> &'static str {
        "Does the code include features or behavior the prompt never asked for, \
         such as debug prints, logging, input validation, error handling, \
         authorization checks, caching, or sorting?"
    }

    fn pattern(&self) -> Pattern {
        Pattern::NonPromptedConsideration
    }

    fn item_label(&self) -> &'static str {
        "features"
    }

    fn tier1(&self, prompt: &str, code: &str) -> TierEvidence {
        npc_scan(prompt, code)
    }

    fn tier2(
        &self,
        parsed: &ParsedSource,
        tier1: &TierEvidence,
        _candidates: &[LiteralCandidate],
    ) -> TierEvidence {
        verify_npc(parsed, tier1)
    }
}
