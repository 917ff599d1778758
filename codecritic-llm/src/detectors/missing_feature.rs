//! Missing feature: action/data-type/return-shape keywords present in the
//! prompt but absent from the code's identifiers, calls, and control flow.
//!
//! This detector also produces the auxiliary intent-match score reported
//! in the record extras.

use super::{LinguisticDetector, LinguisticQuestion};
use crate::rules::{missing_feature_scan, TierEvidence};
use crate::verifier::verify_missing_feature;
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::parse::ParsedSource;
use codecritic_core::Pattern;

pub struct MissingFeatureDetector;

impl LinguisticDetector for MissingFeatureDetector {
    fn question_kind(&self) -> LinguisticQuestion {
        LinguisticQuestion::MissingFeature
    }

    fn question_text(&self) -> &'static str {
        "Does the prompt ask for actions, data types, or return shapes that the \
         code never implements?"
    }

    fn pattern(&self) -> Pattern {
        Pattern::Misinterpretation
    }

    fn item_label(&self) -> &'static str {
        "issues"
    }

    fn tier1(&self, prompt: &str, code: &str) -> TierEvidence {
        missing_feature_scan(prompt, code)
    }

    fn tier2(
        &self,
        parsed: &ParsedSource,
        tier1: &TierEvidence,
        _candidates: &[LiteralCandidate],
    ) -> TierEvidence {
        verify_missing_feature(parsed, tier1)
    }
}
