//! Wrong-return-shape detector: compares the shape the prompt asks for
//! against the value category of the last reachable return.
//!
//! This is one signal among several; the linguistic misinterpretation
//! detector confirms or discards it, so confidence stays low here.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::{expression_literal_kind, LiteralKind, ParsedSource};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WANTS_SEQUENCE: Regex =
        Regex::new(r"(?i)\b(a |the )?(list|array|sequence|tuple|collection)s?\b.*\b(of|with|containing)\b|return(s|ing)?\s+(a\s+)?(list|array|tuple)").unwrap();
    static ref WANTS_SCALAR: Regex =
        Regex::new(r"(?i)\breturn(s|ing)?\s+(the\s+|a\s+|an\s+)?(sum|count|number|average|mean|total|length|index|maximum|minimum|max|min|single value)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueCategory {
    Scalar,
    Sequence,
}

fn return_value_category(kind: LiteralKind) -> Option<ValueCategory> {
    if kind.is_sequence() {
        Some(ValueCategory::Sequence)
    } else if kind.is_numeric() || kind == LiteralKind::Str {
        Some(ValueCategory::Scalar)
    } else {
        None
    }
}

pub struct ReturnShapeDetector;

impl StaticDetector for ReturnShapeDetector {
    fn name(&self) -> &'static str {
        "return_shape"
    }

    fn detect(&self, prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let wants_sequence = WANTS_SEQUENCE.is_match(prompt);
        let wants_scalar = WANTS_SCALAR.is_match(prompt);
        if wants_sequence == wants_scalar {
            // No declared intent, or contradictory cues; nothing to compare.
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for func in parsed.function_defs() {
            let returns = func.return_statements();
            // Last reachable return; literal values only, since only those
            // have a statically certain category.
            let Some(last) = returns.last() else { continue };
            let Some(value) = last.named_child(0) else { continue };
            let Some(kind) = expression_literal_kind(value) else {
                continue;
            };
            let Some(category) = return_value_category(kind) else {
                continue;
            };

            let mismatch = (wants_sequence && category == ValueCategory::Scalar)
                || (wants_scalar && category == ValueCategory::Sequence);
            if !mismatch {
                continue;
            }
            let line = parsed.line(*last);
            let (wanted, got) = if wants_sequence {
                ("a sequence", "a scalar")
            } else {
                ("a single value", "a sequence")
            };
            findings.push(
                Finding::new(Pattern::Misinterpretation, 5, DetectionStage::Static)
                    .with_confidence(0.4)
                    .with_description(format!(
                        "The prompt asks for {wanted} but `{}` returns {got} at line {line}",
                        func.name
                    ))
                    .at_line(line)
                    .with_fix_hint(format!("Return {wanted} as requested"))
                    .with_evidence(serde_json::json!({
                        "function": func.name,
                        "requested": wanted,
                        "returned": got,
                    })),
            );
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(prompt: &str, source: &str) -> Vec<Finding> {
        let parsed = ParsedSource::parse(source).unwrap();
        ReturnShapeDetector.detect(prompt, &parsed).unwrap()
    }

    #[test]
    fn test_scalar_returned_for_requested_list() {
        let findings = run(
            "return a list of the squares",
            "def squares(n):\n    return 42\n",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::Misinterpretation);
        assert!(findings[0].confidence < 0.5);
    }

    #[test]
    fn test_matching_shape_passes() {
        let findings = run(
            "return a list of the squares",
            "def squares(n):\n    return [i * i for i in range(n)]\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_no_intent_no_findings() {
        assert!(run("do the thing", "def f():\n    return 3\n").is_empty());
    }

    #[test]
    fn test_non_literal_returns_are_not_judged() {
        let findings = run(
            "return a list of the squares",
            "def squares(n):\n    result = build(n)\n    return result\n",
        );
        assert!(findings.is_empty());
    }
}
