//! Wrong-input-type detector: literal arguments that cannot satisfy a
//! known numeric or container function.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::{expression_literal_kind, LiteralKind, ParsedSource};

/// Functions whose single argument must be numeric.
const NUMERIC_FUNCTIONS: [&str; 12] = [
    "abs",
    "round",
    "math.sqrt",
    "math.floor",
    "math.ceil",
    "math.log",
    "math.log2",
    "math.log10",
    "math.sin",
    "math.cos",
    "math.tan",
    "math.exp",
];

/// Functions whose single argument must be a container/iterable.
const CONTAINER_FUNCTIONS: [&str; 4] = ["len", "sum", "sorted", "reversed"];

pub struct WrongInputTypeDetector;

impl StaticDetector for WrongInputTypeDetector {
    fn name(&self) -> &'static str {
        "wrong_input_type"
    }

    fn detect(&self, _prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for node in parsed.all_nodes() {
            if node.kind() != "call" {
                continue;
            }
            let Some(function) = node.child_by_field_name("function") else {
                continue;
            };
            let callee = parsed.text(function).to_string();
            let numeric = NUMERIC_FUNCTIONS.contains(&callee.as_str());
            let container = CONTAINER_FUNCTIONS.contains(&callee.as_str());
            if !numeric && !container {
                continue;
            }
            let Some(args) = node.child_by_field_name("arguments") else {
                continue;
            };
            let first_arg = (0..args.named_child_count())
                .filter_map(|i| args.named_child(i))
                .next();
            let Some(arg) = first_arg else { continue };
            let Some(kind) = expression_literal_kind(arg) else {
                continue;
            };

            let incompatible = if numeric {
                matches!(
                    kind,
                    LiteralKind::Str
                        | LiteralKind::List
                        | LiteralKind::Tuple
                        | LiteralKind::Dict
                        | LiteralKind::Set
                        | LiteralKind::NoneLit
                )
            } else {
                matches!(kind, LiteralKind::Int | LiteralKind::Float | LiteralKind::NoneLit | LiteralKind::Bool)
            };
            if !incompatible {
                continue;
            }

            let line = parsed.line(node);
            let arg_text = parsed.text(arg);
            let expected = if numeric { "a number" } else { "a container" };
            findings.push(
                Finding::new(Pattern::WrongInputType, 6, DetectionStage::Static)
                    .with_confidence(0.75)
                    .with_description(format!(
                        "`{callee}({arg_text})` at line {line} passes a literal that is not {expected}; this raises TypeError at runtime"
                    ))
                    .at_line(line)
                    .with_fix_hint(format!("Pass {expected} to `{callee}`"))
                    .with_evidence(serde_json::json!({
                        "function": callee,
                        "argument": arg_text,
                    })),
            );
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Vec<Finding> {
        let parsed = ParsedSource::parse(source).unwrap();
        WrongInputTypeDetector.detect("", &parsed).unwrap()
    }

    #[test]
    fn test_string_to_sqrt_flagged() {
        let findings = run("import math\nx = math.sqrt(\"4\")\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::WrongInputType);
    }

    #[test]
    fn test_len_of_int_flagged() {
        let findings = run("n = len(5)\n");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_valid_calls_pass() {
        assert!(run("import math\nx = math.sqrt(4)\ny = len([1, 2])\nz = abs(-3)\n").is_empty());
    }

    #[test]
    fn test_variable_arguments_are_not_judged() {
        // Only literals are judged statically; variables are the dynamic
        // layer's problem.
        assert!(run("def f(x):\n    return len(x)\n").is_empty());
    }
}
