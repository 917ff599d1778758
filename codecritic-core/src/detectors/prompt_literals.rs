//! Static surface for the prompt-bias question.
//!
//! This stage only collects the literals that could plausibly be
//! example-overfit values; judging them against the prompt is the
//! linguistic layer's job.

use crate::parse::{LiteralContext, LiteralKind, ParsedSource};
use serde::{Deserialize, Serialize};

/// A literal that sits in an output-deciding position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralCandidate {
    pub text: String,
    /// 1-based line.
    pub line: usize,
    /// "string" | "number" | "sequence" | "mapping"
    pub category: String,
    /// "return" | "comparison" | "assignment"
    pub context: String,
}

fn category(kind: LiteralKind) -> Option<&'static str> {
    match kind {
        LiteralKind::Str => Some("string"),
        LiteralKind::Int | LiteralKind::Float => Some("number"),
        LiteralKind::List | LiteralKind::Tuple | LiteralKind::Set => Some("sequence"),
        LiteralKind::Dict => Some("mapping"),
        LiteralKind::Bool | LiteralKind::NoneLit => None,
    }
}

fn context_name(context: LiteralContext) -> Option<&'static str> {
    match context {
        LiteralContext::Return => Some("return"),
        LiteralContext::Comparison => Some("comparison"),
        LiteralContext::Assignment => Some("assignment"),
        LiteralContext::CallArgument | LiteralContext::Other => None,
    }
}

/// Collects literals appearing as operands of a return, comparison, or
/// assignment outside the `if __name__ == "__main__":` harness block.
pub fn candidate_literals(parsed: &ParsedSource) -> Vec<LiteralCandidate> {
    let mut candidates = Vec::new();
    for site in parsed.literal_sites() {
        if site.in_main_block {
            continue;
        }
        let Some(category) = category(site.kind) else {
            continue;
        };
        let Some(context) = context_name(site.context) else {
            continue;
        };
        // Docstrings land as string literals in Other context and are
        // already excluded; skip trivial numbers that decide nothing.
        if category == "number" && matches!(site.text.as_str(), "0" | "1" | "-1") {
            continue;
        }
        candidates.push(LiteralCandidate {
            text: site.text.clone(),
            line: site.line,
            category: category.to_string(),
            context: context.to_string(),
        });
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Vec<LiteralCandidate> {
        let parsed = ParsedSource::parse(source).unwrap();
        candidate_literals(&parsed)
    }

    #[test]
    fn test_returned_list_is_a_candidate() {
        let candidates = run("def sort(x):\n    return [1,2,3]\n");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, "sequence");
        assert_eq!(candidates[0].context, "return");
    }

    #[test]
    fn test_main_block_literals_excluded() {
        let source = "def f(x):\n    return x\n\nif __name__ == \"__main__\":\n    print(f([3, 1, 2]))\n";
        assert!(run(source).is_empty());
    }

    #[test]
    fn test_trivial_numbers_excluded() {
        assert!(run("def f(x):\n    y = 0\n    return y\n").is_empty());
    }

    #[test]
    fn test_comparison_string_is_a_candidate() {
        let candidates = run("def check(name):\n    if name == \"alice\":\n        return True\n    return False\n");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, "string");
        assert_eq!(candidates[0].context, "comparison");
    }
}
