//! Tier 2: the AST verifier.
//!
//! Structural cross-checks of tier-1 candidates. A candidate survives only
//! when the tree actually supports it: a `print(` matched inside a comment
//! is discarded, a hardcoded-literal claim needs the literal in a
//! return/comparison/assignment outside the self-test block, a shape claim
//! needs a reachable return of that category.

use crate::rules::TierEvidence;
use codecritic_core::detectors::LiteralCandidate;
use codecritic_core::parse::{identifier_words, ParsedSource};
use std::collections::HashSet;

fn call_targets(parsed: &ParsedSource) -> Vec<(String, bool)> {
    let mut targets = Vec::new();
    for node in parsed.all_nodes() {
        if node.kind() != "call" {
            continue;
        }
        if let Some(function) = node.child_by_field_name("function") {
            targets.push((
                parsed.text(function).to_string(),
                parsed.in_main_block(node),
            ));
        }
    }
    targets
}

fn has_call(parsed: &ParsedSource, predicate: impl Fn(&str) -> bool) -> bool {
    call_targets(parsed)
        .iter()
        .any(|(name, in_main)| !in_main && predicate(name))
}

fn has_node_kind(parsed: &ParsedSource, kind: &str) -> bool {
    parsed.all_nodes().iter().any(|n| n.kind() == kind)
}

fn identifier_word_set(parsed: &ParsedSource) -> HashSet<String> {
    let mut words = HashSet::new();
    for node in parsed.all_nodes() {
        if node.kind() == "identifier" {
            words.extend(identifier_words(parsed.text(node)));
        }
    }
    words
}

/// Verifies non-prompted-consideration candidates against the tree.
pub fn verify_npc(parsed: &ParsedSource, tier1: &TierEvidence) -> TierEvidence {
    let mut verified = TierEvidence {
        confidence: 0.6,
        severity: 4,
        ..TierEvidence::default()
    };
    let mut seen: HashSet<&str> = HashSet::new();
    for value in &tier1.values {
        if !seen.insert(value.as_str()) {
            continue;
        }
        let confirmed = match value.as_str() {
            "print" => has_call(parsed, |name| name == "print"),
            "logging" => has_call(parsed, |name| {
                name.starts_with("logging.") || name.starts_with("logger.") || name.starts_with("log.")
            }),
            "sorting" => has_call(parsed, |name| name == "sorted" || name.ends_with(".sort")),
            "caching" => {
                identifier_word_set(parsed).contains("cache")
                    || identifier_word_set(parsed).contains("memo")
            }
            "authorization" => identifier_word_set(parsed)
                .iter()
                .any(|w| matches!(w.as_str(), "auth" | "authorize" | "token" | "permission")),
            "validation" => {
                has_call(parsed, |name| name == "isinstance")
                    || has_node_kind(parsed, "raise_statement")
            }
            "error_handling" => has_node_kind(parsed, "try_statement"),
            _ => false,
        };
        if confirmed {
            verified.items.push(format!(
                "the tree confirms {} the prompt never asked for",
                value.replace('_', " ")
            ));
            verified.values.push(value.clone());
        }
    }
    verified
}

/// Verifies prompt-bias candidates against the static layer's literal
/// index: a value is hardcoded only when it decides output, meaning it
/// appears as an operand of a return, comparison, or assignment outside
/// the `if __name__ == "__main__":` block.
pub fn verify_prompt_bias(tier1: &TierEvidence, candidates: &[LiteralCandidate]) -> TierEvidence {
    let mut verified = TierEvidence {
        confidence: 0.7,
        severity: 6,
        ..TierEvidence::default()
    };
    for value in &tier1.values {
        let matched = candidates.iter().find(|candidate| {
            if candidate.text.contains(value.as_str()) {
                return true;
            }
            // Sequences match on constituents regardless of ordering.
            let mut wanted: Vec<&str> = numbers_of(value);
            let mut got: Vec<&str> = numbers_of(&candidate.text);
            if wanted.len() < 2 || wanted.len() != got.len() {
                return false;
            }
            wanted.sort_unstable();
            got.sort_unstable();
            wanted == got
        });
        if let Some(candidate) = matched {
            verified.items.push(format!(
                "{} is hardcoded in a {} at line {}",
                value, candidate.context, candidate.line
            ));
            verified.values.push(candidate.text.clone());
        }
    }
    verified
}

fn numbers_of(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .filter(|s| !s.is_empty() && s.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

/// Re-checks missing-feature candidates against identifiers and calls
/// only, so a keyword "satisfied" by a comment stays missing.
pub fn verify_missing_feature(parsed: &ParsedSource, tier1: &TierEvidence) -> TierEvidence {
    let mut verified = TierEvidence {
        confidence: 0.65,
        severity: 5,
        ..TierEvidence::default()
    };
    let words = identifier_word_set(parsed);
    let source = parsed.source();
    for keyword in &tier1.values {
        let satisfied_structurally = match keyword.as_str() {
            "sort" => has_call(parsed, |n| n == "sorted" || n.ends_with(".sort")),
            "reverse" => has_call(parsed, |n| n == "reversed" || n.ends_with(".reverse")),
            "average" | "mean" => source.contains('/'),
            "sum" => has_call(parsed, |n| n == "sum") || source.contains('+'),
            "count" => has_call(parsed, |n| n == "len" || n.ends_with(".count")),
            "maximum" => has_call(parsed, |n| n == "max"),
            "minimum" => has_call(parsed, |n| n == "min"),
            "divide" => source.contains('/'),
            "multiply" => source.contains('*'),
            "subtract" => source.contains('-'),
            _ => words.contains(keyword.as_str()),
        };
        if !satisfied_structurally {
            verified.items.push(format!(
                "no identifier, call, or operator in the tree implements \"{keyword}\""
            ));
            verified.values.push(keyword.clone());
        }
    }
    verified
}

/// Verifies misinterpretation cues structurally.
pub fn verify_misinterpretation(parsed: &ParsedSource, tier1: &TierEvidence) -> TierEvidence {
    let mut verified = TierEvidence {
        confidence: 0.7,
        severity: 7,
        ..TierEvidence::default()
    };
    let has_return = has_node_kind(parsed, "return_statement");
    let has_print = has_call(parsed, |n| n == "print");
    let has_conditional = has_node_kind(parsed, "if_statement")
        || has_node_kind(parsed, "conditional_expression")
        || has_node_kind(parsed, "if_clause");
    let has_division = parsed.all_nodes().iter().any(|n| {
        n.kind() == "binary_operator"
            && n.child_by_field_name("operator")
                .is_some_and(|o| parsed.text(o) == "/")
    });

    for value in &tier1.values {
        let (confirmed, bullet) = match value.as_str() {
            "prints_instead_of_returning" => (
                !has_return && has_print,
                "no return statement exists; output happens only through print",
            ),
            "returns_instead_of_printing" => (
                has_return && !has_print,
                "a value is returned but nothing is ever printed",
            ),
            "no_conditional_selection" => (
                !has_conditional,
                "no if statement, conditional expression, or comprehension filter exists",
            ),
            "sum_instead_of_average" => (
                has_call(parsed, |n| n == "sum") && !has_division,
                "sum() is called but no division ever happens, so this returns the sum, not the average",
            ),
            _ => (false, ""),
        };
        if confirmed {
            verified.items.push(bullet.to_string());
            verified.values.push(value.clone());
        }
    }
    verified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;
    use codecritic_core::detectors::candidate_literals;

    fn parsed(code: &str) -> ParsedSource {
        ParsedSource::parse(code).unwrap()
    }

    #[test]
    fn test_print_in_comment_is_discarded() {
        // Tier 1 skips comments already, but a hostile candidate list must
        // still be refuted by the tree.
        let tier1 = TierEvidence {
            items: vec!["print somewhere".to_string()],
            values: vec!["print".to_string()],
            confidence: 0.4,
            severity: 3,
        };
        let source = parsed("def add(a, b):\n    return a + b\n");
        let verified = verify_npc(&source, &tier1);
        assert!(verified.is_empty());
    }

    #[test]
    fn test_real_print_survives_verification() {
        let source = parsed("def add(a, b):\n    print(a + b)\n    return a + b\n");
        let tier1 = rules::npc_scan("add two numbers", source.source());
        let verified = verify_npc(&source, &tier1);
        assert_eq!(verified.values, vec!["print".to_string()]);
    }

    #[test]
    fn test_prompt_bias_needs_output_deciding_literal() {
        let source = parsed("def sort(x):\n    return [1,2,3]\n");
        let tier1 = rules::prompt_bias_scan("sort the list, e.g., [3,1,2]", source.source());
        let candidates = candidate_literals(&source);
        let verified = verify_prompt_bias(&tier1, &candidates);
        assert_eq!(verified.values, vec!["[1,2,3]".to_string()]);
        assert!(verified.items[0].contains("return"));
    }

    #[test]
    fn test_prompt_bias_refuted_without_candidates() {
        let tier1 = TierEvidence {
            items: vec!["sequence shows up".to_string()],
            values: vec!["[3,1,2]".to_string()],
            confidence: 0.5,
            severity: 6,
        };
        let verified = verify_prompt_bias(&tier1, &[]);
        assert!(verified.is_empty());
    }

    #[test]
    fn test_missing_feature_comment_does_not_satisfy() {
        let source = parsed("def f(xs):\n    # sort them later\n    return xs\n");
        let tier1 = TierEvidence {
            items: vec![],
            values: vec!["sort".to_string()],
            confidence: 0.45,
            severity: 5,
        };
        let verified = verify_missing_feature(&source, &tier1);
        assert_eq!(verified.values, vec!["sort".to_string()]);
    }

    #[test]
    fn test_missing_feature_call_satisfies() {
        let source = parsed("def f(xs):\n    return sorted(xs)\n");
        let tier1 = TierEvidence {
            items: vec![],
            values: vec!["sort".to_string()],
            confidence: 0.45,
            severity: 5,
        };
        assert!(verify_missing_feature(&source, &tier1).is_empty());
    }

    #[test]
    fn test_sum_for_average_confirmed() {
        let source = parsed("def avg(nums):\n    return sum(nums)\n");
        let tier1 = rules::misinterpretation_scan(
            "return the average of a list of numbers",
            source.source(),
        );
        let verified = verify_misinterpretation(&source, &tier1);
        assert_eq!(verified.values, vec!["sum_instead_of_average".to_string()]);
    }

    #[test]
    fn test_sum_with_division_refuted() {
        let source = parsed("def avg(nums):\n    return sum(nums) / len(nums)\n");
        let tier1 = TierEvidence {
            items: vec![],
            values: vec!["sum_instead_of_average".to_string()],
            confidence: 0.5,
            severity: 7,
        };
        assert!(verify_misinterpretation(&source, &tier1).is_empty());
    }
}
