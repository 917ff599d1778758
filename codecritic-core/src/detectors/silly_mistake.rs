//! Silly-mistake detector: identical branches, self-referential boolean
//! operands, reversed discount/price operands.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::{identifier_words, ParsedSource};
use tree_sitter::Node;

pub struct SillyMistakeDetector;

fn normalized_text(parsed: &ParsedSource, node: Node<'_>) -> String {
    parsed
        .text(node)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn branch_body<'a>(node: Node<'a>, field: &str) -> Option<Node<'a>> {
    node.child_by_field_name(field)
}

impl SillyMistakeDetector {
    fn identical_branches(&self, parsed: &ParsedSource, findings: &mut Vec<Finding>) {
        for node in parsed.all_nodes() {
            if node.kind() != "if_statement" {
                continue;
            }
            let Some(consequence) = branch_body(node, "consequence") else {
                continue;
            };
            // The else arm lives inside an else_clause's body field.
            let alternative = (0..node.child_count())
                .filter_map(|i| node.child(i))
                .find(|c| c.kind() == "else_clause")
                .and_then(|c| c.child_by_field_name("body"));
            let Some(alternative) = alternative else {
                continue;
            };
            if normalized_text(parsed, consequence) == normalized_text(parsed, alternative) {
                let line = parsed.line(node);
                findings.push(
                    Finding::new(Pattern::SillyMistake, 6, DetectionStage::Static)
                        .with_confidence(0.85)
                        .with_description(format!(
                            "The if and else branches at line {line} are identical; the conditional decides nothing"
                        ))
                        .at_line(line)
                        .with_fix_hint("Differentiate the branches or drop the conditional"),
                );
            }
        }
    }

    fn self_referential_boolean(&self, parsed: &ParsedSource, findings: &mut Vec<Finding>) {
        for node in parsed.all_nodes() {
            if node.kind() != "boolean_operator" {
                continue;
            }
            let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) else {
                continue;
            };
            if normalized_text(parsed, left) == normalized_text(parsed, right) {
                let line = parsed.line(node);
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| parsed.text(o).to_string())
                    .unwrap_or_else(|| "and".to_string());
                findings.push(
                    Finding::new(Pattern::SillyMistake, 5, DetectionStage::Static)
                        .with_confidence(0.8)
                        .with_description(format!(
                            "`{} {op} {}` at line {line} repeats the same operand on both sides",
                            parsed.text(left),
                            parsed.text(right)
                        ))
                        .at_line(line)
                        .with_fix_hint("One of the operands is probably meant to be a different expression"),
                );
            }
        }
    }

    /// Heuristic for `discount - price` style reversals. Known to misfire
    /// on financial OOP patterns, so it is suppressed entirely in files
    /// with `@property` accessors and floored at severity 4.
    fn reversed_discount_operands(
        &self,
        prompt: &str,
        parsed: &ParsedSource,
        findings: &mut Vec<Finding>,
    ) {
        if parsed.has_property_accessors() {
            return;
        }
        let prompt_lower = prompt.to_lowercase();
        if !prompt_lower.contains("discount") && !prompt_lower.contains("price") {
            return;
        }
        for func in parsed.function_defs() {
            let name_words = identifier_words(&func.name);
            let money_fn = name_words
                .iter()
                .any(|w| matches!(w.as_str(), "discount" | "price" | "cost" | "total"));
            if !money_fn {
                continue;
            }
            let Some(body) = func.body else { continue };
            let mut nodes = Vec::new();
            collect(body, &mut nodes);
            for node in nodes {
                if node.kind() != "binary_operator" {
                    continue;
                }
                let op = node.child_by_field_name("operator").map(|o| parsed.text(o));
                if op != Some("-") {
                    continue;
                }
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    continue;
                };
                if left.kind() != "identifier" || right.kind() != "identifier" {
                    continue;
                }
                let minuend = parsed.text(left);
                let subtrahend = parsed.text(right);
                if !func.params.iter().any(|p| p == minuend)
                    || !func.params.iter().any(|p| p == subtrahend)
                {
                    continue;
                }
                // Subtracting the price FROM the discount is the reversed
                // shape; the prompt asked for a discounted price.
                let minuend_is_discount =
                    identifier_words(minuend).iter().any(|w| w == "discount");
                let subtrahend_is_price = identifier_words(subtrahend)
                    .iter()
                    .any(|w| matches!(w.as_str(), "price" | "total" | "amount" | "cost"));
                if minuend_is_discount && subtrahend_is_price {
                    let line = parsed.line(node);
                    findings.push(
                        Finding::new(Pattern::SillyMistake, 5, DetectionStage::Static)
                            .with_confidence(0.55)
                            .with_description(format!(
                                "`{minuend} - {subtrahend}` at line {line} subtracts the {subtrahend} from the {minuend}; the operands look swapped relative to the prompt"
                            ))
                            .at_line(line)
                            .with_fix_hint(format!("Did you mean `{subtrahend} - {minuend}`?")),
                    );
                }
            }
        }
    }
}

fn collect<'a>(node: Node<'a>, acc: &mut Vec<Node<'a>>) {
    acc.push(node);
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect(child, acc);
        }
    }
}

impl StaticDetector for SillyMistakeDetector {
    fn name(&self) -> &'static str {
        "silly_mistake"
    }

    fn detect(&self, prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        self.identical_branches(parsed, &mut findings);
        self.self_referential_boolean(parsed, &mut findings);
        self.reversed_discount_operands(prompt, parsed, &mut findings);
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(prompt: &str, source: &str) -> Vec<Finding> {
        let parsed = ParsedSource::parse(source).unwrap();
        SillyMistakeDetector.detect(prompt, &parsed).unwrap()
    }

    #[test]
    fn test_identical_branches_flagged() {
        let source = "def f(x):\n    if x > 0:\n        return 1\n    else:\n        return 1\n";
        let findings = run("", source);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("identical"));
    }

    #[test]
    fn test_distinct_branches_pass() {
        let source = "def f(x):\n    if x > 0:\n        return 1\n    else:\n        return -1\n";
        assert!(run("", source).is_empty());
    }

    #[test]
    fn test_x_and_x_flagged() {
        let findings = run("", "def f(a):\n    return a and a\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::SillyMistake);
    }

    #[test]
    fn test_reversed_discount_flagged() {
        let source = "def apply_discount(discount, price):\n    return discount - price\n";
        let findings = run("apply a discount to the price", source);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].severity >= 4);
    }

    #[test]
    fn test_discount_heuristic_suppressed_with_properties() {
        let source = "class Item:\n    @property\n    def price(self):\n        return self._p\n\ndef apply_discount(discount, price):\n    return discount - price\n";
        let findings = run("apply a discount to the price", source);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_correct_discount_order_passes() {
        let source = "def apply_discount(price, discount):\n    return price - discount\n";
        assert!(run("apply a discount to the price", source).is_empty());
    }
}
