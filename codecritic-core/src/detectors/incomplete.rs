//! Incomplete-generation detector: placeholder bodies, dangling
//! assignments, TODO-only comments.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::ParsedSource;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TRAILING_ASSIGN: Regex = Regex::new(r"(?m)^[^#\n]*[^=<>!+\-*/%]=\s*$").unwrap();
    static ref TODO_ONLY: Regex = Regex::new(r"(?i)^#\s*(todo|fixme)\b[:\s]*.{0,40}$").unwrap();
}

pub struct IncompleteGenerationDetector;

/// True when the function body is nothing but a placeholder: a lone
/// `pass`, `...`, or a docstring with no code after it.
fn is_placeholder_body(body: tree_sitter::Node<'_>) -> bool {
    let statements: Vec<_> = (0..body.named_child_count())
        .filter_map(|i| body.named_child(i))
        .filter(|n| n.kind() != "comment")
        .collect();
    if statements.is_empty() {
        return true;
    }
    if statements.len() > 1 {
        return false;
    }
    let only = statements[0];
    match only.kind() {
        "pass_statement" => true,
        "expression_statement" => only
            .named_child(0)
            .is_some_and(|e| matches!(e.kind(), "ellipsis" | "string")),
        _ => false,
    }
}

impl StaticDetector for IncompleteGenerationDetector {
    fn name(&self) -> &'static str {
        "incomplete_generation"
    }

    fn detect(&self, _prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for func in parsed.function_defs() {
            let Some(body) = func.body else { continue };
            if is_placeholder_body(body) {
                findings.push(
                    Finding::new(Pattern::IncompleteGeneration, 7, DetectionStage::Static)
                        .with_confidence(0.85)
                        .with_description(format!(
                            "`{}` has no implementation; its body is only a placeholder",
                            func.name
                        ))
                        .at_line(func.line)
                        .with_fix_hint(format!("Implement the body of `{}`", func.name))
                        .with_evidence(serde_json::json!({ "function": func.name })),
                );
            }
        }

        // An assignment with nothing on the right-hand side is a truncated
        // generation; the parser reports it as a syntax error, but the shape
        // is worth naming in its own right. Scan the original text, since
        // the offending line may have been stripped during parse recovery.
        for (i, line) in parsed.original_source().lines().enumerate() {
            if TRAILING_ASSIGN.is_match(line) {
                findings.push(
                    Finding::new(Pattern::IncompleteGeneration, 8, DetectionStage::Static)
                        .with_confidence(0.8)
                        .with_description(format!(
                            "Line {} ends with `=` and no right-hand side; the generation looks truncated",
                            i + 1
                        ))
                        .at_line(i + 1)
                        .with_fix_hint("Complete the assignment or remove the dangling statement"),
                );
            }
            if TODO_ONLY.is_match(line.trim()) {
                findings.push(
                    Finding::new(Pattern::IncompleteGeneration, 6, DetectionStage::Static)
                        .with_confidence(0.7)
                        .with_description(format!(
                            "Line {} is a TODO/FIXME marker with no implementation behind it",
                            i + 1
                        ))
                        .at_line(i + 1)
                        .with_fix_hint("Replace the TODO with working code"),
                );
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Vec<Finding> {
        let parsed = ParsedSource::parse(source).unwrap();
        IncompleteGenerationDetector.detect("", &parsed).unwrap()
    }

    #[test]
    fn test_pass_only_body_flagged() {
        let findings = run("def todo(x):\n    pass\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::IncompleteGeneration);
    }

    #[test]
    fn test_ellipsis_body_flagged() {
        let findings = run("def todo(x):\n    ...\n");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_docstring_only_body_flagged() {
        let findings = run("def todo(x):\n    \"\"\"Computes the thing.\"\"\"\n");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_docstring_plus_code_is_fine() {
        let findings = run("def f(x):\n    \"\"\"Doubles x.\"\"\"\n    return x * 2\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_todo_comment_flagged() {
        let findings = run("def f(x):\n    # TODO: handle negatives\n    return x\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line(), Some(2));
    }

    #[test]
    fn test_trailing_assignment_flagged() {
        let findings = run("result =\n");
        assert!(findings
            .iter()
            .any(|f| f.description.contains("right-hand side")));
    }

    #[test]
    fn test_comparison_not_mistaken_for_dangling_assign() {
        let findings = run("def f(a, b):\n    ok = a ==\n");
        // `a ==` is broken, but the dangling-assignment rule must not fire
        // on comparison operators; the syntax detector owns this case.
        assert!(!findings
            .iter()
            .any(|f| f.description.contains("right-hand side")));
    }
}
