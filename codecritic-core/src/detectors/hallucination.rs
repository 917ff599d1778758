//! Hallucinated-object detector: reads of names that resolve nowhere.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::{is_python_builtin, ParsedSource};
use std::collections::HashSet;

pub struct HallucinationDetector;

impl StaticDetector for HallucinationDetector {
    fn name(&self) -> &'static str {
        "hallucination"
    }

    fn detect(&self, _prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let defined = parsed.defined_names();
        let mut reported: HashSet<String> = HashSet::new();
        let mut findings = Vec::new();

        for (name, node) in parsed.read_identifiers() {
            if is_python_builtin(&name) || defined.contains(&name) {
                continue;
            }
            if !reported.insert(name.clone()) {
                continue;
            }
            let line = parsed.line(node);
            // A dangling name that is immediately called or dereferenced is
            // the classic hallucinated-module shape; score it higher.
            let dereferenced = node
                .parent()
                .is_some_and(|p| matches!(p.kind(), "attribute" | "call"));
            let severity = if dereferenced { 8 } else { 7 };
            findings.push(
                Finding::new(Pattern::HallucinatedObject, severity, DetectionStage::Static)
                    .with_confidence(0.8)
                    .with_description(format!(
                        "`{name}` is read at line {line} but is not a builtin, not defined in the file, and not imported"
                    ))
                    .at_line(line)
                    .with_fix_hint(format!(
                        "Define or import `{name}`, or replace it with a name that exists"
                    ))
                    .with_evidence(serde_json::json!({ "identifier": name })),
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
        HallucinationDetector.detect("", &parsed).unwrap()
    }

    #[test]
    fn test_unresolved_module_reference_flagged() {
        let findings = run("def f(n):\n    return calc.factorial(n)\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::HallucinatedObject);
        assert!(findings[0].severity >= 8);
        assert_eq!(
            findings[0].evidence.get("identifier").and_then(|v| v.as_str()),
            Some("calc")
        );
    }

    #[test]
    fn test_builtins_are_never_flagged() {
        let findings = run(
            "def f(xs):\n    return len(sorted(xs)) + max(xs) + sum(xs)\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_imported_alias_resolves() {
        let findings = run("import numpy as np\n\ndef f(xs):\n    return np.mean(xs)\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_local_bindings_resolve() {
        let findings = run("def f(a):\n    total = a + 1\n    return total\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_each_name_reported_once() {
        let findings = run("def f():\n    return ghost + ghost + ghost\n");
        assert_eq!(findings.len(), 1);
    }
}
