//! Syntax error detector: surfaces the first parser error.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::ParsedSource;

pub struct SyntaxDetector;

impl StaticDetector for SyntaxDetector {
    fn name(&self) -> &'static str {
        "syntax"
    }

    fn detect(&self, _prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let Some(error) = &parsed.syntax_error else {
            return Ok(Vec::new());
        };

        let finding = Finding::new(Pattern::SyntaxError, 9, DetectionStage::Static)
            .with_confidence(0.95)
            .with_description(format!(
                "The code fails to parse: {} at line {}",
                error.message, error.line
            ))
            .at_line(error.line)
            .at_column(error.column)
            .with_fix_hint("Fix the syntax error before any other issue; nothing downstream of a parse failure is trustworthy")
            .with_evidence(serde_json::json!({
                "parser_message": error.message,
                "line": error.line,
                "column": error.column,
            }));
        Ok(vec![finding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Vec<Finding> {
        let parsed = ParsedSource::parse(source).unwrap();
        SyntaxDetector.detect("", &parsed).unwrap()
    }

    #[test]
    fn test_missing_colon_flagged_on_line_one() {
        let findings = run("def add(a,b)\n    return a+b");
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.pattern, Pattern::SyntaxError);
        assert!(finding.severity >= 8);
        assert!(finding.location.as_deref().unwrap_or("").contains("1"));
    }

    #[test]
    fn test_clean_source_yields_nothing() {
        assert!(run("def add(a, b):\n    return a + b\n").is_empty());
    }
}
