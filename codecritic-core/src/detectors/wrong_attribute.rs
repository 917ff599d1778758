//! Wrong-attribute detector: attribute access on values inferred to be
//! keyed mappings.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::ParsedSource;

/// Methods that do exist on dict; accessing these is not a defect.
const DICT_METHODS: [&str; 11] = [
    "get", "keys", "values", "items", "pop", "popitem", "update", "setdefault", "clear", "copy",
    "fromkeys",
];

pub struct WrongAttributeDetector;

impl StaticDetector for WrongAttributeDetector {
    fn name(&self) -> &'static str {
        "wrong_attribute"
    }

    fn detect(&self, _prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let dict_vars = parsed.dict_variables();
        let mut findings = Vec::new();

        for node in parsed.all_nodes() {
            if node.kind() != "attribute" {
                continue;
            }
            let (Some(object), Some(attribute)) = (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) else {
                continue;
            };
            if object.kind() != "identifier" {
                continue;
            }
            let object_name = parsed.text(object);
            if !dict_vars.contains(object_name) {
                continue;
            }
            let attr_name = parsed.text(attribute);
            if DICT_METHODS.contains(&attr_name) {
                continue;
            }
            let line = parsed.line(node);
            findings.push(
                Finding::new(Pattern::WrongAttribute, 7, DetectionStage::Static)
                    .with_confidence(0.75)
                    .with_description(format!(
                        "`{object_name}` is a dictionary, so `{object_name}.{attr_name}` at line {line} will raise AttributeError"
                    ))
                    .at_line(line)
                    .with_fix_hint(format!(
                        "Use `{object_name}[\"{attr_name}\"]` or `{object_name}.get(\"{attr_name}\")`"
                    ))
                    .with_evidence(serde_json::json!({
                        "object": object_name,
                        "attribute": attr_name,
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
        WrongAttributeDetector.detect("", &parsed).unwrap()
    }

    #[test]
    fn test_dot_access_on_dict_flagged() {
        let findings = run("user = {\"name\": \"Ada\"}\nprint(user.name)\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::WrongAttribute);
        assert!(findings[0].fix_hint.as_deref().unwrap().contains("user[\"name\"]"));
    }

    #[test]
    fn test_dict_methods_allowed() {
        let findings = run("user = {\"name\": \"Ada\"}\nprint(user.get(\"name\"))\nfor k in user.keys():\n    print(k)\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_subscript_access_passes() {
        assert!(run("user = {\"name\": \"Ada\"}\nprint(user[\"name\"])\n").is_empty());
    }

    #[test]
    fn test_non_dict_objects_untouched() {
        assert!(run("import json\nprint(json.dumps({}))\n").is_empty());
    }
}
