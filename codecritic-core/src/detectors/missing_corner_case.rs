//! Missing-corner-case detector: unguarded division, indexing, and
//! attribute access on possibly-absent values.

use super::StaticDetector;
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::parse::ParsedSource;
use tree_sitter::Node;

pub struct MissingCornerCaseDetector;

fn enclosing_function<'a>(node: Node<'a>) -> Option<Node<'a>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "function_definition" {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

fn inside_try(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "try_statement" {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// True when any condition in `scope` mentions `name`, i.e. some branch
/// looks at the value before the risky operation.
fn scope_guards_name(parsed: &ParsedSource, scope: Node<'_>, name: &str) -> bool {
    let mut nodes = Vec::new();
    collect(scope, &mut nodes);
    for node in nodes {
        let condition = match node.kind() {
            "if_statement" | "while_statement" | "elif_clause" => {
                node.child_by_field_name("condition")
            }
            "conditional_expression" => Some(node),
            "assert_statement" => node.named_child(0),
            _ => None,
        };
        if let Some(condition) = condition {
            if mentions_identifier(parsed, condition, name) {
                return true;
            }
        }
    }
    false
}

fn mentions_identifier(parsed: &ParsedSource, node: Node<'_>, name: &str) -> bool {
    let mut nodes = Vec::new();
    collect(node, &mut nodes);
    nodes
        .iter()
        .any(|n| n.kind() == "identifier" && parsed.text(*n) == name)
}

fn collect<'a>(node: Node<'a>, acc: &mut Vec<Node<'a>>) {
    acc.push(node);
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect(child, acc);
        }
    }
}

/// Parameters whose declared default is `None`.
fn none_default_params(parsed: &ParsedSource, func: Node<'_>) -> Vec<String> {
    let mut params = Vec::new();
    let Some(param_list) = func.child_by_field_name("parameters") else {
        return params;
    };
    for i in 0..param_list.child_count() {
        let Some(child) = param_list.child(i) else { continue };
        if !matches!(child.kind(), "default_parameter" | "typed_default_parameter") {
            continue;
        }
        let value_is_none = child
            .child_by_field_name("value")
            .is_some_and(|v| v.kind() == "none");
        if !value_is_none {
            continue;
        }
        if let Some(name) = child
            .child_by_field_name("name")
            .filter(|n| n.kind() == "identifier")
        {
            params.push(parsed.text(name).to_string());
        }
    }
    params
}

impl MissingCornerCaseDetector {
    fn unguarded_division(&self, parsed: &ParsedSource, findings: &mut Vec<Finding>) {
        for node in parsed.all_nodes() {
            if node.kind() != "binary_operator" {
                continue;
            }
            let op = node.child_by_field_name("operator").map(|o| parsed.text(o));
            if !matches!(op, Some("/") | Some("//") | Some("%")) {
                continue;
            }
            let Some(right) = node.child_by_field_name("right") else {
                continue;
            };
            if right.kind() != "identifier" {
                continue;
            }
            if inside_try(node) {
                continue;
            }
            let denominator = parsed.text(right).to_string();
            let scope = enclosing_function(node).unwrap_or_else(|| parsed.root());
            if scope_guards_name(parsed, scope, &denominator) {
                continue;
            }
            let line = parsed.line(node);
            findings.push(
                Finding::new(Pattern::MissingCornerCase, 5, DetectionStage::Static)
                    .with_confidence(0.7)
                    .with_description(format!(
                        "Division by `{denominator}` at line {line} has no zero check on any path to it"
                    ))
                    .at_line(line)
                    .with_fix_hint(format!(
                        "Guard the division, e.g. `if {denominator} == 0:` with an explicit outcome"
                    ))
                    .with_evidence(serde_json::json!({ "denominator": denominator })),
            );
        }
    }

    fn unguarded_indexing(&self, parsed: &ParsedSource, findings: &mut Vec<Finding>) {
        for node in parsed.all_nodes() {
            if node.kind() != "subscript" {
                continue;
            }
            let Some(value) = node.child_by_field_name("value") else {
                continue;
            };
            if value.kind() != "identifier" || inside_try(node) {
                continue;
            }
            let Some(func) = enclosing_function(node) else {
                continue;
            };
            let object = parsed.text(value).to_string();
            // Only parameters: indexing a value the caller controls is the
            // shape that blows up on the empty input.
            let is_param = func
                .child_by_field_name("parameters")
                .is_some_and(|p| mentions_identifier(parsed, p, &object));
            if !is_param {
                continue;
            }
            let index = node.child_by_field_name("subscript");
            let index_is_positional = index.is_some_and(|i| {
                matches!(i.kind(), "integer" | "identifier" | "unary_operator")
            });
            if !index_is_positional {
                continue;
            }
            if scope_guards_name(parsed, func, &object) {
                continue;
            }
            let line = parsed.line(node);
            findings.push(
                Finding::new(Pattern::MissingCornerCase, 4, DetectionStage::Static)
                    .with_confidence(0.5)
                    .with_description(format!(
                        "`{object}[...]` at line {line} is never length-checked; an empty or short input raises IndexError"
                    ))
                    .at_line(line)
                    .with_fix_hint(format!("Check `len({object})` or handle the empty case first"))
                    .with_evidence(serde_json::json!({ "object": object })),
            );
        }
    }

    fn optional_attribute_access(&self, parsed: &ParsedSource, findings: &mut Vec<Finding>) {
        for func_node in parsed
            .all_nodes()
            .into_iter()
            .filter(|n| n.kind() == "function_definition")
        {
            let optional = none_default_params(parsed, func_node);
            if optional.is_empty() {
                continue;
            }
            let mut nodes = Vec::new();
            if let Some(body) = func_node.child_by_field_name("body") {
                collect(body, &mut nodes);
            }
            for node in nodes {
                if node.kind() != "attribute" {
                    continue;
                }
                let Some(object) = node.child_by_field_name("object") else {
                    continue;
                };
                if object.kind() != "identifier" {
                    continue;
                }
                let name = parsed.text(object).to_string();
                if !optional.contains(&name) {
                    continue;
                }
                if scope_guards_name(parsed, func_node, &name) || inside_try(node) {
                    continue;
                }
                let line = parsed.line(node);
                findings.push(
                    Finding::new(Pattern::MissingCornerCase, 5, DetectionStage::Static)
                        .with_confidence(0.6)
                        .with_description(format!(
                            "`{name}` defaults to None but is dereferenced at line {line} without a None check"
                        ))
                        .at_line(line)
                        .with_fix_hint(format!("Guard with `if {name} is not None:`"))
                        .with_evidence(serde_json::json!({ "object": name })),
                );
            }
        }
    }
}

impl StaticDetector for MissingCornerCaseDetector {
    fn name(&self) -> &'static str {
        "missing_corner_case"
    }

    fn detect(&self, _prompt: &str, parsed: &ParsedSource) -> crate::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        self.unguarded_division(parsed, &mut findings);
        self.unguarded_indexing(parsed, &mut findings);
        self.optional_attribute_access(parsed, &mut findings);
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Vec<Finding> {
        let parsed = ParsedSource::parse(source).unwrap();
        MissingCornerCaseDetector.detect("", &parsed).unwrap()
    }

    #[test]
    fn test_unguarded_division_flagged_at_line_two() {
        let findings = run("def divide(a,b):\n    return a/b\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, Pattern::MissingCornerCase);
        assert_eq!(findings[0].line(), Some(2));
    }

    #[test]
    fn test_guarded_division_passes() {
        let source = "def divide(a, b):\n    if b == 0:\n        return None\n    return a / b\n";
        assert!(run(source).is_empty());
    }

    #[test]
    fn test_division_in_try_passes() {
        let source = "def divide(a, b):\n    try:\n        return a / b\n    except ZeroDivisionError:\n        return None\n";
        assert!(run(source).is_empty());
    }

    #[test]
    fn test_unguarded_index_on_parameter_flagged() {
        let findings = run("def first(items):\n    return items[0]\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("IndexError"));
    }

    #[test]
    fn test_length_checked_index_passes() {
        let source = "def first(items):\n    if len(items) > 0:\n        return items[0]\n    return None\n";
        assert!(run(source).is_empty());
    }

    #[test]
    fn test_none_default_dereference_flagged() {
        let findings = run("def show(user=None):\n    return user.name\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("None"));
    }

    #[test]
    fn test_none_default_with_guard_passes() {
        let source = "def show(user=None):\n    if user is None:\n        return \"\"\n    return user.name\n";
        assert!(run(source).is_empty());
    }
}
