//! Semantic queries over the parsed tree: bindings, read-sites, literals.

use super::ParsedSource;
use std::collections::HashSet;
use tree_sitter::Node;

/// A function definition with the pieces detectors inspect.
pub struct FunctionInfo<'a> {
    pub name: String,
    pub params: Vec<String>,
    pub node: Node<'a>,
    pub body: Option<Node<'a>>,
    /// 1-based line of the `def`.
    pub line: usize,
}

impl<'a> FunctionInfo<'a> {
    /// Return statements in this function's own body, skipping nested
    /// function definitions.
    pub fn return_statements(&self) -> Vec<Node<'a>> {
        let mut returns = Vec::new();
        if let Some(body) = self.body {
            collect_returns(body, &mut returns);
        }
        returns
    }
}

fn collect_returns<'a>(node: Node<'a>, acc: &mut Vec<Node<'a>>) {
    if node.kind() == "return_statement" {
        acc.push(node);
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == "function_definition" || child.kind() == "lambda" {
                continue;
            }
            collect_returns(child, acc);
        }
    }
}

/// Literal categories tracked by the literal index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Str,
    Int,
    Float,
    Bool,
    NoneLit,
    List,
    Tuple,
    Dict,
    Set,
}

impl LiteralKind {
    pub fn is_sequence(self) -> bool {
        matches!(self, LiteralKind::List | LiteralKind::Tuple | LiteralKind::Set)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, LiteralKind::Int | LiteralKind::Float)
    }
}

/// Syntactic position of a literal occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralContext {
    Return,
    Comparison,
    Assignment,
    CallArgument,
    Other,
}

/// One literal occurrence and where it sits.
pub struct LiteralSite<'a> {
    pub kind: LiteralKind,
    pub context: LiteralContext,
    pub node: Node<'a>,
    pub text: String,
    /// 1-based line.
    pub line: usize,
    /// Inside the conventional `if __name__ == "__main__":` block.
    pub in_main_block: bool,
}

fn literal_kind(node: Node<'_>) -> Option<LiteralKind> {
    match node.kind() {
        "string" | "concatenated_string" => Some(LiteralKind::Str),
        "integer" => Some(LiteralKind::Int),
        "float" => Some(LiteralKind::Float),
        "true" | "false" => Some(LiteralKind::Bool),
        "none" => Some(LiteralKind::NoneLit),
        "list" | "list_comprehension" => Some(LiteralKind::List),
        "tuple" => Some(LiteralKind::Tuple),
        "dictionary" | "dictionary_comprehension" => Some(LiteralKind::Dict),
        "set" | "set_comprehension" => Some(LiteralKind::Set),
        _ => None,
    }
}

/// Value category of an arbitrary expression node, when it is a literal.
pub fn expression_literal_kind(node: Node<'_>) -> Option<LiteralKind> {
    if node.kind() == "unary_operator" {
        return node.child_by_field_name("argument").and_then(literal_kind);
    }
    literal_kind(node)
}

fn within_field<'a>(mut node: Node<'a>, ancestor: Node<'a>, field_child: Node<'a>) -> bool {
    loop {
        if node == field_child {
            return true;
        }
        match node.parent() {
            Some(parent) if parent == ancestor => return false,
            Some(parent) => node = parent,
            None => return false,
        }
    }
}

/// True when `ident` occupies a binding (write) position rather than a read.
fn is_binding_site(ident: Node<'_>) -> bool {
    let Some(parent) = ident.parent() else {
        return false;
    };

    match parent.kind() {
        // def name / class name
        "function_definition" | "class_definition" => {
            parent.child_by_field_name("name") == Some(ident)
        }
        // Parameter lists bind every bare identifier
        "parameters" | "lambda_parameters" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            true
        }
        "default_parameter" | "typed_parameter" | "typed_default_parameter" => {
            parent.child_by_field_name("name") == Some(ident)
                || parent.child(0) == Some(ident)
        }
        // The .attr part of an attribute access is a member name, not a read
        "attribute" => parent.child_by_field_name("attribute") == Some(ident),
        // kwarg names in calls
        "keyword_argument" => parent.child_by_field_name("name") == Some(ident),
        // import bindings
        "dotted_name" | "aliased_import" | "import_statement" | "import_from_statement"
        | "import_prefix" | "relative_import" => true,
        "global_statement" | "nonlocal_statement" => true,
        "as_pattern_target" => true,
        // Walrus target
        "named_expression" => parent.child_by_field_name("name") == Some(ident),
        _ => {
            // Assignment / loop targets: binding only when the identifier is
            // reached from the target field through pure pattern nodes, so
            // `a[i] = x` still reads `a` and `i`.
            let mut node = ident;
            loop {
                let Some(p) = node.parent() else { return false };
                match p.kind() {
                    "pattern_list" | "tuple_pattern" | "tuple" | "list_pattern" => {
                        node = p;
                    }
                    "assignment" | "augmented_assignment" => {
                        return p.child_by_field_name("left").is_some_and(|left| {
                            within_field(ident, p, left)
                        }) && p.kind() != "augmented_assignment";
                    }
                    "for_statement" | "for_in_clause" => {
                        return p
                            .child_by_field_name("left")
                            .is_some_and(|left| within_field(ident, p, left));
                    }
                    _ => return false,
                }
            }
        }
    }
}

pub(super) fn collect_defined_names(parsed: &ParsedSource) -> HashSet<String> {
    let mut names = HashSet::new();
    for node in parsed.all_nodes() {
        match node.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    names.insert(parsed.text(name).to_string());
                }
            }
            "parameters" | "lambda_parameters" => {
                collect_parameter_names(parsed, node, &mut names);
            }
            "assignment" | "augmented_assignment" | "for_statement" | "for_in_clause" => {
                if let Some(left) = node.child_by_field_name("left") {
                    collect_target_names(parsed, left, &mut names);
                }
            }
            "named_expression" => {
                if let Some(name) = node.child_by_field_name("name") {
                    names.insert(parsed.text(name).to_string());
                }
            }
            "as_pattern_target" => {
                collect_target_names(parsed, node, &mut names);
            }
            "global_statement" | "nonlocal_statement" => {
                for i in 0..node.child_count() {
                    if let Some(child) = node.child(i) {
                        if child.kind() == "identifier" {
                            names.insert(parsed.text(child).to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names.extend(collect_imported_names(parsed));
    names
}

fn collect_parameter_names(parsed: &ParsedSource, params: Node<'_>, names: &mut HashSet<String>) {
    for i in 0..params.child_count() {
        let Some(child) = params.child(i) else { continue };
        match child.kind() {
            "identifier" => {
                names.insert(parsed.text(child).to_string());
            }
            "default_parameter" | "typed_parameter" | "typed_default_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .or_else(|| child.child(0));
                if let Some(name) = name.filter(|n| n.kind() == "identifier") {
                    names.insert(parsed.text(name).to_string());
                }
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => {
                for j in 0..child.child_count() {
                    if let Some(inner) = child.child(j) {
                        if inner.kind() == "identifier" {
                            names.insert(parsed.text(inner).to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_target_names(parsed: &ParsedSource, target: Node<'_>, names: &mut HashSet<String>) {
    match target.kind() {
        "identifier" => {
            names.insert(parsed.text(target).to_string());
        }
        "pattern_list" | "tuple_pattern" | "tuple" | "list_pattern" | "as_pattern_target" => {
            for i in 0..target.child_count() {
                if let Some(child) = target.child(i) {
                    collect_target_names(parsed, child, names);
                }
            }
        }
        // Subscript/attribute targets mutate an existing object; no new binding
        _ => {}
    }
}

pub(super) fn collect_imported_names(parsed: &ParsedSource) -> HashSet<String> {
    let mut names = HashSet::new();
    for node in parsed.all_nodes() {
        match node.kind() {
            "import_statement" => {
                for i in 0..node.child_count() {
                    let Some(child) = node.child(i) else { continue };
                    match child.kind() {
                        // `import a.b` binds the root name `a`
                        "dotted_name" => {
                            if let Some(root) = child.child(0) {
                                names.insert(parsed.text(root).to_string());
                            }
                        }
                        "aliased_import" => {
                            if let Some(alias) = child.child_by_field_name("alias") {
                                names.insert(parsed.text(alias).to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                let module = node.child_by_field_name("module_name");
                for i in 0..node.child_count() {
                    let Some(child) = node.child(i) else { continue };
                    if Some(child) == module {
                        continue;
                    }
                    match child.kind() {
                        "dotted_name" => {
                            if let Some(root) = child.child(0) {
                                names.insert(parsed.text(root).to_string());
                            }
                        }
                        "aliased_import" => {
                            if let Some(alias) = child.child_by_field_name("alias") {
                                names.insert(parsed.text(alias).to_string());
                            }
                        }
                        "wildcard_import" => {
                            // `from m import *`: unknowable; nothing to add
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    names
}

pub(super) fn collect_read_identifiers<'a>(
    parsed: &'a ParsedSource,
) -> Vec<(String, Node<'a>)> {
    let mut reads = Vec::new();
    for node in parsed.all_nodes() {
        if node.kind() != "identifier" {
            continue;
        }
        if is_binding_site(node) {
            continue;
        }
        reads.push((parsed.text(node).to_string(), node));
    }
    reads
}

pub(super) fn collect_function_defs<'a>(parsed: &'a ParsedSource) -> Vec<FunctionInfo<'a>> {
    let mut defs = Vec::new();
    for node in parsed.all_nodes() {
        if node.kind() != "function_definition" {
            continue;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            continue;
        };
        let mut params = Vec::new();
        if let Some(param_list) = node.child_by_field_name("parameters") {
            let mut set = HashSet::new();
            collect_parameter_names(parsed, param_list, &mut set);
            // Preserve declaration order
            for i in 0..param_list.child_count() {
                if let Some(child) = param_list.child(i) {
                    let text = match child.kind() {
                        "identifier" => Some(parsed.text(child).to_string()),
                        "default_parameter" | "typed_parameter" | "typed_default_parameter" => {
                            child
                                .child_by_field_name("name")
                                .or_else(|| child.child(0))
                                .filter(|n| n.kind() == "identifier")
                                .map(|n| parsed.text(n).to_string())
                        }
                        _ => None,
                    };
                    if let Some(text) = text.filter(|t| set.contains(t)) {
                        params.push(text);
                    }
                }
            }
        }
        defs.push(FunctionInfo {
            name: parsed.text(name_node).to_string(),
            params,
            node,
            body: node.child_by_field_name("body"),
            line: parsed.line(node),
        });
    }
    defs
}

pub(super) fn collect_dict_variables(parsed: &ParsedSource) -> HashSet<String> {
    let mut dicts = HashSet::new();
    for node in parsed.all_nodes() {
        if node.kind() != "assignment" {
            continue;
        }
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            continue;
        };
        if left.kind() != "identifier" {
            continue;
        }
        let is_dict = match right.kind() {
            "dictionary" | "dictionary_comprehension" => true,
            "call" => right
                .child_by_field_name("function")
                .is_some_and(|f| parsed.text(f) == "dict"),
            _ => false,
        };
        if is_dict {
            dicts.insert(parsed.text(left).to_string());
        }
    }
    dicts
}

fn literal_context(node: Node<'_>) -> LiteralContext {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "return_statement" => return LiteralContext::Return,
            "comparison_operator" => return LiteralContext::Comparison,
            "assignment" | "augmented_assignment" => return LiteralContext::Assignment,
            "argument_list" => return LiteralContext::CallArgument,
            // Stop at statement boundaries
            "expression_statement" | "block" | "module" => return LiteralContext::Other,
            _ => current = parent.parent(),
        }
    }
    LiteralContext::Other
}

pub(super) fn collect_literal_sites<'a>(parsed: &'a ParsedSource) -> Vec<LiteralSite<'a>> {
    let mut sites = Vec::new();
    for node in parsed.all_nodes() {
        let Some(kind) = literal_kind(node) else {
            continue;
        };
        // Nested literals (elements of a list, keys of a dict) are covered
        // by their enclosing container.
        if node
            .parent()
            .and_then(literal_kind)
            .is_some()
        {
            continue;
        }
        sites.push(LiteralSite {
            kind,
            context: literal_context(node),
            node,
            text: parsed.text(node).to_string(),
            line: parsed.line(node),
            in_main_block: parsed.in_main_block(node),
        });
    }
    sites
}
