//! Python parse layer built on tree-sitter.
//!
//! The source is parsed once per analysis. [`ParsedSource`] keeps the tree
//! together with the original text and exposes the semantic queries the
//! detectors share: read-site/write-site separation, binding collection,
//! import lists, literal indexing, and a small amount of intra-file type
//! inference (dict-literal tracking).
//!
//! On a parse error the first error location is captured and the offending
//! line is blanked for a single retry, so the remaining detectors still get
//! a usable tree.

use crate::Result;
use std::collections::{HashMap, HashSet};
use tree_sitter::{Node, Parser, Tree};

mod builtins;
mod index;

pub use builtins::is_python_builtin;
pub use index::{
    expression_literal_kind, FunctionInfo, LiteralContext, LiteralKind, LiteralSite,
};

/// Location and message of the first parser error.
#[derive(Debug, Clone)]
pub struct SyntaxErrorInfo {
    /// 1-based line of the first error node.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    pub message: String,
}

/// A parsed Python source with the queries detectors run over it.
pub struct ParsedSource {
    /// Text the tree was built from (post-strip when recovery ran).
    source: String,
    /// Text as submitted, before any recovery strip.
    original: String,
    tree: Tree,
    /// First parser error in the original source, if any.
    pub syntax_error: Option<SyntaxErrorInfo>,
    /// 1-based line blanked before the recovery reparse, if one was needed.
    pub stripped_line: Option<usize>,
}

fn new_python_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(tree_sitter_python::language())
        .map_err(|e| crate::Error::Parse(format!("Failed to set Python language: {e}")))?;
    Ok(parser)
}

fn first_error_node<'a>(node: Node<'a>) -> Option<Node<'a>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if let Some(err) = first_error_node(child) {
                return Some(err);
            }
        }
    }
    // has_error() true but no ERROR/MISSING child found; report the node itself
    Some(node)
}

impl ParsedSource {
    /// Parses `source`, retrying once with the offending line blanked when
    /// the first parse reports an error.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = new_python_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| crate::Error::Parse("tree-sitter returned no tree".to_string()))?;

        if !tree.root_node().has_error() {
            return Ok(Self {
                source: source.to_string(),
                original: source.to_string(),
                tree,
                syntax_error: None,
                stripped_line: None,
            });
        }

        let error_node = first_error_node(tree.root_node());
        let (line, column, message) = match error_node {
            Some(node) => {
                let point = node.start_position();
                let message = if node.is_missing() {
                    format!("missing {}", node.kind())
                } else {
                    format!("invalid syntax near {:?}", node.kind())
                };
                (point.row + 1, point.column, message)
            }
            None => (1, 0, "invalid syntax".to_string()),
        };
        let info = SyntaxErrorInfo {
            line,
            column,
            message,
        };
        tracing::debug!(line = info.line, "parse error; retrying with line stripped");

        // Blank the offending line and reparse so the other detectors can
        // still inspect the rest of the file.
        let stripped: String = source
            .lines()
            .enumerate()
            .map(|(i, l)| if i + 1 == info.line { "" } else { l })
            .collect::<Vec<_>>()
            .join("\n");
        let recovered = parser
            .parse(&stripped, None)
            .ok_or_else(|| crate::Error::Parse("tree-sitter returned no tree".to_string()))?;

        Ok(Self {
            source: stripped,
            original: source.to_string(),
            tree: recovered,
            syntax_error: Some(info),
            stripped_line: Some(line),
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The source exactly as submitted, before any recovery strip.
    pub fn original_source(&self) -> &str {
        &self.original
    }

    /// Text of a node, empty on a byte-range mishap.
    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// 1-based line of a node.
    pub fn line(&self, node: Node<'_>) -> usize {
        node.start_position().row + 1
    }

    /// Pre-order traversal of every node in the tree.
    pub fn all_nodes(&self) -> Vec<Node<'_>> {
        let mut nodes = Vec::new();
        collect_nodes(self.root(), &mut nodes);
        nodes
    }

    /// True when `node` lies inside an `if __name__ == "__main__":` block.
    pub fn in_main_block(&self, node: Node<'_>) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if parent.kind() == "if_statement" {
                if let Some(condition) = parent.child_by_field_name("condition") {
                    let text = self.text(condition);
                    if text.contains("__name__") && text.contains("__main__") {
                        return true;
                    }
                }
            }
            current = parent.parent();
        }
        false
    }

    /// Every name bound anywhere in the file: function/class names,
    /// parameters, assignment and loop targets, imports, aliases.
    pub fn defined_names(&self) -> HashSet<String> {
        index::collect_defined_names(self)
    }

    /// Names introduced by import statements (the binding name, so
    /// `import numpy as np` contributes `np` and `from os import path`
    /// contributes `path`).
    pub fn imported_names(&self) -> HashSet<String> {
        index::collect_imported_names(self)
    }

    /// Identifiers read in expression context, with their nodes.
    /// Write-sites (assignment targets, parameters, attribute names,
    /// keyword-argument names, definition names) are excluded.
    pub fn read_identifiers(&self) -> Vec<(String, Node<'_>)> {
        index::collect_read_identifiers(self)
    }

    /// Top-level and nested function definitions.
    pub fn function_defs(&self) -> Vec<FunctionInfo<'_>> {
        index::collect_function_defs(self)
    }

    /// Variables assigned a dictionary literal or `dict(...)` call.
    pub fn dict_variables(&self) -> HashSet<String> {
        index::collect_dict_variables(self)
    }

    /// Literal occurrences with their syntactic context.
    pub fn literal_sites(&self) -> Vec<LiteralSite<'_>> {
        index::collect_literal_sites(self)
    }

    /// True when the file contains a `@property`-decorated definition.
    pub fn has_property_accessors(&self) -> bool {
        self.all_nodes().iter().any(|n| {
            n.kind() == "decorator" && self.text(*n).trim_start_matches('@').trim() == "property"
        })
    }
}

fn collect_nodes<'a>(node: Node<'a>, acc: &mut Vec<Node<'a>>) {
    acc.push(node);
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_nodes(child, acc);
        }
    }
}

/// Splits an identifier into normalized lowercase word tokens
/// (`snake_case` and `camelCase` both split).
pub fn identifier_words(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in identifier.split(|c: char| c == '_' || !c.is_alphanumeric()) {
        if chunk.is_empty() {
            continue;
        }
        let mut current = String::new();
        for ch in chunk.chars() {
            if ch.is_uppercase() && !current.is_empty() {
                words.push(current.to_lowercase());
                current = String::new();
            }
            current.push(ch);
        }
        if !current.is_empty() {
            words.push(current.to_lowercase());
        }
    }
    words
}

/// Maps call targets to the variables they were assigned from, for the
/// small amount of alias-following the detectors need.
pub fn assignment_map(parsed: &ParsedSource) -> HashMap<String, String> {
    let mut map = HashMap::new();
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
        if left.kind() == "identifier" && right.kind() == "identifier" {
            map.insert(
                parsed.text(left).to_string(),
                parsed.text(right).to_string(),
            );
        }
    }
    map
}
