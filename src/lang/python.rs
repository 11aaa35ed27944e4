//! Grammar-based scanner for Python sources (tree-sitter).

use serde::Serialize;
use std::collections::HashSet;
use tree_sitter::{Node, Parser, Tree};

use super::LanguageScanner;
use crate::error::{MapError, MapResult};
use crate::graph::{CallEdge, CallGraph, GraphBuilder, PythonMeta};

/// One plain `def` found in the file, with every call reachable from its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// 1-based line of the `def` keyword.
    pub line: usize,
    pub docstring: Option<String>,
    pub params: Vec<String>,
    pub is_fixture: bool,
    pub calls: Vec<CallEdge>,
}

/// Entry of the definition listing (no call graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub lineno: usize,
    pub docstring: Option<String>,
}

pub struct PythonScanner {
    fixture_marker: String,
}

impl PythonScanner {
    pub const EXTENSIONS: &'static [&'static str] = &[".py"];

    pub fn new(fixture_marker: impl Into<String>) -> Self {
        Self {
            fixture_marker: fixture_marker.into(),
        }
    }

    /// All definitions in file order, outer definitions before the ones nested in them.
    pub fn definitions(&self, source_text: &str) -> MapResult<Vec<Definition>> {
        let tree = parse_python(source_text)?;
        let mut out = Vec::new();
        collect_definitions(
            tree.root_node(),
            source_text.as_bytes(),
            &self.fixture_marker,
            &mut out,
        );
        Ok(out)
    }
}

impl Default for PythonScanner {
    fn default() -> Self {
        Self::new("fixture")
    }
}

impl LanguageScanner for PythonScanner {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        Self::EXTENSIONS
    }

    fn scan(&self, source_text: &str) -> MapResult<CallGraph> {
        let definitions = self.definitions(source_text)?;
        let fixtures: HashSet<String> = definitions
            .iter()
            .filter(|d| d.is_fixture)
            .map(|d| d.name.clone())
            .collect();

        let mut builder = GraphBuilder::new(true);
        for def in definitions {
            let meta = PythonMeta {
                docstring: def.docstring,
                params: def.params,
                is_fixture: def.is_fixture,
            };
            builder.define(&def.name, def.line, Some(meta));
            for call in def.calls {
                builder.add_call(&def.name, call);
            }
        }
        builder.link_fixtures(&fixtures);
        Ok(builder.finish())
    }
}

/// List `def`s with their docstrings, without resolving any calls.
pub fn list_functions(source_text: &str) -> MapResult<Vec<FunctionSummary>> {
    let defs = PythonScanner::default().definitions(source_text)?;
    Ok(defs
        .into_iter()
        .map(|d| FunctionSummary {
            name: d.name,
            lineno: d.line,
            docstring: d.docstring,
        })
        .collect())
}

fn parse_python(source_text: &str) -> MapResult<Tree> {
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| MapError::Language(e.to_string()))?;

    let tree = parser
        .parse(source_text, None)
        .ok_or_else(|| MapError::Parse {
            language: "python",
            line: 1,
            message: "parser returned no tree".to_string(),
        })?;

    let root = tree.root_node();
    let failure = if root.has_error() {
        Some(first_syntax_error(root).unwrap_or((1, "invalid syntax".to_string())))
    } else {
        first_legacy_statement(root)
    };
    if let Some((line, message)) = failure {
        return Err(MapError::Parse {
            language: "python",
            line,
            message,
        });
    }
    Ok(tree)
}

/// The grammar still accepts Python 2 `print x` / `exec code` statements,
/// which Python 3 rejects.
fn first_legacy_statement(node: Node) -> Option<(usize, String)> {
    let line = node.start_position().row + 1;
    match node.kind() {
        "print_statement" => {
            return Some((line, "Missing parentheses in call to 'print'".to_string()))
        }
        "exec_statement" => {
            return Some((line, "Missing parentheses in call to 'exec'".to_string()))
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_legacy_statement(child) {
            return Some(found);
        }
    }
    None
}

fn first_syntax_error(node: Node) -> Option<(usize, String)> {
    let line = node.start_position().row + 1;
    if node.is_missing() {
        return Some((line, format!("missing `{}`", node.kind())));
    }
    if node.is_error() {
        return Some((line, "invalid syntax".to_string()));
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_syntax_error(child) {
            return Some(found);
        }
    }
    None
}

fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn collect_definitions(node: Node, source: &[u8], marker: &str, out: &mut Vec<Definition>) {
    match node.kind() {
        "decorated_definition" => {
            let mut cursor = node.walk();
            let decorators: Vec<Node> = node
                .children(&mut cursor)
                .filter(|c| c.kind() == "decorator")
                .collect();

            if let Some(def) = node.child_by_field_name("definition") {
                if def.kind() == "function_definition" {
                    if let Some(found) = read_function(def, &decorators, source, marker) {
                        out.push(found);
                    }
                }
                collect_nested(def, source, marker, out);
            }
            return;
        }
        "function_definition" => {
            if let Some(found) = read_function(node, &[], source, marker) {
                out.push(found);
            }
        }
        _ => {}
    }

    collect_nested(node, source, marker, out);
}

fn collect_nested(node: Node, source: &[u8], marker: &str, out: &mut Vec<Definition>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definitions(child, source, marker, out);
    }
}

fn read_function(
    def: Node,
    decorators: &[Node],
    source: &[u8],
    marker: &str,
) -> Option<Definition> {
    // Coroutines are not definitions; their calls still count for enclosing `def`s.
    if is_async(def) {
        return None;
    }

    let name = node_text(source, def.child_by_field_name("name")?).to_string();
    if name.is_empty() {
        return None;
    }

    let params = def
        .child_by_field_name("parameters")
        .map(|p| parameter_names(p, source))
        .unwrap_or_default();

    let is_fixture = decorators
        .iter()
        .any(|d| is_fixture_decorator(*d, source, marker));

    // Decorators sit outside the `function_definition` node but their calls
    // still belong to the definition.
    let mut calls = Vec::new();
    for decorator in decorators {
        collect_calls(*decorator, source, &mut calls);
    }
    collect_calls(def, source, &mut calls);

    Some(Definition {
        name,
        line: def.start_position().row + 1,
        docstring: docstring(def, source),
        params,
        is_fixture,
        calls,
    })
}

fn is_async(def: Node) -> bool {
    def.children(&mut def.walk()).any(|c| c.kind() == "async")
}

fn parameter_names(params: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let name_node = match param.kind() {
            "identifier" => Some(param),
            "default_parameter" | "typed_default_parameter" => param.child_by_field_name("name"),
            "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                first_identifier(param)
            }
            _ => None,
        };
        if let Some(n) = name_node {
            let text = node_text(source, n);
            if !text.is_empty() {
                out.push(text.to_string());
            }
        }
    }
    out
}

fn first_identifier(node: Node) -> Option<Node> {
    if node.kind() == "identifier" {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_identifier(child) {
            return Some(found);
        }
    }
    None
}

/// `@marker` or `@anything.marker`; call forms like `@marker(...)` do not count.
fn is_fixture_decorator(decorator: Node, source: &[u8], marker: &str) -> bool {
    let mut cursor = decorator.walk();
    let Some(expr) = decorator
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")
    else {
        return false;
    };

    match expr.kind() {
        "identifier" => node_text(source, expr) == marker,
        "attribute" => expr
            .child_by_field_name("attribute")
            .is_some_and(|a| node_text(source, a) == marker),
        _ => false,
    }
}

/// Unscoped walk: calls inside nested definitions are reported here too.
fn collect_calls(node: Node, source: &[u8], out: &mut Vec<CallEdge>) {
    if node.kind() == "call" {
        if let Some(callee) = call_target(node, source) {
            out.push(CallEdge::new(callee, node.start_position().row + 1));
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, out);
    }
}

/// `f(...)` → `f`, `obj.m(...)` → `obj.m`; any other callee shape is ignored.
fn call_target(call: Node, source: &[u8]) -> Option<String> {
    let func = call.child_by_field_name("function")?;
    match func.kind() {
        "identifier" => Some(node_text(source, func).to_string()),
        "attribute" => {
            let object = func.child_by_field_name("object")?;
            if object.kind() != "identifier" {
                return None;
            }
            let attr = func.child_by_field_name("attribute")?;
            Some(format!(
                "{}.{}",
                node_text(source, object),
                node_text(source, attr)
            ))
        }
        _ => None,
    }
}

fn docstring(def: Node, source: &[u8]) -> Option<String> {
    let body = def.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }

    let mut inner = first.walk();
    let expr = first.named_children(&mut inner).next()?;
    let value = match expr.kind() {
        "string" => string_literal_value(node_text(source, expr))?,
        // `"a" "b"` is one literal; every part must itself be a plain string.
        "concatenated_string" => {
            let mut parts = expr.walk();
            let pieces: Option<Vec<String>> = expr
                .named_children(&mut parts)
                .filter(|n| n.kind() != "comment")
                .map(|n| match n.kind() {
                    "string" => string_literal_value(node_text(source, n)),
                    _ => None,
                })
                .collect();
            pieces?.concat()
        }
        _ => return None,
    };

    Some(clean_docstring(&value))
}

/// Strip prefix and quotes from a string literal. Byte strings and f-strings
/// are not docstrings.
fn string_literal_value(raw: &str) -> Option<String> {
    let quote_at = raw.find(['"', '\''])?;
    let prefix = raw[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }

    let body = &raw[quote_at..];
    let q = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    if body.len() < 2 * q {
        return None;
    }
    let inner = &body[q..body.len() - q];

    if prefix.contains('r') {
        Some(inner.to_string())
    } else {
        Some(unescape(inner))
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn expand_tabs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut col = 0usize;
    for c in s.chars() {
        match c {
            '\t' => {
                let pad = 8 - (col % 8);
                out.extend(std::iter::repeat(' ').take(pad));
                col += pad;
            }
            '\n' => {
                out.push(c);
                col = 0;
            }
            _ => {
                out.push(c);
                col += 1;
            }
        }
    }
    out
}

/// Same normalization as Python's `inspect.cleandoc`.
fn clean_docstring(doc: &str) -> String {
    let expanded = expand_tabs(doc);
    let lines: Vec<&str> = expanded.split('\n').collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter_map(|l| {
            let content = l.trim_start();
            (!content.is_empty()).then(|| l.len() - content.len())
        })
        .min();

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            out.push(line.trim_start().to_string());
        } else if let Some(m) = margin {
            out.push(line.get(m..).unwrap_or("").to_string());
        } else {
            out.push(line.to_string());
        }
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    out.join("\n")
}
