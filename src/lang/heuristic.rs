//! Line-oriented regex scanners for dialects without a grammar.
//!
//! Each scanner walks the file top to bottom carrying a small [`LineState`].
//! A token only resolves to an edge if its name is already a key of the graph
//! when the line is scanned, so forward references never produce edges.
//! These scanners never fail: unexpected input yields a partial or empty graph.

use regex::Regex;
use std::sync::OnceLock;

use super::LanguageScanner;
use crate::error::MapResult;
use crate::graph::{CallEdge, CallGraph, GraphBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineState {
    Outside,
    InFunction { name: String },
    /// `method` is the definition currently receiving calls inside the class body.
    InClass { indent: usize, method: Option<String> },
}

impl LineState {
    fn current(&self) -> Option<&str> {
        match self {
            LineState::Outside => None,
            LineState::InFunction { name } => Some(name),
            LineState::InClass { method, .. } => method.as_deref(),
        }
    }

    fn class_indent(&self) -> Option<usize> {
        match self {
            LineState::InClass { indent, .. } => Some(*indent),
            _ => None,
        }
    }

    /// Make `name` the receiver of subsequent calls without leaving a class body.
    fn enter_definition(self, name: &str) -> LineState {
        match self {
            LineState::InClass { indent, .. } => LineState::InClass {
                indent,
                method: Some(name.to_string()),
            },
            _ => LineState::InFunction {
                name: name.to_string(),
            },
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Add an edge from the current definition for every token naming a known definition.
fn resolve_tokens(
    builder: &mut GraphBuilder,
    state: &LineState,
    line: &str,
    line_no: usize,
    token_re: &Regex,
    allow_self: bool,
) {
    let Some(current) = state.current() else { return };
    for caps in token_re.captures_iter(line) {
        let Some(m) = caps.get(1) else { continue };
        let callee = m.as_str();
        if !allow_self && callee == current {
            continue;
        }
        if builder.is_defined(callee) {
            builder.add_call(current, CallEdge::new(callee, line_no));
        }
    }
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "synchronized", "try", "do",
    "else", "new", "throw",
];

// ---------------------------------------------------------------------------
// JavaScript / TypeScript
// ---------------------------------------------------------------------------

struct BraceRegexes {
    class: Regex,
    function: Regex,
    arrow: Regex,
    method: Regex,
    call: Regex,
}

fn brace_regexes() -> &'static BraceRegexes {
    static RE: OnceLock<BraceRegexes> = OnceLock::new();
    RE.get_or_init(|| BraceRegexes {
        class: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+\w+").unwrap(),
        function: Regex::new(r"function\s+(\w+)\s*\(").unwrap(),
        arrow: Regex::new(
            r"\b(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s*)?\([^)]*\)\s*(?::[^=]*)?=>",
        )
        .unwrap(),
        method: Regex::new(
            r"^\s*(?:(?:public|private|protected|static|async|get|set|override|readonly)\s+)*\*?\s*(\w+)\s*\([^)]*\)\s*(?::[^{]*)?\{",
        )
        .unwrap(),
        call: Regex::new(r"(\w+)\s*\(").unwrap(),
    })
}

/// `.js` / `.ts`: standalone functions, arrow assignments and class methods.
/// Does not track `called_by`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BraceBlockScanner;

impl BraceBlockScanner {
    fn declared_function<'a>(line: &'a str) -> Option<&'a str> {
        let re = brace_regexes();
        re.function
            .captures(line)
            .or_else(|| re.arrow.captures(line))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    fn declared_method<'a>(line: &'a str) -> Option<&'a str> {
        let name = brace_regexes().method.captures(line)?.get(1)?.as_str();
        (!CONTROL_KEYWORDS.contains(&name)).then_some(name)
    }
}

impl LanguageScanner for BraceBlockScanner {
    fn name(&self) -> &'static str {
        "brace-block"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".js", ".ts"]
    }

    fn scan(&self, source_text: &str) -> MapResult<CallGraph> {
        let re = brace_regexes();
        let mut builder = GraphBuilder::new(false);
        let mut state = LineState::Outside;

        for (idx, line) in source_text.lines().enumerate() {
            let line_no = idx + 1;
            let indent = indent_of(line);

            // A lone `}` closes the class body as well, even a method's own.
            if state.class_indent().is_some_and(|ci| {
                line.trim() == "}" || (!line.trim().is_empty() && indent <= ci)
            }) {
                state = LineState::Outside;
            }

            // Class entry is checked before method detection.
            if re.class.is_match(line) {
                state = LineState::InClass {
                    indent,
                    method: None,
                };
            } else if let Some(name) = Self::declared_function(line) {
                builder.define(name, line_no, None);
                state = state.enter_definition(name);
            } else if state.class_indent().is_some_and(|ci| indent > ci) {
                if let Some(name) = Self::declared_method(line) {
                    builder.define(name, line_no, None);
                    state = state.enter_definition(name);
                }
            }

            resolve_tokens(&mut builder, &state, line, line_no, &re.call, true);
        }

        Ok(builder.finish())
    }
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

fn word_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\b").unwrap())
}

fn shell_function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\s*\(\)\s*\{").unwrap())
}

/// Run the shared "current function + word tokens" pass used by shell and Java.
fn scan_with_declarations<'a, F>(source_text: &'a str, declared: F) -> CallGraph
where
    F: Fn(&'a str) -> Option<&'a str>,
{
    let mut builder = GraphBuilder::new(true);
    let mut state = LineState::Outside;

    for (idx, line) in source_text.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(name) = declared(line) {
            builder.define(name, line_no, None);
            state = LineState::InFunction {
                name: name.to_string(),
            };
        }
        resolve_tokens(&mut builder, &state, line, line_no, word_token_regex(), false);
    }

    builder.finish()
}

/// `.sh`: `name() {` at the start of a line opens a function that stays
/// current until the next declaration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellScanner;

impl LanguageScanner for ShellScanner {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".sh"]
    }

    fn scan(&self, source_text: &str) -> MapResult<CallGraph> {
        Ok(scan_with_declarations(source_text, |line| {
            shell_function_regex()
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
        }))
    }
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn java_method_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:public|protected|private|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^>]+>\s+)?([\w$.]+(?:<[^()]*>)?(?:\[\])*)\s+(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w$.,\s]+?)?\s*\{",
        )
        .unwrap()
    })
}

/// `.java`: modifiers + return type + name + `(args)` + `{` on one line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaScanner;

impl JavaScanner {
    fn declared_method(line: &str) -> Option<&str> {
        let caps = java_method_regex().captures(line)?;
        let return_type = caps.get(1)?.as_str();
        let name = caps.get(2)?.as_str();
        if CONTROL_KEYWORDS.contains(&name) || CONTROL_KEYWORDS.contains(&return_type) {
            return None;
        }
        Some(name)
    }
}

impl LanguageScanner for JavaScanner {
    fn name(&self) -> &'static str {
        "java"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".java"]
    }

    fn scan(&self, source_text: &str) -> MapResult<CallGraph> {
        Ok(scan_with_declarations(source_text, Self::declared_method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::assert_back_edges_consistent;
    use serde_json::json;

    fn edges(g: &CallGraph, name: &str) -> Vec<(String, usize)> {
        g.get(name)
            .unwrap()
            .calls
            .iter()
            .map(|c| (c.function.clone(), c.line))
            .collect()
    }

    #[test]
    fn shell_resolves_only_earlier_declarations() {
        let src = "#!/bin/bash\nsetup() {\n  echo setup\n  teardown\n}\n\nteardown() {\n  rm -rf tmp\n}\n\nmain() {\n  setup\n  teardown\n}\nmain\n";
        let g = ShellScanner.scan(src).unwrap();

        assert_eq!(g.names().collect::<Vec<_>>(), vec!["setup", "teardown", "main"]);
        // `teardown` on line 4 is a forward reference.
        assert!(edges(&g, "setup").is_empty());
        assert_eq!(
            edges(&g, "main"),
            vec![("setup".to_string(), 12), ("teardown".to_string(), 13)]
        );
        assert_eq!(
            g.get("setup").unwrap().called_by,
            Some(vec![CallEdge::new("main", 12)])
        );
        assert_back_edges_consistent(&g);
    }

    #[test]
    fn shell_keeps_current_function_until_next_declaration() {
        let src = "helper() {\n  :\n}\nrun() {\n  helper\n}\nhelper\nrun\n";
        let g = ShellScanner.scan(src).unwrap();
        // Lines 7-8 are still attributed to `run`; `run` itself is skipped.
        assert_eq!(
            edges(&g, "run"),
            vec![("helper".to_string(), 5), ("helper".to_string(), 7)]
        );
        assert_back_edges_consistent(&g);
    }

    #[test]
    fn shell_requires_declaration_at_line_start() {
        let g = ShellScanner.scan("  indented() {\n  :\n}\nfunction kw {\n}\n").unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn brace_block_functions_and_arrows() {
        let src = "function load(path) {\n  return read(path);\n}\nconst save = async (data) => {\n  load(data);\n  later();\n};\nfunction later() {}\n";
        let g = BraceBlockScanner.scan(src).unwrap();

        assert_eq!(g.names().collect::<Vec<_>>(), vec!["load", "save", "later"]);
        assert_eq!(g.get("save").unwrap().line, 4);
        // Declaration lines resolve their own name.
        assert_eq!(edges(&g, "load"), vec![("load".to_string(), 1)]);
        // `later` is declared after the call.
        assert_eq!(edges(&g, "save"), vec![("load".to_string(), 5)]);
        assert_eq!(edges(&g, "later"), vec![("later".to_string(), 8)]);
    }

    #[test]
    fn brace_block_class_methods() {
        let src = "class Store {\n  get(key) {\n    if (key) {\n      return get(key.parent);\n    }\n    return load(key);\n  }\n}\nfunction outside() {\n  get(1);\n}\n";
        let g = BraceBlockScanner.scan(src).unwrap();

        assert_eq!(g.names().collect::<Vec<_>>(), vec!["get", "outside"]);
        assert_eq!(g.get("get").unwrap().line, 2);
        // `if (key) {` is not a method and the nested `}` on line 5 ends the class.
        assert_eq!(
            edges(&g, "get"),
            vec![("get".to_string(), 2), ("get".to_string(), 4)]
        );
        assert_eq!(
            edges(&g, "outside"),
            vec![("outside".to_string(), 9), ("get".to_string(), 10)]
        );
    }

    #[test]
    fn brace_block_lone_brace_leaves_class() {
        let src = "class A {\n  one() {\n  }\n  two() {\n  }\n}\n";
        let g = BraceBlockScanner.scan(src).unwrap();
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["one"]);
    }

    #[test]
    fn brace_block_methods_need_class_context() {
        let src = "render(view) {\n  draw(view);\n}\n";
        let g = BraceBlockScanner.scan(src).unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn brace_block_has_no_called_by() {
        let g = BraceBlockScanner
            .scan("function a() {}\nfunction b() {\n  a();\n}\n")
            .unwrap();
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(
            v,
            json!({
                "a": {"calls": [{"function": "a", "line": 1}], "line": 1},
                "b": {
                    "calls": [{"function": "b", "line": 2}, {"function": "a", "line": 3}],
                    "line": 2
                }
            })
        );
    }

    #[test]
    fn java_methods_and_calls() {
        let src = "public class App {\n    private static int helper(int x) {\n        return x;\n    }\n\n    public static void main(String[] args) throws Exception {\n        if (args.length > 0) {\n            helper(1);\n        }\n        run();\n    }\n\n    void run() {\n        helper(2);\n    }\n}\n";
        let g = JavaScanner.scan(src).unwrap();

        assert_eq!(g.names().collect::<Vec<_>>(), vec!["helper", "main", "run"]);
        assert_eq!(g.get("main").unwrap().line, 6);
        // `run` is declared after main's call site.
        assert_eq!(edges(&g, "main"), vec![("helper".to_string(), 8)]);
        assert_eq!(edges(&g, "run"), vec![("helper".to_string(), 14)]);
        assert_eq!(
            g.get("helper").unwrap().called_by,
            Some(vec![CallEdge::new("main", 8), CallEdge::new("run", 14)])
        );
        assert_back_edges_consistent(&g);
    }

    #[test]
    fn java_generic_return_types() {
        let src = "    public Map<String, List<Integer>> index(String s) {\n    }\n    protected <T> T first(List<T> xs) {\n    }\n";
        let g = JavaScanner.scan(src).unwrap();
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["index", "first"]);
    }

    #[test]
    fn java_control_flow_is_not_a_method() {
        let src = "void a() {\n    else if (x) {\n    }\n    return b(x) {\n}\n";
        let g = JavaScanner.scan(src).unwrap();
        assert_eq!(g.names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn heuristics_accept_garbage() {
        let junk = "\u{0}\u{1}}}}{{{ ((( ))) => class\n\t\tfunction (\n";
        assert!(BraceBlockScanner.scan(junk).is_ok());
        assert!(ShellScanner.scan(junk).unwrap().is_empty());
        assert!(JavaScanner.scan(junk).unwrap().is_empty());
    }
}
