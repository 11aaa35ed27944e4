//! Per-file call graph and its two-phase builder.
//!
//! Scanners first register every definition and its outgoing calls; only when
//! the whole file has been seen does [`GraphBuilder::finish`] derive the
//! `called_by` back-edges. Edges whose callee is not a key of the graph stay in
//! `calls` and never appear in any `called_by` list.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    /// Callee name in `calls`, caller name in `called_by`.
    pub function: String,
    /// 1-based line of the call site.
    pub line: usize,
    /// Set only for edges inferred from a fixture parameter.
    #[serde(skip_serializing_if = "is_false")]
    pub implicit: bool,
}

impl CallEdge {
    pub fn new(function: impl Into<String>, line: usize) -> Self {
        Self {
            function: function.into(),
            line,
            implicit: false,
        }
    }

    pub fn implicit(function: impl Into<String>, line: usize) -> Self {
        Self {
            function: function.into(),
            line,
            implicit: true,
        }
    }
}

/// Extra metadata only the grammar-based Python scanner can recover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PythonMeta {
    pub docstring: Option<String>,
    pub params: Vec<String>,
    pub is_fixture: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionNode {
    pub calls: Vec<CallEdge>,
    /// `None` for dialects that do not track reverse edges; the field is then
    /// omitted from the serialized record entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub called_by: Option<Vec<CallEdge>>,
    /// 1-based declaration line.
    pub line: usize,
    #[serde(flatten)]
    pub meta: Option<PythonMeta>,
}

/// Insertion-ordered mapping from definition name to its node.
///
/// Re-defining a name replaces the node but keeps the position of the first
/// definition, matching how the scanners overwrite duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    nodes: Vec<(String, FunctionNode)>,
    by_name: HashMap<String, usize>,
}

impl CallGraph {
    pub fn get(&self, name: &str) -> Option<&FunctionNode> {
        self.by_name.get(name).map(|&idx| &self.nodes[idx].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionNode)> {
        self.nodes.iter().map(|(name, node)| (name.as_str(), node))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut FunctionNode> {
        let idx = *self.by_name.get(name)?;
        Some(&mut self.nodes[idx].1)
    }

    fn upsert(&mut self, name: &str, node: FunctionNode) {
        match self.by_name.get(name) {
            Some(&idx) => self.nodes[idx].1 = node,
            None => {
                self.by_name.insert(name.to_string(), self.nodes.len());
                self.nodes.push((name.to_string(), node));
            }
        }
    }
}

impl Serialize for CallGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (name, node) in &self.nodes {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

pub struct GraphBuilder {
    graph: CallGraph,
    track_called_by: bool,
}

impl GraphBuilder {
    pub fn new(track_called_by: bool) -> Self {
        Self {
            graph: CallGraph::default(),
            track_called_by,
        }
    }

    /// Register (or overwrite) a definition. Any calls recorded for an earlier
    /// definition with the same name are discarded.
    pub fn define(&mut self, name: &str, line: usize, meta: Option<PythonMeta>) {
        let node = FunctionNode {
            calls: Vec::new(),
            called_by: self.track_called_by.then(Vec::new),
            line,
            meta,
        };
        self.graph.upsert(name, node);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.graph.contains(name)
    }

    /// Append an outgoing edge to `caller`. Calls from unknown callers are dropped.
    pub fn add_call(&mut self, caller: &str, edge: CallEdge) {
        if let Some(node) = self.graph.get_mut(caller) {
            node.calls.push(edge);
        }
    }

    /// For every definition whose parameter names a fixture (other than the
    /// definition itself), append an implicit edge at the definition's line.
    pub fn link_fixtures(&mut self, fixtures: &HashSet<String>) {
        if fixtures.is_empty() {
            return;
        }
        for (name, node) in self.graph.nodes.iter_mut() {
            let Some(meta) = node.meta.as_ref() else { continue };
            let implicit: Vec<CallEdge> = meta
                .params
                .iter()
                .filter(|p| fixtures.contains(p.as_str()) && p.as_str() != name.as_str())
                .map(|p| CallEdge::implicit(p.clone(), node.line))
                .collect();
            node.calls.extend(implicit);
        }
    }

    /// Second phase: derive `called_by` from the complete set of `calls`.
    pub fn finish(mut self) -> CallGraph {
        if !self.track_called_by {
            return self.graph;
        }

        let mut back_edges: Vec<(usize, CallEdge)> = Vec::new();
        for (caller, node) in &self.graph.nodes {
            for call in &node.calls {
                if let Some(&idx) = self.graph.by_name.get(&call.function) {
                    back_edges.push((
                        idx,
                        CallEdge {
                            function: caller.clone(),
                            line: call.line,
                            implicit: call.implicit,
                        },
                    ));
                }
            }
        }

        for (idx, edge) in back_edges {
            self.graph.nodes[idx]
                .1
                .called_by
                .get_or_insert_with(Vec::new)
                .push(edge);
        }
        self.graph
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CallEdge, CallGraph};

    fn same(a: &CallEdge, function: &str, b: &CallEdge) -> bool {
        a.function == function && a.line == b.line && a.implicit == b.implicit
    }

    /// Every `calls` edge to a key has exactly one mirror in the callee's
    /// `called_by`, and every `called_by` entry mirrors a real `calls` edge.
    pub(crate) fn assert_back_edges_consistent(g: &CallGraph) {
        if g.iter().all(|(_, node)| node.called_by.is_none()) {
            return;
        }

        for (name, node) in g.iter() {
            let back = node
                .called_by
                .as_ref()
                .unwrap_or_else(|| panic!("{name} has no called_by"));

            for call in &node.calls {
                if let Some(callee) = g.get(&call.function) {
                    let mirrors = callee.called_by.as_ref().map_or(0, |b| {
                        b.iter().filter(|e| same(e, name, call)).count()
                    });
                    let sent = node.calls.iter().filter(|c| *c == call).count();
                    assert_eq!(
                        mirrors, sent,
                        "{name} -> {} at line {}",
                        call.function, call.line
                    );
                }
            }

            for edge in back {
                let caller = g
                    .get(&edge.function)
                    .unwrap_or_else(|| panic!("{name} called_by unknown {}", edge.function));
                assert!(
                    caller.calls.iter().any(|c| same(c, name, edge)),
                    "{name} <- {} at line {} has no matching call",
                    edge.function,
                    edge.line
                );
            }
        }
    }
}
