pub mod heuristic;
pub mod python;

use crate::error::MapResult;
use crate::graph::CallGraph;

pub use heuristic::{BraceBlockScanner, JavaScanner, ShellScanner};
pub use python::{list_functions, FunctionSummary, PythonScanner};

pub trait LanguageScanner: Send + Sync {
    fn name(&self) -> &'static str;
    /// File extensions handled by this scanner (with the leading dot).
    fn extensions(&self) -> &'static [&'static str];
    fn scan(&self, source_text: &str) -> MapResult<CallGraph>;
}

/// Every source dialect that produces a call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerKind {
    Python,
    BraceBlock,
    Shell,
    Java,
}

impl ScannerKind {
    pub const ALL: [ScannerKind; 4] = [
        ScannerKind::Python,
        ScannerKind::BraceBlock,
        ScannerKind::Shell,
        ScannerKind::Java,
    ];

    pub fn for_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext))
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ScannerKind::Python => PythonScanner::EXTENSIONS,
            ScannerKind::BraceBlock => BraceBlockScanner.extensions(),
            ScannerKind::Shell => ShellScanner.extensions(),
            ScannerKind::Java => JavaScanner.extensions(),
        }
    }

    pub fn scan(self, source_text: &str, fixture_marker: &str) -> MapResult<CallGraph> {
        match self {
            ScannerKind::Python => run(&PythonScanner::new(fixture_marker), source_text),
            ScannerKind::BraceBlock => run(&BraceBlockScanner, source_text),
            ScannerKind::Shell => run(&ShellScanner, source_text),
            ScannerKind::Java => run(&JavaScanner, source_text),
        }
    }
}

fn run(scanner: &dyn LanguageScanner, source_text: &str) -> MapResult<CallGraph> {
    let graph = scanner.scan(source_text)?;
    crate::debug_log!("[scan] {} -> {} definitions", scanner.name(), graph.len());
    Ok(graph)
}
