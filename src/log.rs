use std::sync::Mutex;

/// Sink for per-request processing messages.
///
/// Passed explicitly into the components that report progress so that no
/// logging state lives in globals. Implementations must tolerate calls from
/// several rayon workers at once.
pub trait FileLog: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes `INFO:` / `ERROR:` lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLog;

impl FileLog for StderrLog {
    fn info(&self, message: &str) {
        eprintln!("INFO: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("ERROR: {message}");
    }
}

/// Discards everything. Used by front ends that must keep stdout/stderr clean.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl FileLog for NullLog {
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Keeps every message in memory, prefixed with its level.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix("ERROR: ").map(str::to_string))
            .collect()
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl FileLog for MemoryLog {
    fn info(&self, message: &str) {
        self.push(format!("INFO: {message}"));
    }

    fn error(&self, message: &str) {
        self.push(format!("ERROR: {message}"));
    }
}
