//! Extension → handler routing for a single decoded file.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::error::MapResult;
use crate::graph::CallGraph;
use crate::lang::ScannerKind;

/// Every extension a batch accepts. `Dockerfile` is matched on the bare file name.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".py",
    ".js",
    ".ts",
    ".sh",
    ".java",
    ".txt",
    ".md",
    "Dockerfile",
    ".json",
    ".yaml",
    ".yml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Code(ScannerKind),
    Text,
    Json,
    Yaml,
    Unknown,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Self {
        if let Some(scanner) = ScannerKind::for_extension(ext) {
            return FileKind::Code(scanner);
        }
        match ext {
            ".txt" | ".md" | "Dockerfile" => FileKind::Text,
            ".json" => FileKind::Json,
            ".yaml" | ".yml" => FileKind::Yaml,
            _ => FileKind::Unknown,
        }
    }
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext)
}

/// Extension key used for routing: `.ext` of the base name (case preserved),
/// `Dockerfile` for a file literally named so, empty when there is none.
pub fn file_extension(filename: &str) -> String {
    let path = Path::new(filename);
    if path.file_name().and_then(|n| n.to_str()) == Some("Dockerfile") {
        return "Dockerfile".to_string();
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Outcome of decoding a structured-data file.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Content(serde_json::Value),
    Error(&'static str),
}

/// Result for files that have no call-graph semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum DataRecord {
    Text { lines: Vec<String> },
    Json(Decoded),
    Yaml(Decoded),
    Unknown { content: String },
}

impl Serialize for DataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            DataRecord::Text { lines } => {
                map.serialize_entry("type", "text")?;
                map.serialize_entry("lines", lines)?;
            }
            DataRecord::Json(decoded) | DataRecord::Yaml(decoded) => {
                let tag = if matches!(self, DataRecord::Json(_)) { "json" } else { "yaml" };
                map.serialize_entry("type", tag)?;
                match decoded {
                    Decoded::Content(v) => map.serialize_entry("content", v)?,
                    Decoded::Error(e) => map.serialize_entry("error", e)?,
                }
            }
            DataRecord::Unknown { content } => {
                map.serialize_entry("type", "unknown")?;
                map.serialize_entry("content", content)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FileReport {
    Graph(CallGraph),
    Data(DataRecord),
}

impl FileReport {
    pub fn as_graph(&self) -> Option<&CallGraph> {
        match self {
            FileReport::Graph(g) => Some(g),
            FileReport::Data(_) => None,
        }
    }
}

/// Route `content` by `extension`. Only Python parse failures are errors;
/// malformed JSON/YAML becomes an error-tagged record.
pub fn dispatch(content: &str, extension: &str, config: &Config) -> MapResult<FileReport> {
    let kind = FileKind::from_extension(extension);
    crate::debug_log!("[dispatch] {extension:?} -> {kind:?}");

    let report = match kind {
        FileKind::Code(scanner) => {
            FileReport::Graph(scanner.scan(content, &config.fixture_marker)?)
        }
        FileKind::Text => FileReport::Data(text_preview(content, config.text_preview_lines)),
        FileKind::Json => FileReport::Data(DataRecord::Json(decode_json(content))),
        FileKind::Yaml => FileReport::Data(DataRecord::Yaml(decode_yaml(content))),
        FileKind::Unknown => FileReport::Data(DataRecord::Unknown {
            content: content.chars().take(config.unknown_preview_chars).collect(),
        }),
    };
    Ok(report)
}

fn text_preview(content: &str, max_lines: usize) -> DataRecord {
    DataRecord::Text {
        lines: content.lines().take(max_lines).map(str::to_string).collect(),
    }
}

fn decode_json(content: &str) -> Decoded {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(v) => Decoded::Content(v),
        Err(_) => Decoded::Error("Invalid JSON"),
    }
}

/// YAML that cannot be expressed as JSON (e.g. sequence keys) counts as invalid.
fn decode_yaml(content: &str) -> Decoded {
    serde_yaml::from_str::<serde_yaml::Value>(content)
        .ok()
        .and_then(|v| serde_json::to_value(v).ok())
        .map(Decoded::Content)
        .unwrap_or(Decoded::Error("Invalid YAML"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(content: &str, ext: &str) -> serde_json::Value {
        let report = dispatch(content, ext, &Config::default()).unwrap();
        serde_json::to_value(report).unwrap()
    }

    #[test]
    fn json_records() {
        assert_eq!(run(r#"{"a":1}"#, ".json"), json!({"type": "json", "content": {"a": 1}}));
        assert_eq!(run("{bad", ".json"), json!({"type": "json", "error": "Invalid JSON"}));
        assert_eq!(run("null", ".json"), json!({"type": "json", "content": null}));
    }

    #[test]
    fn yaml_records() {
        assert_eq!(
            run("name: app\nports:\n  - 80\n  - 443\n", ".yml"),
            json!({"type": "yaml", "content": {"name": "app", "ports": [80, 443]}})
        );
        assert_eq!(
            run("key: [unclosed\n", ".yaml"),
            json!({"type": "yaml", "error": "Invalid YAML"})
        );
        assert_eq!(
            run("? [a, b]\n: value\n", ".yaml"),
            json!({"type": "yaml", "error": "Invalid YAML"})
        );
    }

    #[test]
    fn text_preview_keeps_first_lines() {
        let content: String = (1..=15).map(|i| format!("line {i}\n")).collect();
        let v = run(&content, ".md");
        assert_eq!(v["type"], "text");
        let lines = v["lines"].as_array().unwrap();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[9], "line 10");

        assert_eq!(run("FROM rust:1\n", "Dockerfile")["lines"], json!(["FROM rust:1"]));
    }

    #[test]
    fn unknown_keeps_prefix_chars() {
        let content = "é".repeat(150);
        let v = run(&content, ".cfg");
        assert_eq!(v["type"], "unknown");
        assert_eq!(v["content"].as_str().unwrap().chars().count(), 100);
    }

    #[test]
    fn code_routes_to_graph() {
        let report = dispatch("def f():\n    g()\n", ".py", &Config::default()).unwrap();
        assert!(report.as_graph().unwrap().contains("f"));

        let report = dispatch("f() {\n  :\n}\n", ".sh", &Config::default()).unwrap();
        assert!(report.as_graph().unwrap().contains("f"));
    }

    #[test]
    fn python_parse_failure_propagates() {
        assert!(dispatch("def (:\n", ".py", &Config::default()).is_err());
    }

    #[test]
    fn extensions() {
        assert_eq!(file_extension("src/app.py"), ".py");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("docker/Dockerfile"), "Dockerfile");
        assert_eq!(file_extension("Makefile"), "");
        assert_eq!(file_extension(".bashrc"), "");
        assert_eq!(file_extension("README.MD"), ".MD");
        assert!(is_allowed_extension(".yml"));
        assert!(!is_allowed_extension(".MD"));
        assert!(!is_allowed_extension(""));
    }
}
