use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the optional per-directory configuration file.
pub const CONFIG_FILE_NAME: &str = ".mapmycode.json";

/// Controls how the CLI discovers files on disk.
///
/// `.gitignore` is always respected; these are additional hard skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (compared against path components).
    pub exclude_dir_names: Vec<String>,
    /// Files larger than this are never read into a batch.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            max_file_bytes: 1_000_000,
        }
    }
}

/// Retry policy for the describe collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribeConfig {
    /// Total attempts, including the first one.
    pub retries: u32,
    /// Wait between attempts after a rate-limit response.
    pub delay_secs: u64,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest batch accepted; one more file rejects the whole request.
    pub max_files: usize,
    /// Lines kept for `.txt` / `.md` / `Dockerfile` previews.
    pub text_preview_lines: usize,
    /// Characters kept for files of unknown type.
    pub unknown_preview_chars: usize,
    /// Decorator identifier that marks a Python fixture.
    pub fixture_marker: String,
    pub describe: DescribeConfig,
    pub scan: ScanConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_files: 1000,
            text_preview_lines: 10,
            unknown_preview_chars: 100,
            fixture_marker: "fixture".to_string(),
            describe: DescribeConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

/// Load `.mapmycode.json` from `root`. Missing or malformed files yield defaults.
pub fn load_config(root: &Path) -> Config {
    let primary = root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|_| Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(tmp.path());
        assert_eq!(cfg.max_files, 1000);
        assert_eq!(cfg.fixture_marker, "fixture");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{"max_files": 5, "describe": {"retries": 1}}"#,
        )
        .unwrap();
        let cfg = load_config(tmp.path());
        assert_eq!(cfg.max_files, 5);
        assert_eq!(cfg.describe.retries, 1);
        assert_eq!(cfg.describe.delay_secs, 5);
        assert_eq!(cfg.text_preview_lines, 10);
    }

    #[test]
    fn malformed_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "{not json").unwrap();
        assert_eq!(load_config(tmp.path()).unknown_preview_chars, 100);
    }
}
