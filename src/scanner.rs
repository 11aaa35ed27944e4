use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::batch::UploadedFile;
use crate::config::ScanConfig;
use crate::error::MapError;

fn default_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Lockfiles are allow-listed extensions but never worth mapping.
    ob.add("!**/package-lock.json")?;
    ob.add("!**/pnpm-lock.yaml")?;

    // Overrides are whitelist globs unless negated; directories need both the
    // entry and its descendants or the walker still descends.
    for d in [
        ".git",
        "node_modules",
        "target",
        "dist",
        "build",
        "coverage",
        "__pycache__",
        ".venv",
        "venv",
        ".tox",
    ] {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

/// Where a collected file came from on disk and the name it is submitted under.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    pub filename: String,
}

/// Walk each target (file or directory) below `root`, honouring `.gitignore`,
/// and return the files in a stable order. Filenames are `/`-separated paths
/// relative to `root` when the file lives under it.
pub fn collect_entries(
    root: &Path,
    targets: &[PathBuf],
    cfg: &ScanConfig,
) -> Result<Vec<FileEntry>> {
    let overrides = default_overrides(root, &cfg.exclude_dir_names)?;
    let mut entries = Vec::new();

    for target in targets {
        let abs = if target.is_absolute() {
            target.clone()
        } else {
            root.join(target)
        };
        let meta = std::fs::metadata(&abs)
            .with_context(|| format!("Target does not exist: {}", abs.display()))?;

        if meta.is_file() {
            // An explicitly named file is always submitted, even if ignored.
            if meta.len() <= cfg.max_file_bytes {
                entries.push(entry_for(root, abs));
            }
            continue;
        }

        let walker = WalkBuilder::new(&abs)
            .standard_filters(true)
            .overrides(overrides.clone())
            .build();

        for item in walker {
            let dent = match item {
                Ok(d) => d,
                Err(_) => continue,
            };
            if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let abs_path = dent.into_path();
            let bytes = match std::fs::metadata(&abs_path).map(|m| m.len()) {
                Ok(b) => b,
                Err(_) => continue,
            };
            if bytes == 0 || bytes > cfg.max_file_bytes {
                continue;
            }
            entries.push(entry_for(root, abs_path));
        }
    }

    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    entries.dedup_by(|a, b| a.abs_path == b.abs_path);
    Ok(entries)
}

/// Read every collected entry into memory, ready for a batch. More than
/// `max_files` entries is rejected before any file is opened.
pub fn read_uploads(entries: &[FileEntry], max_files: usize) -> Result<Vec<UploadedFile>> {
    if entries.len() > max_files {
        return Err(MapError::BatchTooLarge {
            count: entries.len(),
            max: max_files,
        }
        .into());
    }

    entries
        .iter()
        .map(|e| {
            let bytes = std::fs::read(&e.abs_path)
                .with_context(|| format!("Failed to read {}", e.abs_path.display()))?;
            Ok(UploadedFile::new(e.filename.clone(), bytes))
        })
        .collect()
}

fn entry_for(root: &Path, abs_path: PathBuf) -> FileEntry {
    let shown = abs_path.strip_prefix(root).unwrap_or(&abs_path);
    let filename = shown.to_string_lossy().replace('\\', "/");
    FileEntry { abs_path, filename }
}
