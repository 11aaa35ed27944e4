//! Batch orchestration with per-file error isolation.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::{dispatch, file_extension, is_allowed_extension, FileReport};
use crate::error::{MapError, MapResult};
use crate::log::FileLog;

/// One uploaded file: its name as given by the caller and the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Filename → result. Skipped files are simply absent.
pub type BatchOutput = BTreeMap<String, FileReport>;

pub struct BatchProcessor {
    config: Config,
    log: Arc<dyn FileLog>,
}

impl BatchProcessor {
    pub fn new(config: Config, log: Arc<dyn FileLog>) -> Self {
        Self { config, log }
    }

    /// Process every file independently. The only error is
    /// [`MapError::BatchTooLarge`], raised before any file is looked at; every
    /// per-file failure is logged and the file left out of the output.
    pub fn process(&self, files: &[UploadedFile]) -> MapResult<BatchOutput> {
        if files.len() > self.config.max_files {
            let err = MapError::BatchTooLarge {
                count: files.len(),
                max: self.config.max_files,
            };
            self.log.error(&err.to_string());
            return Err(err);
        }

        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        self.log.info(&format!("Received files: {names:?}"));

        let reports: Vec<(&str, Option<FileReport>)> = files
            .par_iter()
            .map(|f| (f.filename.as_str(), self.process_file(f)))
            .collect();

        // Insert in submission order so a repeated filename keeps its last result.
        let mut out = BatchOutput::new();
        for (name, report) in reports {
            if let Some(report) = report {
                out.insert(name.to_string(), report);
            }
        }
        Ok(out)
    }

    /// Process a single file, converting any failure into `None` plus a log line.
    pub fn process_file(&self, file: &UploadedFile) -> Option<FileReport> {
        match self.try_process_file(file) {
            Ok(report) => Some(report),
            Err(e) => {
                self.log
                    .error(&format!("Error processing file {}: {e}", file.filename));
                None
            }
        }
    }

    fn try_process_file(&self, file: &UploadedFile) -> MapResult<FileReport> {
        let ext = file_extension(&file.filename);
        if !is_allowed_extension(&ext) {
            return Err(MapError::UnsupportedExtension(ext));
        }

        let content = std::str::from_utf8(&file.bytes)?;
        self.log.info(&format!("Processing file: {}", file.filename));
        dispatch(content, &ext, &self.config)
    }
}
