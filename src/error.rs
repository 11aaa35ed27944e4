use thiserror::Error;

pub type MapResult<T> = Result<T, MapError>;

#[derive(Error, Debug)]
pub enum MapError {
    /// The Python grammar could not build a clean tree; the whole file is rejected.
    #[error("Parse error in {language} source at line {line}: {message}")]
    Parse {
        language: &'static str,
        line: usize,
        message: String,
    },

    #[error("File is not valid UTF-8 text: {0}")]
    Decode(#[from] std::str::Utf8Error),

    #[error("Unsupported file extension: {0:?}")]
    UnsupportedExtension(String),

    /// Batch-level rejection; raised before any file is opened.
    #[error("Too many files: {count} submitted, maximum is {max}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("Failed to load tree-sitter grammar: {0}")]
    Language(String),
}

impl MapError {
    /// True for errors that reject a whole request rather than a single file.
    pub fn is_batch_level(&self) -> bool {
        matches!(self, MapError::BatchTooLarge { .. })
    }
}
