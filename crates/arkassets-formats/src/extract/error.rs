//! Error types for asset extraction

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while writing one extracted asset
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ExtractionError {
    #[error("asset {name} range {offset}+{size} exceeds payload of {len} bytes")]
    OutOfBounds {
        name: String,
        offset: usize,
        size: usize,
        len: usize,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON formatting failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for extraction
pub type ExtractResult<T> = std::result::Result<T, ExtractionError>;
