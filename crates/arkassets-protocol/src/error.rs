//! Error types for protocol operations

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Transport-level failure of a single HTTP request
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status: {0}")]
    HttpStatus(StatusCode),

    #[error("Server error: {0}")]
    ServerError(StatusCode),

    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout")]
    Timeout,
}

impl ProtocolError {
    /// Check if error is retryable
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Io(_) | Self::ServerError(_) | Self::Timeout => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus(status) => *status == StatusCode::TOO_MANY_REQUESTS,
            Self::Parse(_) => false,
        }
    }

    /// Status code carried by this error, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus(status) | Self::ServerError(status) => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Failure to obtain the version descriptor or the hot-update manifest.
///
/// Fatal for a run: nothing is downloaded without a manifest.
#[derive(Debug, Error)]
pub enum ManifestFetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: ProtocolError,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifestFetchError {
    pub(crate) fn from_protocol(url: &str, error: ProtocolError) -> Self {
        let url = url.to_string();
        match error {
            ProtocolError::HttpStatus(status) | ProtocolError::ServerError(status) => {
                Self::Status { url, status }
            }
            ProtocolError::Parse(message) => Self::Parse { url, message },
            source => Self::Http { url, source },
        }
    }
}

/// Failure to read or persist the resume state
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize resume state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of one file in a download batch
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("fetch failed: {0}")]
    Http(#[source] ProtocolError),

    #[error("server returned HTTP {0}")]
    Status(StatusCode),

    #[error("write to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("resume state: {0}")]
    Resume(#[from] ResumeError),
}

impl From<ProtocolError> for DownloadError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::HttpStatus(status) | ProtocolError::ServerError(status) => {
                Self::Status(status)
            }
            other => Self::Http(other),
        }
    }
}

impl DownloadError {
    /// Pipeline stage the error belongs to, for log output
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Http(_) | Self::Status(_) => "download",
            Self::Io { .. } | Self::Archive(_) => "save",
            Self::Resume(_) => "record",
        }
    }
}

/// Fatal errors that stop a pipeline run before or between batches
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Manifest(#[from] ManifestFetchError),

    #[error(transparent)]
    Resume(#[from] ResumeError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] ProtocolError),
}
