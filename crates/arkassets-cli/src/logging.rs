//! Tracing setup for the command-line tool.
//!
//! Console output goes to stderr through the progress display so log lines never
//! tear the bars. With `--log-file` a second, uncolored copy is appended to a file.

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter; `RUST_LOG` is the fallback
pub const LOG_ENV: &str = "ARKASSETS_LOG";

/// Filter used when neither variable is set
pub const DEFAULT_FILTER: &str = "info";

/// Writes to stderr with the progress bars hidden
#[derive(Clone)]
pub struct SuspendingWriter {
    multi: MultiProgress,
}

impl SuspendingWriter {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for SuspendingWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Log filter from `ARKASSETS_LOG`, then `RUST_LOG`, then [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Open `path` for appending, creating it if needed
pub fn open_log_file(path: &Path) -> Result<Mutex<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    Ok(Mutex::new(file))
}

/// Install the global subscriber
pub fn init(multi: &MultiProgress, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(open_log_file(path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(SuspendingWriter::new(multi.clone())))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log_line(path: &Path, message: &str) {
        let writer = open_log_file(path).expect("Test operation should succeed");
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(writer));
        tracing::subscriber::with_default(subscriber, || tracing::info!("{}", message));
    }

    #[test]
    fn test_log_file_appends() {
        let dir = TempDir::new().expect("Test operation should succeed");
        let path = dir.path().join("arkassets.log");

        log_line(&path, "saved arts/ui/pack.ab");
        log_line(&path, "extracted 3 assets");

        let contents = std::fs::read_to_string(&path).expect("Test operation should succeed");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].ends_with("saved arts/ui/pack.ab"));
        assert!(lines[1].ends_with("extracted 3 assets"));
        assert!(!contents.contains('\x1b'));
    }

    #[test]
    fn test_log_file_in_missing_directory() {
        let dir = TempDir::new().expect("Test operation should succeed");
        let err = open_log_file(&dir.path().join("missing").join("arkassets.log")).unwrap_err();
        assert!(err.to_string().starts_with("cannot open log file"));
    }
}
