//! # arkassets-protocol - Arknights resource acquisition
//!
//! This crate fetches a server's version descriptor and hot-update manifest,
//! decides which files need downloading from a persisted resume state, and
//! downloads them concurrently into a save directory. Downloaded UnityFS bundles
//! are handed to `arkassets-formats` for decoding and asset extraction.
//!
//! ## Flow
//!
//! 1. **Version**: [`ManifestResolver::fetch_version`] reads `resVersion` and
//!    `clientVersion`; [`VersionCache`] compares them with the last run
//! 2. **Manifest**: `hot_update_list.json` is indexed into packages
//!    ([`AssetManifest`]); files without a known package land in `other`
//! 3. **Resume**: [`ResumeStore::plan`] skips files whose checksum is unchanged
//!    and deletes the stale output of changed ones
//! 4. **Download**: [`DownloadScheduler`] deals jobs onto lanes, saves each file,
//!    records it, then decodes and extracts bundles off the async runtime
//!
//! [`Progress`] tracks three counters per batch plus a short rolling log that a
//! front end can poll.
//!
//! ## Example
//!
//! ```rust,no_run
//! use arkassets_protocol::{Pipeline, PipelineConfig, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig {
//!         server: Server::Official,
//!         packages: Some(vec!["gamedata/levels".to_string()]),
//!         ..PipelineConfig::default()
//!     };
//!     let report = Pipeline::new(config)?.run().await?;
//!     println!("{} of {} files downloaded", report.batch.succeeded, report.batch.scheduled);
//!     Ok(())
//! }
//! ```
//!
//! ## Environment
//!
//! - `ARKASSETS_SERVER`, `ARKASSETS_SAVEDIR`, `ARKASSETS_THREADS`, `ARKASSETS_PACKAGES`
//! - `ARKASSETS_REQUEST_TIMEOUT`, `ARKASSETS_CONNECT_TIMEOUT` (seconds)
//! - `ARKASSETS_MAX_RETRIES`, `ARKASSETS_RETRY_BACKOFF_MS`, `ARKASSETS_MAX_BACKOFF_SECS`,
//!   `ARKASSETS_BACKOFF_MULTIPLIER`, `ARKASSETS_RETRY_JITTER`
//!
//! Like `reqwest` with `rustls-no-provider`, callers must install a rustls
//! crypto provider before the first request.
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Domain terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::future_not_send)] // Threading requirements
#![allow(clippy::significant_drop_tightening)] // Resume state is persisted under its lock

pub mod config;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod resume;
pub mod retry;
pub mod scheduler;
pub mod server;
pub mod transport;
pub mod url;
pub mod version;

// Re-export main types
pub use config::PipelineConfig;
pub use error::{
    DownloadError, ManifestFetchError, PipelineError, ProtocolError, ResumeError, Result,
};
pub use manifest::{AssetManifest, AssetRecord, ManifestResolver, PackageInfo, ResolvedManifest};
pub use pipeline::{Pipeline, PipelineReport};
pub use progress::{Progress, ProgressSnapshot, Stage, format_size};
pub use resume::{ResumePlan, ResumeStore};
pub use retry::RetryPolicy;
pub use scheduler::{BatchReport, DownloadJob, DownloadScheduler};
pub use server::{Server, ServerEndpoints};
pub use transport::{HttpClient, HttpConfig};
pub use version::{UpdateStatus, VersionCache, VersionInfo};
