//! Concurrent download scheduler
//!
//! Jobs are dealt round-robin onto a fixed number of lanes; each lane works
//! through its share in order and the lanes run concurrently. Per file the lane
//! downloads the `.dat`, saves it (unpacking the zip archive the CDN serves),
//! records it in the resume state and, for bundles, decodes and extracts it on a
//! blocking thread. One file failing never stops its lane.

use arkassets_formats::bundle::decode;
use arkassets_formats::extract::{Scanner, unpack};
use futures::future::join_all;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::manifest::AssetRecord;
use crate::progress::{Progress, Stage, format_size};
use crate::resume::ResumeStore;
use crate::retry::RetryPolicy;
use crate::server::ServerEndpoints;
use crate::transport::HttpClient;
use crate::url::{asset_url, is_bundle_path};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// One file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Manifest path, also the save path under the save directory
    pub relative_path: String,
    /// Checksum recorded in the resume state on success
    pub declared_checksum: String,
    /// Transfer size from the manifest
    pub declared_size: u64,
}

impl DownloadJob {
    pub fn new(relative_path: &str, record: &AssetRecord) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            declared_checksum: record.checksum.clone(),
            declared_size: record.compressed_size,
        }
    }
}

/// Outcome of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Jobs handed to the lanes
    pub scheduled: usize,
    /// Jobs saved and recorded
    pub succeeded: usize,
    /// Relative path and cause of each failed file
    pub failed: Vec<(String, String)>,
    /// Body bytes received
    pub downloaded_bytes: u64,
    /// Wall time of the whole batch
    pub elapsed: Duration,
}

#[derive(Default)]
struct LaneOutcome {
    succeeded: usize,
    failed: Vec<(String, String)>,
    bytes: u64,
}

/// Deal `jobs` onto `concurrency` lanes: job `i` goes to lane `i % concurrency`
pub fn assign_lanes(jobs: Vec<DownloadJob>, concurrency: usize) -> Vec<Vec<DownloadJob>> {
    let lanes = concurrency.max(1).min(jobs.len().max(1));
    let mut out: Vec<Vec<DownloadJob>> = (0..lanes).map(|_| Vec::new()).collect();
    for (i, job) in jobs.into_iter().enumerate() {
        out[i % lanes].push(job);
    }
    out
}

/// Advances every per-file counter exactly once, even on early return
struct FileProgress<'a> {
    progress: &'a Progress,
    unzip: bool,
    unpack: bool,
}

impl<'a> FileProgress<'a> {
    fn new(progress: &'a Progress) -> Self {
        Self {
            progress,
            unzip: false,
            unpack: false,
        }
    }

    fn unzipped(&mut self) {
        if !self.unzip {
            self.unzip = true;
            self.progress.advance(Stage::Unzip);
        }
    }

    fn unpacked(&mut self) {
        if !self.unpack {
            self.unpack = true;
            self.progress.advance(Stage::Unpack);
        }
    }
}

impl Drop for FileProgress<'_> {
    fn drop(&mut self) {
        self.unzipped();
        self.unpacked();
        self.progress.advance(Stage::Total);
    }
}

/// Write downloaded bytes under `root`.
///
/// Zip archives are extracted in place (their entry names are relative paths);
/// anything else is stored at `relative_path`.
pub fn save_payload(root: &Path, relative_path: &str, bytes: &[u8]) -> Result<(), DownloadError> {
    if bytes.starts_with(ZIP_MAGIC) {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        debug!("Extracting {} archive entries for {}", archive.len(), relative_path);
        archive.extract(root)?;
        return Ok(());
    }

    let target = root.join(relative_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&target, bytes).map_err(|source| DownloadError::Io {
        path: target.clone(),
        source,
    })
}

fn join_error(path: &Path, e: &tokio::task::JoinError) -> DownloadError {
    DownloadError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    }
}

/// Decode and extract one saved bundle; failures are logged, never returned
fn unpack_saved(scanner: &Scanner, root: &Path, relative_path: &str) {
    let source = root.join(relative_path);
    let bytes = match fs::read(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("[{}] unpack skipped, cannot read {}: {}", relative_path, source.display(), e);
            return;
        }
    };

    let payload = match decode(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("[{}] decode failed, keeping raw file: {}", relative_path, e);
            return;
        }
    };

    match unpack(scanner, &payload, &source, relative_path) {
        Ok(report) if report.failed > 0 => warn!(
            "[{}] {} assets written, {} failed",
            relative_path,
            report.written.len(),
            report.failed
        ),
        Ok(_) => {}
        Err(e) => warn!("[{}] extraction failed: {}", relative_path, e),
    }
}

/// Downloads a batch of files for one resource version
pub struct DownloadScheduler {
    client: HttpClient,
    endpoints: ServerEndpoints,
    res_version: String,
    store: Arc<ResumeStore>,
    progress: Arc<Progress>,
    retry: RetryPolicy,
    scanner: Arc<Scanner>,
    unpack_all: bool,
}

impl DownloadScheduler {
    pub fn new(
        client: HttpClient,
        endpoints: ServerEndpoints,
        res_version: &str,
        store: Arc<ResumeStore>,
        progress: Arc<Progress>,
    ) -> Self {
        Self {
            client,
            endpoints,
            res_version: res_version.to_string(),
            store,
            progress,
            retry: RetryPolicy::default(),
            scanner: Arc::new(Scanner::default()),
            unpack_all: false,
        }
    }

    /// Retry policy for asset requests
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Treat every file as a bundle, not only `.ab` files
    pub fn with_unpack_all(mut self, unpack_all: bool) -> Self {
        self.unpack_all = unpack_all;
        self
    }

    /// Scanner used for extraction
    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = Arc::new(scanner);
        self
    }

    fn root(&self) -> PathBuf {
        self.store.root().to_path_buf()
    }

    /// Download `jobs` over `concurrency` lanes
    pub async fn run(&self, jobs: Vec<DownloadJob>, concurrency: usize) -> BatchReport {
        let start = Instant::now();
        let scheduled = jobs.len();
        self.progress.begin(scheduled as u64);

        let lanes = assign_lanes(jobs, concurrency);
        info!(
            "Downloading {} files over {} lanes",
            scheduled,
            if scheduled == 0 { 0 } else { lanes.len() }
        );

        let outcomes = join_all(
            lanes
                .into_iter()
                .enumerate()
                .map(|(lane, jobs)| self.run_lane(lane, jobs)),
        )
        .await;

        let mut report = BatchReport {
            scheduled,
            ..BatchReport::default()
        };
        for outcome in outcomes {
            report.succeeded += outcome.succeeded;
            report.downloaded_bytes += outcome.bytes;
            report.failed.extend(outcome.failed);
        }
        report.elapsed = start.elapsed();
        report
    }

    async fn run_lane(&self, lane: usize, jobs: Vec<DownloadJob>) -> LaneOutcome {
        let mut outcome = LaneOutcome::default();

        for job in jobs {
            let mut file_progress = FileProgress::new(&self.progress);
            match self.process(&job, &mut file_progress).await {
                Ok(bytes) => {
                    outcome.succeeded += 1;
                    outcome.bytes += bytes;
                }
                Err(e) => {
                    warn!(
                        "[{}] {} failed on lane {}: {}",
                        job.relative_path,
                        e.stage(),
                        lane,
                        e
                    );
                    self.progress
                        .log(format!("[{}] failed: {}", job.relative_path, e));
                    outcome.failed.push((job.relative_path.clone(), e.to_string()));
                }
            }
        }
        outcome
    }

    async fn process(
        &self,
        job: &DownloadJob,
        file_progress: &mut FileProgress<'_>,
    ) -> Result<u64, DownloadError> {
        let url = asset_url(&self.endpoints, &self.res_version, &job.relative_path);
        let started = Instant::now();
        let bytes = self.retry.execute(|| self.client.get_bytes(&url)).await?;
        let size = bytes.len() as u64;
        self.progress.add_bytes(size);

        let secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
        let speed = format_size((size as f64 / secs) as u64);
        info!(
            "[{}] downloaded {} in {:.3}s ({}/s)",
            job.relative_path,
            format_size(size),
            secs,
            speed
        );

        let root = self.root();
        let store = Arc::clone(&self.store);
        let path = job.relative_path.clone();
        let checksum = job.declared_checksum.clone();
        let save_root = root.clone();
        tokio::task::spawn_blocking(move || -> Result<(), DownloadError> {
            save_payload(&save_root, &path, &bytes)?;
            store.record_success(&path, &checksum)?;
            Ok(())
        })
        .await
        .map_err(|e| join_error(&root.join(&job.relative_path), &e))??;
        file_progress.unzipped();
        self.progress.log(format!("[{}] saved", job.relative_path));

        if self.unpack_all || is_bundle_path(&job.relative_path) {
            let scanner = Arc::clone(&self.scanner);
            let path = job.relative_path.clone();
            let unpack_root = root.clone();
            if let Err(e) =
                tokio::task::spawn_blocking(move || unpack_saved(&scanner, &unpack_root, &path))
                    .await
            {
                warn!("[{}] unpack task failed: {}", job.relative_path, e);
            }
        }
        file_progress.unpacked();

        Ok(size)
    }
}
