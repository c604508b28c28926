//! End to end run: version check, manifest, resume plan, downloads

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::manifest::{AssetRecord, ManifestResolver, ResolvedManifest};
use crate::progress::{Progress, format_size};
use crate::resume::ResumeStore;
use crate::scheduler::{BatchReport, DownloadJob, DownloadScheduler};
use crate::transport::HttpClient;
use crate::version::{UpdateStatus, VersionCache, VersionInfo};

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Version the manifest was resolved for
    pub version: VersionInfo,
    /// Comparison against the previous version check
    pub status: UpdateStatus,
    /// Package keys actually downloaded
    pub packages: Vec<String>,
    /// Files in the selected packages
    pub declared_files: usize,
    /// Files skipped because the resume state was current
    pub up_to_date: usize,
    /// Files downloaded again after a checksum change
    pub invalidated: usize,
    /// Entries in the resume state after the run
    pub recorded: usize,
    /// Scheduler outcome
    pub batch: BatchReport,
}

impl PipelineReport {
    /// True when every scheduled file succeeded
    pub fn is_success(&self) -> bool {
        self.batch.failed.is_empty()
    }

    /// Log the end of run summary
    pub fn log_summary(&self) {
        info!(
            "Declared {} files, scheduled {}, succeeded {}, up to date {}",
            self.declared_files, self.batch.scheduled, self.batch.succeeded, self.up_to_date
        );
        info!(
            "Downloaded {} in {:.1}s",
            format_size(self.batch.downloaded_bytes),
            self.batch.elapsed.as_secs_f64()
        );
        info!(
            "Resume state covers {} files for resVersion {}",
            self.recorded, self.version.res_version
        );
        for (path, cause) in &self.batch.failed {
            warn!("Failed: {} ({})", path, cause);
        }
    }
}

fn log_status(status: &UpdateStatus, version: &VersionInfo) {
    match status {
        UpdateStatus::FirstCheck => info!(
            "First version check: resVersion {} clientVersion {}",
            version.res_version, version.client_version
        ),
        UpdateStatus::NoUpdate => info!("No version change since the last check"),
        UpdateStatus::ResourceUpdate {
            old_version,
            new_version,
        } => info!("Resources updated from {} to {}", old_version, new_version),
        UpdateStatus::ClientUpdate {
            old_version,
            new_version,
        } => info!("Client updated from {} to {}", old_version, new_version),
        UpdateStatus::BothUpdated {
            old_res_version,
            new_res_version,
            old_client_version,
            new_client_version,
        } => info!(
            "Resources updated from {} to {}, client from {} to {}",
            old_res_version, new_res_version, old_client_version, new_client_version
        ),
    }
}

/// Downloads a server's resources into a save directory
pub struct Pipeline {
    config: PipelineConfig,
    client: HttpClient,
    resolver: ManifestResolver,
    progress: Arc<Progress>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let client = HttpClient::with_config(&config.http)?;
        let resolver =
            ManifestResolver::new(client.clone(), config.endpoints(), config.retry.clone());
        Ok(Self {
            config,
            client,
            resolver,
            progress: Arc::new(Progress::default()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shared progress, for front ends polling snapshots
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Fetch the version, compare it with the cache and resolve the manifest
    pub async fn resolve(
        &self,
    ) -> Result<(VersionInfo, UpdateStatus, ResolvedManifest), PipelineError> {
        info!(
            "Checking {} ({})",
            self.config.server.display_name(),
            self.resolver.endpoints().version_url
        );
        let version = self.resolver.fetch_version().await?;

        let cache = VersionCache::new(&self.config.save_dir, self.config.server);
        let status = cache.check(&version)?;
        log_status(&status, &version);

        let resolved = self.resolver.resolve_version(&version).await?;
        Ok((version, status, resolved))
    }

    /// Files of the configured packages; `None` when no requested package exists
    pub fn select_files(
        &self,
        resolved: &ResolvedManifest,
    ) -> Option<(Vec<String>, BTreeMap<String, AssetRecord>)> {
        let manifest = &resolved.manifest;
        let Some(requested) = &self.config.packages else {
            let keys = manifest.packages.keys().cloned().collect();
            return Some((keys, manifest.all_files()));
        };

        let (known, unknown) = manifest.select(requested);
        for key in &unknown {
            warn!("Unknown package '{}' ignored", key);
        }
        if known.is_empty() {
            return None;
        }
        let files = manifest.files_of(known.iter().copied());
        Some((known.into_iter().map(str::to_string).collect(), files))
    }

    /// Run the whole pipeline once
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let (version, status, resolved) = self.resolve().await?;
        let store = Arc::new(ResumeStore::load(&self.config.save_dir)?);

        let Some((packages, files)) = self.select_files(&resolved) else {
            error!("None of the requested packages exist, nothing to download");
            return Ok(PipelineReport {
                version,
                status,
                packages: Vec::new(),
                declared_files: 0,
                up_to_date: 0,
                invalidated: 0,
                recorded: store.len(),
                batch: BatchReport::default(),
            });
        };

        let declared: u64 = files.values().map(|r| r.total_size).sum();
        info!(
            "Selected {} packages, {} files, {} declared",
            packages.len(),
            files.len(),
            format_size(declared)
        );

        let plan = store.plan(&files)?;
        info!(
            "{} files up to date, {} to download ({} changed)",
            plan.up_to_date,
            plan.scheduled.len(),
            plan.invalidated
        );

        let jobs: Vec<DownloadJob> = plan
            .scheduled
            .iter()
            .map(|(path, record)| DownloadJob::new(path, record))
            .collect();

        let scheduler = DownloadScheduler::new(
            self.client.clone(),
            self.config.endpoints(),
            &version.res_version,
            Arc::clone(&store),
            Arc::clone(&self.progress),
        )
        .with_retry(self.config.retry.clone())
        .with_unpack_all(self.config.unpack_all);

        let batch = scheduler.run(jobs, self.config.lanes()).await;

        let report = PipelineReport {
            version,
            status,
            packages,
            declared_files: files.len(),
            up_to_date: plan.up_to_date,
            invalidated: plan.invalidated,
            recorded: store.len(),
            batch,
        };
        report.log_summary();
        Ok(report)
    }
}
