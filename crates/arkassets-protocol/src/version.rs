//! Version descriptor and the on-disk version cache
//!
//! The cache only feeds log output ("resources updated from X to Y"). Whether a
//! file is downloaded is decided by the resume state alone.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ResumeError;
use crate::server::Server;

/// Version descriptor served by the version endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Resource (asset set) version
    pub res_version: String,
    /// Client application version
    pub client_version: String,
}

/// Cached version record, as stored in `version_cache_{server}.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVersion {
    /// Resource version seen at the last check
    pub res_version: String,
    /// Client version seen at the last check
    pub client_version: String,
    /// RFC 3339 timestamp of the check that wrote this record
    pub last_checked: String,
}

/// Outcome of comparing a fetched version with the cached one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No usable cache existed
    FirstCheck,
    NoUpdate,
    ResourceUpdate {
        old_version: String,
        new_version: String,
    },
    ClientUpdate {
        old_version: String,
        new_version: String,
    },
    BothUpdated {
        old_res_version: String,
        new_res_version: String,
        old_client_version: String,
        new_client_version: String,
    },
}

impl UpdateStatus {
    /// True for any variant that reports a change
    pub fn has_changes(&self) -> bool {
        !matches!(self, Self::NoUpdate | Self::FirstCheck)
    }
}

/// Version cache for one server inside a save directory
#[derive(Debug, Clone)]
pub struct VersionCache {
    path: PathBuf,
}

impl VersionCache {
    /// Cache file for `server` under `save_dir`
    pub fn new(save_dir: &Path, server: Server) -> Self {
        Self {
            path: save_dir.join(format!("version_cache_{}.json", server.cache_name())),
        }
    }

    /// Location of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached record; a missing or corrupt file yields `None`
    pub fn load(&self) -> Option<CachedVersion> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!("Ignoring corrupt version cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write `version` with the current time
    pub fn store(&self, version: &VersionInfo) -> Result<(), ResumeError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ResumeError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let record = CachedVersion {
            res_version: version.res_version.clone(),
            client_version: version.client_version.clone(),
            last_checked: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&self.path, json).map_err(|source| ResumeError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Compare `current` with the cache, rewriting the cache when it changed
    pub fn check(&self, current: &VersionInfo) -> Result<UpdateStatus, ResumeError> {
        let Some(cached) = self.load() else {
            self.store(current)?;
            return Ok(UpdateStatus::FirstCheck);
        };

        let res_changed = cached.res_version != current.res_version;
        let client_changed = cached.client_version != current.client_version;

        let status = match (res_changed, client_changed) {
            (false, false) => UpdateStatus::NoUpdate,
            (true, false) => UpdateStatus::ResourceUpdate {
                old_version: cached.res_version,
                new_version: current.res_version.clone(),
            },
            (false, true) => UpdateStatus::ClientUpdate {
                old_version: cached.client_version,
                new_version: current.client_version.clone(),
            },
            (true, true) => UpdateStatus::BothUpdated {
                old_res_version: cached.res_version,
                new_res_version: current.res_version.clone(),
                old_client_version: cached.client_version,
                new_client_version: current.client_version.clone(),
            },
        };

        if status.has_changes() {
            self.store(current)?;
        } else {
            debug!("Version cache {} is current", self.path.display());
        }
        Ok(status)
    }
}
