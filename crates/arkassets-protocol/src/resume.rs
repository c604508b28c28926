//! Persisted resume state
//!
//! `persistent_res_list.json` maps each downloaded relative path to the checksum
//! it had when it was written. A file whose manifest checksum matches is skipped;
//! a stale one has its previous output removed and is downloaded again.

use arkassets_formats::extract::unpack_dir;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ResumeError;
use crate::manifest::AssetRecord;

/// File name of the resume state inside the save directory
pub const RESUME_FILE: &str = "persistent_res_list.json";

/// Relative path to checksum
pub type ResumeState = BTreeMap<String, String>;

/// Outcome of comparing a file set against the resume state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// Files to download, in path order
    pub scheduled: Vec<(String, AssetRecord)>,
    /// Files whose stored checksum matched
    pub up_to_date: usize,
    /// Scheduled files that replace a stale earlier download
    pub invalidated: usize,
}

/// Resume state store rooted at a save directory
#[derive(Debug)]
pub struct ResumeStore {
    root: PathBuf,
    path: PathBuf,
    state: Mutex<ResumeState>,
}

fn io_error(path: &Path, source: std::io::Error) -> ResumeError {
    ResumeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ResumeStore {
    /// Load the state under `root`, creating an empty one when absent or unreadable
    pub fn load(root: &Path) -> Result<Self, ResumeError> {
        fs::create_dir_all(root).map_err(|e| io_error(root, e))?;
        let path = root.join(RESUME_FILE);

        let (state, rewrite) = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ResumeState>(&content) {
                Ok(state) => (state, false),
                Err(e) => {
                    warn!("Resume state {} is corrupt ({}), starting empty", path.display(), e);
                    (ResumeState::new(), true)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => (ResumeState::new(), true),
            Err(e) => {
                warn!("Cannot read resume state {}: {}, starting empty", path.display(), e);
                (ResumeState::new(), true)
            }
        };

        let store = Self {
            root: root.to_path_buf(),
            path,
            state: Mutex::new(state),
        };
        if rewrite {
            store.persist(&store.state.lock())?;
        }
        debug!("Loaded {} resume entries", store.len());
        Ok(store)
    }

    /// Save directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of recorded files
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// True when nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Stored checksum for `relative_path`
    pub fn checksum(&self, relative_path: &str) -> Option<String> {
        self.state.lock().get(relative_path).cloned()
    }

    /// Copy of the whole state
    pub fn snapshot(&self) -> ResumeState {
        self.state.lock().clone()
    }

    /// Record a successfully written file and persist the state
    pub fn record_success(&self, relative_path: &str, checksum: &str) -> Result<(), ResumeError> {
        let mut state = self.state.lock();
        state.insert(relative_path.to_string(), checksum.to_string());
        self.persist(&state)
    }

    /// Delete a file's previous download and its unpack directory
    pub fn invalidate(&self, relative_path: &str) -> Result<(), ResumeError> {
        let file = self.root.join(relative_path);
        match fs::remove_file(&file) {
            Ok(()) => debug!("Removed stale {}", file.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&file, e)),
        }

        let unpacked = unpack_dir(&file);
        match fs::remove_dir_all(&unpacked) {
            Ok(()) => debug!("Removed stale {}", unpacked.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&unpacked, e)),
        }
        Ok(())
    }

    /// Decide which of `files` need downloading, invalidating stale ones
    pub fn plan(&self, files: &BTreeMap<String, AssetRecord>) -> Result<ResumePlan, ResumeError> {
        let state = self.snapshot();
        let mut plan = ResumePlan::default();

        for (path, record) in files {
            match state.get(path) {
                Some(stored) if *stored == record.checksum => plan.up_to_date += 1,
                Some(_) => {
                    info!("[{}] will be updated", path);
                    self.invalidate(path)?;
                    plan.invalidated += 1;
                    plan.scheduled.push((path.clone(), record.clone()));
                }
                None => plan.scheduled.push((path.clone(), record.clone())),
            }
        }
        Ok(plan)
    }

    fn persist(&self, state: &ResumeState) -> Result<(), ResumeError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))
    }
}
