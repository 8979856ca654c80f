//! JSON persistence for the day store
//!
//! The whole store is read on every load and rewritten on every save. An
//! unreadable file is moved aside to `<name>.backup.<unix-timestamp>` and an
//! empty store is returned in its place.

use crate::{error_log::ErrorLog, Store};
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct JsonStore {
    path: PathBuf,
    error_log: ErrorLog,
}

impl JsonStore {
    /// Store backed by `path`. Nothing is touched until the first load/save.
    pub fn open<P: AsRef<Path>>(path: P, error_log: ErrorLog) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            error_log,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full store.
    ///
    /// A missing file is an empty store. Content that does not parse as a
    /// mapping of dates is moved to a backup file, logged, and also yields an
    /// empty store. Only a failure to read the file is returned as an error.
    pub fn load(&self) -> Result<Store> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No store at {:?}, starting empty", self.path);
                return Ok(Store::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Store>(&bytes) {
            Ok(store) => {
                debug!("Loaded {} days from {:?}", store.len(), self.path);
                Ok(store)
            }
            Err(e) => {
                self.quarantine(&e);
                Ok(Store::new())
            }
        }
    }

    /// Overwrite the backing file with the full store, indented for manual
    /// recovery
    pub fn save(&self, store: &Store) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(store)?;
        fs::write(&self.path, json)?;

        debug!("Saved {} days to {:?}", store.len(), self.path);
        Ok(())
    }

    /// Backup file name for a corrupt store moved aside at `timestamp`
    pub fn backup_path(&self, timestamp: i64) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".backup.{}", timestamp));
        self.path.with_file_name(name)
    }

    fn quarantine(&self, parse_error: &serde_json::Error) {
        let backup = self.backup_path(Utc::now().timestamp());
        match fs::rename(&self.path, &backup) {
            Ok(()) => info!("Moved unreadable store {:?} to {:?}", self.path, backup),
            Err(e) => warn!("Failed to back up unreadable store {:?}: {}", self.path, e),
        }
        self.error_log
            .record(&format!("Store {:?} is corrupt", self.path), parse_error);
    }
}
