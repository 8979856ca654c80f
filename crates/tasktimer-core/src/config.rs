//! File locations and persistence policy

use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_FILE: &str = "tasks_data.json";
pub const DEFAULT_ERROR_LOG: &str = "error.log";
pub const DEFAULT_EXPORT_FILE: &str = "tasks_aggregated.csv";

/// How routine autosaves (session stop, description edits) react to write
/// failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Record the failure in the error log and carry on
    #[default]
    Lenient,
    /// Record the failure and return it to the caller
    Strict,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub data_file: String,
    pub error_log: String,
    pub export_file: String,
    pub save_policy: SavePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::in_dir(crate::data_dir())
    }
}

impl Config {
    /// Default file names rooted at `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            data_dir: dir.as_ref().to_path_buf(),
            data_file: DEFAULT_DATA_FILE.to_string(),
            error_log: DEFAULT_ERROR_LOG.to_string(),
            export_file: DEFAULT_EXPORT_FILE.to_string(),
            save_policy: SavePolicy::default(),
        }
    }

    pub fn with_save_policy(mut self, policy: SavePolicy) -> Self {
        self.save_policy = policy;
        self
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.error_log)
    }

    pub fn export_path(&self) -> PathBuf {
        self.data_dir.join(&self.export_file)
    }
}
