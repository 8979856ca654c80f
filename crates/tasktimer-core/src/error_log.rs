//! Append-only failure log kept next to the data file

use chrono::{Local, NaiveDateTime};
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a failure. Never fails; if the log itself cannot be written the
    /// problem is only reported through tracing.
    pub fn record(&self, context: &str, err: &dyn Error) {
        error!("{}: {}", context, err);

        let entry = Self::format_entry(Local::now().naive_local(), context, err);
        if let Err(e) = self.append(&entry) {
            warn!("Failed to write error log {:?}: {}", self.path, e);
        }
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }

    /// One log entry: timestamp line, the error and its cause chain, then a
    /// blank separator line
    pub fn format_entry(timestamp: NaiveDateTime, context: &str, err: &dyn Error) -> String {
        let mut entry = format!(
            "{} - ERROR:\n{}: {}\n",
            timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
            context,
            err
        );
        let mut source = err.source();
        while let Some(cause) = source {
            entry.push_str(&format!("  caused by: {}\n", cause));
            source = cause.source();
        }
        entry.push('\n');
        entry
    }
}
