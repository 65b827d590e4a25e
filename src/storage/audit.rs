//! Append-only audit log of registry operations.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

/// Append-only timestamped sink for human-readable operation records.
///
/// Every write opens the file, appends one `YYYY-MM-DD HH:MM:SS | message`
/// line and closes it again, so no handle outlives the call. The trail is
/// best-effort: a file that cannot be opened or written drops the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Create a sink appending to the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file the sink appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn record(&self, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{timestamp} | {message}"));
        if let Err(e) = result {
            tracing::debug!("failed to append to audit log {}: {e}", self.path.display());
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new("actions.log")
    }
}
