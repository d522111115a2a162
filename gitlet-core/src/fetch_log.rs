//! Fetch log
//!
//! Records every completed fetch under `.gitlet/logs/fetch/` as one JSON file
//! per entry, numbered in the order the fetches happened.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Fetch log entry: one completed fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchLogEntry {
    /// Configured remote name
    pub remote: String,
    /// Identifier the remote reported (its location)
    pub identifier: String,
    /// When the fetch completed (Unix milliseconds)
    pub timestamp_ms: i64,
    /// Number of objects written to the local store
    pub objects_transferred: u64,
    /// Remote-tracking refs that were created or moved
    pub changed_refs: Vec<String>,
    /// Duration of the fetch in milliseconds
    pub duration_ms: u64,
}

/// Manages the fetch log for a repository
pub struct FetchLog {
    log_dir: PathBuf,
}

impl FetchLog {
    /// Create a FetchLog for the given `.gitlet` directory
    pub fn new(git_dir: &Path) -> Self {
        Self {
            log_dir: git_dir.join("logs").join("fetch"),
        }
    }

    /// Append an entry after all existing ones
    pub fn append(&self, entry: &FetchLogEntry) -> Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let seq = self.entry_files()?.len() + 1;
        let path = self.log_dir.join(format!("{:08}.json", seq));
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(entry)?)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// All entries, oldest first
    pub fn all(&self) -> Result<Vec<FetchLogEntry>> {
        let mut entries = Vec::new();
        for path in self.entry_files()? {
            let data = fs::read_to_string(&path)?;
            match serde_json::from_str::<FetchLogEntry>(&data) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable fetch log entry"),
            }
        }
        Ok(entries)
    }

    /// Entries recorded for one remote, oldest first
    pub fn for_remote(&self, remote: &str) -> Result<Vec<FetchLogEntry>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|e| e.remote == remote)
            .collect())
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let dir = match fs::read_dir(&self.log_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in dir {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
