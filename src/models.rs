use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ROOT_GROUP_LABEL, UNGROUPED_LABEL};
use crate::utils::size::format_size;

/// A local file taking part in an archival run.
///
/// The size is read from the filesystem the first time it is asked for and
/// cached afterwards. Entries compare and sort by path only.
#[derive(Debug, Clone)]
pub struct FileEntry {
    path: PathBuf,
    size: OnceCell<u64>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: OnceCell::new(),
        }
    }

    /// Create an entry whose size is already known.
    pub fn with_size(path: impl Into<PathBuf>, size: u64) -> Self {
        let entry = Self::new(path);
        let _ = entry.size.set(size);
        entry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, or an empty string for paths without one
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn size(&self) -> io::Result<u64> {
        if let Some(size) = self.size.get() {
            return Ok(*size);
        }
        let size = fs::metadata(&self.path)?.len();
        let _ = self.size.set(size);
        Ok(size)
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl From<PathBuf> for FileEntry {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for FileEntry {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileEntry {}

impl PartialOrd for FileEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// An ordered sequence of files produced by one grouping strategy
pub type Group = Vec<FileEntry>;

/// Label attached to a group of files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// Parent directory relative to the source root; empty for the root itself
    Subdirectory(PathBuf),
    /// `YYYY` or `YYYY-MM`
    Date(String),
    /// Flat listing, used when no grouping applied
    Ungrouped,
}

impl GroupKey {
    /// Label safe to embed in a file name: path separators become dashes.
    pub fn file_label(&self) -> String {
        self.to_string().replace(['/', '\\'], "-")
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Subdirectory(path) if path.as_os_str().is_empty() => {
                write!(f, "{}", ROOT_GROUP_LABEL)
            }
            GroupKey::Subdirectory(path) => write!(f, "{}", path.display()),
            GroupKey::Date(date) => write!(f, "{}", date),
            GroupKey::Ungrouped => write!(f, "{}", UNGROUPED_LABEL),
        }
    }
}

/// Result of one planned transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    Transferred,
    Skipped,
    Failed,
}

/// Totals for one archival run, logged at the end and optionally saved as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub discovered_files: usize,
    pub discovered_bytes: u64,
    pub transferred: Vec<PathBuf>,
    pub transferred_bytes: u64,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// Files whose names did not reveal a date, causing their partition to stay ungrouped
    pub undated: Vec<PathBuf>,
}

impl RunSummary {
    pub fn new(discovered: &[FileEntry]) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            discovered_files: discovered.len(),
            discovered_bytes: discovered.iter().filter_map(|f| f.size().ok()).sum(),
            transferred: Vec::new(),
            transferred_bytes: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
            undated: Vec::new(),
        }
    }

    /// Record the outcome of a transfer covering `files`
    pub fn record(&mut self, outcome: TransferOutcome, files: &[FileEntry]) {
        let paths = files.iter().map(|f| f.path().to_path_buf());
        match outcome {
            TransferOutcome::Transferred => {
                self.transferred_bytes += files.iter().filter_map(|f| f.size().ok()).sum::<u64>();
                self.transferred.extend(paths);
            }
            TransferOutcome::Skipped => self.skipped.extend(paths),
            TransferOutcome::Failed => self.failed.extend(paths),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now().to_rfc3339());
        info!(
            "Transferred {} of {} files totalling {}.",
            self.transferred.len(),
            self.discovered_files,
            self.transferred_size()
        );
    }

    /// Human readable size of everything transferred so far
    pub fn transferred_size(&self) -> String {
        format_size(&self.transferred_bytes, true, 2).unwrap_or_default()
    }

    pub fn discovered_size(&self) -> String {
        format_size(&self.discovered_bytes, true, 2).unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run summary to JSON")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .context(format!("Failed to write run summary to {}", path.display()))?;
        info!("Wrote run summary to {}", path.display());
        Ok(())
    }
}
