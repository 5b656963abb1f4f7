//! Grouping strategies over lists of files.
//!
//! Every strategy works on a sorted, deduplicated copy of its input, so the
//! same file list always produces the same groups in the same order, and
//! every input file lands in exactly one group.
//!
//! ## Strategies
//!
//! - [`group_by_length`]: fixed number of files per group
//! - [`group_by_size`]: cumulative size bounded by a threshold
//! - [`group_by_deciphered_date`]: year or year-month read from the file name
//! - [`group_by_subdirectories`]: parent directory relative to a root
//!
//! ```
//! use climate_archiver::grouping::group_by_deciphered_date;
//! use climate_archiver::models::{FileEntry, GroupKey};
//!
//! let files = vec![FileEntry::new("2020-01-15.nc"), FileEntry::new("2020-02-01.nc")];
//! let dated = group_by_deciphered_date(&files);
//! assert!(dated.groups.contains_key(&GroupKey::Date("2020-01".to_string())));
//! assert!(dated.unmatched.is_empty());
//! ```

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use crate::models::{FileEntry, Group, GroupKey};
use crate::utils::size::format_size;

lazy_static! {
    /// Year, month and optional day at the start of a date stamp in a file name
    static ref YEAR_MONTH_DAY: Regex = Regex::new(
        r"(?P<year>[0-9]{4})-?(?P<month>[0-9]{2})-?(?P<day>[0-9]{2})?.*\.(?P<suffix>[A-Za-z0-9]+)$"
    )
    .expect("date pattern is valid");
}

/// Groups keyed by label, iterated in key order
pub type Grouping = BTreeMap<GroupKey, Group>;

/// Outcome of [`group_by_deciphered_date`].
#[derive(Debug, Clone, Default)]
pub struct DateGrouping {
    pub groups: Grouping,
    /// Files whose names carried no recognizable date. When non-empty, `groups`
    /// holds a single [`GroupKey::Ungrouped`] group with every input file.
    pub unmatched: Vec<PathBuf>,
}

impl DateGrouping {
    pub fn is_fallback(&self) -> bool {
        !self.unmatched.is_empty()
    }
}

fn sorted_copy(files: &[FileEntry]) -> Vec<FileEntry> {
    let mut files = files.to_vec();
    files.sort();
    files.dedup();
    files
}

/// Split files into consecutive chunks of `size` entries.
///
/// The last chunk holds the remainder and is never empty.
pub fn group_by_length(files: &[FileEntry], size: NonZeroUsize) -> Vec<Group> {
    let files = sorted_copy(files);
    info!("Creating groups of {} files", size);

    files.chunks(size.get()).map(|chunk| chunk.to_vec()).collect()
}

/// Accumulate files into groups whose cumulative size stays within `threshold`.
///
/// A group is closed before the file that would push it strictly past the
/// threshold, so a group may land exactly on it. A file larger than the
/// threshold by itself becomes a group of one.
pub fn group_by_size(files: &[FileEntry], threshold: u64) -> Result<Vec<Group>> {
    let files = sorted_copy(files);
    info!(
        "Creating groups of files based on size not exceeding {}",
        format_size(&threshold, true, 2).unwrap_or_default()
    );

    let mut groups = Vec::new();
    let mut group: Group = Vec::new();
    let mut total = 0u64;

    for file in files {
        let size = file
            .size()
            .context(format!("Failed to read size of {}", file.path().display()))?;

        if size > threshold {
            debug!("{} alone exceeds the size threshold", file.path().display());
            if !group.is_empty() {
                groups.push(std::mem::take(&mut group));
            }
            groups.push(vec![file]);
            total = 0;
            continue;
        }

        if total + size > threshold && !group.is_empty() {
            groups.push(std::mem::take(&mut group));
            total = 0;
        }

        total += size;
        group.push(file);
    }

    if !group.is_empty() {
        groups.push(group);
    }

    Ok(groups)
}

/// Date key deciphered from a file name, if any
pub fn decipher_date(file_name: &str) -> Option<String> {
    let captures = YEAR_MONTH_DAY.captures(file_name)?;
    let year = captures.name("year")?.as_str();
    let month = captures.name("month")?.as_str();

    if captures.name("day").is_some() {
        Some(format!("{}-{}", year, month))
    } else {
        Some(year.to_string())
    }
}

/// Group files by the date stamp in their names.
///
/// Names carrying a day are grouped by `YYYY-MM`, names with only a year and
/// month by `YYYY`. If any file has no recognizable date the grouping is
/// abandoned: a single ungrouped group holding every file is returned and the
/// offending paths are listed in [`DateGrouping::unmatched`].
pub fn group_by_deciphered_date(files: &[FileEntry]) -> DateGrouping {
    let files = sorted_copy(files);
    info!("Creating groups from deciphered dates");

    if files.is_empty() {
        return DateGrouping::default();
    }

    let mut groups = Grouping::new();
    let mut unmatched = Vec::new();

    for file in &files {
        match decipher_date(&file.file_name()) {
            Some(key) => groups.entry(GroupKey::Date(key)).or_default().push(file.clone()),
            None => unmatched.push(file.path().to_path_buf()),
        }
    }

    if unmatched.is_empty() {
        info!("All files have been grouped by date");
        return DateGrouping { groups, unmatched };
    }

    if groups.is_empty() {
        info!("No matches for dates found. Grouping aborted");
    } else {
        info!(
            "Not all files were successfully grouped by date ({} unmatched). Grouping aborted",
            unmatched.len()
        );
    }

    let mut fallback = Grouping::new();
    fallback.insert(GroupKey::Ungrouped, files);
    DateGrouping { groups: fallback, unmatched }
}

/// Group files by their parent directory relative to `within`.
///
/// Files directly under `within` share the root key, displayed as `.`. A file
/// outside `within` is an error.
pub fn group_by_subdirectories(files: &[FileEntry], within: &Path) -> Result<Grouping> {
    let files = sorted_copy(files);
    let mut groups = Grouping::new();

    for file in files {
        let relative = file.path().strip_prefix(within).context(format!(
            "{} is not located within {}",
            file.path().display(),
            within.display()
        ))?;
        let parent = relative.parent().map(Path::to_path_buf).unwrap_or_default();
        groups.entry(GroupKey::Subdirectory(parent)).or_default().push(file);
    }

    info!(
        "File subdirectories found. Proceeding with {:?}",
        groups.keys().map(|k| k.to_string()).collect::<Vec<_>>()
    );
    Ok(groups)
}
