use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glob::Pattern;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::FileEntry;

/// Where the files of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A directory searched with the configured file pattern
    Directory(PathBuf),
    /// An explicit list of files
    Files(Vec<PathBuf>),
}

/// Compile a shell-style file name pattern (`*`, `?`, `[0-9]`, `[!a]`)
pub fn compile_pattern(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).context(format!("Invalid file pattern: {}", pattern))
}

/// Resolve a source into a sorted file list and the directory archive entries
/// are named relative to.
///
/// A directory source is walked one level deep, or fully when `recursive` is
/// set, keeping regular files whose names match `pattern`. An explicit list is
/// kept as given and its base is the deepest directory shared by all files.
pub fn find_files(
    source: &SourceSpec,
    pattern: &str,
    recursive: bool,
) -> Result<(Vec<FileEntry>, PathBuf)> {
    match source {
        SourceSpec::Directory(dir) => {
            if !dir.is_dir() {
                return Err(anyhow!("Source directory does not exist: {}", dir.display()));
            }

            let matcher = compile_pattern(pattern)?;
            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut files = Vec::new();

            // Symlinked data files count as files
            let walker = WalkDir::new(dir)
                .follow_links(true)
                .min_depth(1)
                .max_depth(max_depth)
                .sort_by_file_name();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                if matcher.matches(&entry.file_name().to_string_lossy()) {
                    debug!("Found {}", entry.path().display());
                    files.push(FileEntry::new(entry.into_path()));
                }
            }

            files.sort();
            info!("Found {} files matching {} in {}", files.len(), pattern, dir.display());
            Ok((files, dir.clone()))
        }
        SourceSpec::Files(list) => {
            let mut files: Vec<FileEntry> = list.iter().cloned().map(FileEntry::new).collect();
            files.sort();
            files.dedup();
            let base = common_ancestor(list.iter().filter_map(|p| p.parent()));
            info!("Using {} supplied files under {}", files.len(), base.display());
            Ok((files, base))
        }
    }
}

/// Deepest directory containing every given directory.
///
/// Relative directories with nothing in common share the empty path, which
/// every relative path starts with.
pub fn common_ancestor<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut common: Option<Vec<Component<'a>>> = None;

    for dir in dirs {
        let components: Vec<Component<'a>> = dir.components().collect();
        common = Some(match common {
            None => components,
            Some(prefix) => prefix
                .into_iter()
                .zip(components)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    match common {
        Some(components) => components.iter().collect(),
        None => PathBuf::new(),
    }
}
