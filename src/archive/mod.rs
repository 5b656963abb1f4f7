//! Tar archive construction and per-file or per-archive transfers.
//!
//! Archives are staged in a named temporary file that is removed as soon as
//! the transfer finishes, whatever its outcome. Failing to add one entry does
//! not abort the archive; the entry is logged and left out.
//!
//! ```no_run
//! use climate_archiver::archive::transfer_archive;
//! use climate_archiver::models::FileEntry;
//! use climate_archiver::transport::local::LocalTransport;
//! use std::path::Path;
//!
//! let files = vec![FileEntry::new("/data/era5/x/2020-01-01.nc")];
//! let mut transport = LocalTransport::new();
//! let ok = transfer_archive(
//!     &files,
//!     Path::new("/data/era5"),
//!     Path::new("/mnt/backup/era5/x/era5_x_2020-01.tar.gz"),
//!     &mut transport,
//!     true,
//!     false,
//! );
//! assert!(ok);
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use tar::Builder;
use tempfile::NamedTempFile;

use crate::constants::{TAR_GZ_SUFFIX, TAR_SUFFIX};
use crate::models::FileEntry;
use crate::transport::Transport;

/// What ended up inside an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    /// Sources written to the archive, in order
    pub added: Vec<PathBuf>,
    /// Sources that could not be added
    pub skipped: Vec<PathBuf>,
}

/// File suffix for an archive with or without gzip compression
pub fn archive_suffix(compression: bool) -> &'static str {
    if compression {
        TAR_GZ_SUFFIX
    } else {
        TAR_SUFFIX
    }
}

/// Write a tar archive of `sources` into `writer`, gzip-compressed if asked.
///
/// Entries are named relative to `base`. Directories are expanded when
/// `recursive` is set, otherwise only the directory entry itself is stored.
pub fn build_archive<W: Write>(
    sources: &[FileEntry],
    base: &Path,
    compression: bool,
    recursive: bool,
    writer: W,
) -> Result<ArchiveManifest> {
    if compression {
        let mut builder = Builder::new(GzEncoder::new(writer, Compression::default()));
        let manifest = append_sources(&mut builder, sources, base, recursive);
        builder
            .into_inner()
            .context("Failed to finalize tar archive")?
            .finish()
            .context("Failed to finalize gzip stream")?;
        Ok(manifest)
    } else {
        let mut builder = Builder::new(writer);
        let manifest = append_sources(&mut builder, sources, base, recursive);
        builder.into_inner().context("Failed to finalize tar archive")?;
        Ok(manifest)
    }
}

fn append_sources<W: Write>(
    builder: &mut Builder<W>,
    sources: &[FileEntry],
    base: &Path,
    recursive: bool,
) -> ArchiveManifest {
    let mut manifest = ArchiveManifest::default();

    for source in sources {
        let path = source.path();
        info!("Tarring {}", source.file_name());

        match append_source(builder, path, base, recursive) {
            Ok(()) => manifest.added.push(path.to_path_buf()),
            Err(e) => {
                warn!("File \"{}\" failed to be tarred: {:#}", path.display(), e);
                manifest.skipped.push(path.to_path_buf());
            }
        }
    }

    manifest
}

fn append_source<W: Write>(
    builder: &mut Builder<W>,
    path: &Path,
    base: &Path,
    recursive: bool,
) -> Result<()> {
    let name = path
        .strip_prefix(base)
        .context(format!("Not located within {}", base.display()))?;

    if path.is_dir() {
        if recursive {
            builder.append_dir_all(name, path)?;
        } else {
            builder.append_dir(name, path)?;
        }
    } else {
        builder.append_path_with_name(path, name)?;
    }
    Ok(())
}

/// Upload one file to `destination`.
///
/// Failures are logged as warnings and reported as `false`.
pub fn transfer_single(source: &Path, destination: &Path, transport: &mut dyn Transport) -> bool {
    info!("Passing {}", source.display());

    match transport.put(source, destination) {
        Ok(()) => {
            info!("Transferred {} to {}", file_label(destination), parent_label(destination));
            true
        }
        Err(e) => {
            warn!("File \"{}\" failed to be added: {:#}", file_label(destination), e);
            false
        }
    }
}

/// Bundle `sources` into a temporary tar archive and upload it to `destination`.
///
/// Returns `false` if the archive could not be built or uploaded, or if none
/// of `sources` could be added to it.
pub fn transfer_archive(
    sources: &[FileEntry],
    base: &Path,
    destination: &Path,
    transport: &mut dyn Transport,
    compression: bool,
    recursive: bool,
) -> bool {
    transfer_archive_with_manifest(sources, base, destination, transport, compression, recursive)
        .is_some()
}

/// Like [`transfer_archive`], returning what went into the uploaded archive.
pub fn transfer_archive_with_manifest(
    sources: &[FileEntry],
    base: &Path,
    destination: &Path,
    transport: &mut dyn Transport,
    compression: bool,
    recursive: bool,
) -> Option<ArchiveManifest> {
    let mut staging = match NamedTempFile::new() {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to create staging file for {}: {}", file_label(destination), e);
            return None;
        }
    };

    let built = build_archive(sources, base, compression, recursive, staging.as_file_mut());
    let manifest = match built {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("Archive \"{}\" could not be built: {:#}", file_label(destination), e);
            return None;
        }
    };
    if manifest.added.is_empty() {
        warn!(
            "Archive \"{}\" has no members after {} failed. Not transferring.",
            file_label(destination),
            manifest.skipped.len()
        );
        return None;
    }
    debug!(
        "Staged {} ({} added, {} skipped) at {}",
        file_label(destination),
        manifest.added.len(),
        manifest.skipped.len(),
        staging.path().display()
    );

    info!(
        "Beginning transfer of {} to {}",
        file_label(destination),
        parent_label(destination)
    );
    match transport.put(staging.path(), destination) {
        Ok(()) => {
            info!("Transferred {} to {}", file_label(destination), parent_label(destination));
            Some(manifest)
        }
        Err(e) => {
            warn!("File \"{}\" failed to be added: {:#}", file_label(destination), e);
            None
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parent_label(path: &Path) -> String {
    path.parent().map(|p| p.display().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(bytes);
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_archive_suffix() {
        assert_eq!(archive_suffix(false), "tar");
        assert_eq!(archive_suffix(true), "tar.gz");
    }

    #[test]
    fn test_build_plain_archive_relative_names() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("x")).unwrap();
        fs::write(temp_dir.path().join("x/a.nc"), b"alpha").unwrap();
        fs::write(temp_dir.path().join("b.nc"), b"beta").unwrap();

        let sources = vec![
            FileEntry::new(temp_dir.path().join("b.nc")),
            FileEntry::new(temp_dir.path().join("x/a.nc")),
        ];
        let mut buffer = Vec::new();
        let manifest = build_archive(&sources, temp_dir.path(), false, false, &mut buffer).unwrap();

        assert_eq!(manifest.added.len(), 2);
        assert_eq!(entry_names(&buffer), vec!["b.nc", "x/a.nc"]);
    }

    #[test]
    fn test_build_gzip_archive_decompresses() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.nc"), b"alpha").unwrap();

        let sources = vec![FileEntry::new(temp_dir.path().join("a.nc"))];
        let mut buffer = Vec::new();
        build_archive(&sources, temp_dir.path(), true, false, &mut buffer).unwrap();

        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(buffer.as_slice()).read_to_end(&mut decoded).unwrap();
        assert_eq!(entry_names(&decoded), vec!["a.nc"]);
    }

    #[test]
    fn test_missing_source_is_skipped_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.nc"), b"alpha").unwrap();

        let sources = vec![
            FileEntry::new(temp_dir.path().join("a.nc")),
            FileEntry::new(temp_dir.path().join("gone.nc")),
            FileEntry::new("/outside/base.nc"),
        ];
        let mut buffer = Vec::new();
        let manifest = build_archive(&sources, temp_dir.path(), false, false, &mut buffer).unwrap();

        assert_eq!(manifest.added, vec![temp_dir.path().join("a.nc")]);
        assert_eq!(manifest.skipped.len(), 2);
        assert_eq!(entry_names(&buffer), vec!["a.nc"]);
    }

    #[test]
    fn test_directory_entries_respect_recursive_flag() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("x")).unwrap();
        fs::write(temp_dir.path().join("x/a.nc"), b"alpha").unwrap();
        let sources = vec![FileEntry::new(temp_dir.path().join("x"))];

        let mut flat = Vec::new();
        build_archive(&sources, temp_dir.path(), false, false, &mut flat).unwrap();
        assert_eq!(entry_names(&flat).len(), 1);

        let mut expanded = Vec::new();
        build_archive(&sources, temp_dir.path(), false, true, &mut expanded).unwrap();
        assert!(entry_names(&expanded).iter().any(|n| n == "x/a.nc"));
    }
}
