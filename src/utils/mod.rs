//! Utility functions shared by the archiver.
//!
//! ## Components
//!
//! - **Size**: human readable byte counts for files and lists of files
//! - **Discovery**: resolving a source directory or file list into entries
//!
//! ```no_run
//! use climate_archiver::utils::discovery::{find_files, SourceSpec};
//! use climate_archiver::utils::size::format_size;
//!
//! # fn example() -> anyhow::Result<()> {
//! let source = SourceSpec::Directory("/data/era5".into());
//! let (files, _base) = find_files(&source, "*.nc", true)?;
//! let paths: Vec<_> = files.iter().map(|f| f.path().to_path_buf()).collect();
//! println!("{}", format_size(&paths, true, 2).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

/// Human readable size formatting
pub mod size;

/// Source file discovery
pub mod discovery;
