//! # climate-archiver
//!
//! Backs up trees of climate data files (netCDF by default) to a remote
//! server, bundling them into tar archives grouped the way the data is
//! organized.
//!
//! ## Overview
//!
//! A run discovers source files, partitions them by subdirectory, then by the
//! date stamp found in their names, then by cumulative size. Date groups with
//! a single file are pushed as they are; larger ones become one or more tar
//! (optionally gzip) archives. Files and archives already present on the
//! remote are skipped unless overwriting is requested.
//!
//! ## Usage
//!
//! ```no_run
//! use climate_archiver::orchestrator::{self, ArchiveOptions};
//! use climate_archiver::transport::ssh::{SshAuth, SshConfig, SshConnection};
//! use climate_archiver::utils::discovery::SourceSpec;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut options = ArchiveOptions::new(
//!     SourceSpec::Directory("/data/era5".into()),
//!     "/backup/era5",
//! );
//! options.recursive = true;
//! options.compression = true;
//!
//! let ssh = SshConfig::new(
//!     "backup.example.org",
//!     "archivist",
//!     SshAuth::PrivateKey { path: "/home/archivist/.ssh/id_ed25519".into(), passphrase: None },
//! );
//! let summary = orchestrator::run(&options, || SshConnection::connect(&ssh))?;
//! println!("Transferred {} files", summary.transferred.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: YAML configuration and path expansion
//! - [`models`]: File entries, group keys and run summaries
//! - [`grouping`]: Grouping strategies (length, size, date, subdirectory)
//! - [`archive`]: Tar archive construction and transfers
//! - [`transport`]: Remote transport abstraction and its SSH/local backends
//! - [`orchestrator`]: Planning and running an archival pass
//! - [`utils`]: Size formatting and file discovery
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Configuration management
pub mod config;

/// Core data models used throughout the application
pub mod models;

/// File grouping strategies
pub mod grouping;

/// Tar archive construction and transfer
pub mod archive;

/// Remote transports
pub mod transport;

/// Run planning and execution
pub mod orchestrator;

/// Utility functions for sizes and file discovery
pub mod utils;

/// Application constants and configuration values
pub mod constants;
