use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ArchiveConfig, TransportKind};

/// Command-line arguments for the climate-archiver tool.
///
/// Every run option can also come from a YAML configuration file; flags given
/// here take precedence over the file.
#[derive(Parser, Debug)]
#[clap(
    name = "climate-archiver",
    about = "Group climate data files and archive them to a backup server"
)]
pub struct Args {
    /// Source directory to search for files
    #[clap(short, long)]
    pub source: Option<String>,

    /// Remote directory receiving the backup
    #[clap(short, long)]
    pub target: Option<String>,

    /// Root used to derive subdirectory groups (default: the source directory)
    #[clap(long)]
    pub common_path: Option<String>,

    /// Prefix for archive names (default: name of the target directory)
    #[clap(short, long)]
    pub project: Option<String>,

    /// Shell-style pattern of file names to archive
    #[clap(long)]
    pub pattern: Option<String>,

    /// Remote server hostname
    #[clap(long)]
    pub server: Option<String>,

    /// Remote server port
    #[clap(long)]
    pub port: Option<u16>,

    /// Username on the remote server
    #[clap(short, long)]
    pub user: Option<String>,

    /// Private key for authentication (password is prompted for otherwise)
    #[clap(long)]
    pub key: Option<String>,

    /// Kind of connection used for the transfer
    #[clap(long)]
    pub transport: Option<TransportKind>,

    /// Replace files and archives that already exist on the remote
    #[clap(long)]
    pub overwrite: bool,

    /// Compress archives with gzip
    #[clap(long)]
    pub compress: bool,

    /// Search the source directory recursively
    #[clap(short, long)]
    pub recursive: bool,

    /// Send every file individually instead of grouping by date
    #[clap(long)]
    pub no_grouping: bool,

    /// Do not mirror source subdirectories on the remote
    #[clap(long)]
    pub no_subdirectories: bool,

    /// Maximum cumulative size of one archive, in bytes
    #[clap(long)]
    pub size_limit: Option<u64>,

    /// Print the planned transfers without connecting
    #[clap(long)]
    pub dry_run: bool,

    /// Write a JSON summary of the run to this path
    #[clap(long)]
    pub summary: Option<PathBuf>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Also write the log to a dated file in this directory
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    /// Override configuration values with the flags given on the command line
    pub fn apply_to(&self, config: &mut ArchiveConfig) {
        if let Some(source) = &self.source {
            config.source = Some(source.clone());
            config.files.clear();
        }
        if let Some(target) = &self.target {
            config.target = Some(target.clone());
        }
        if let Some(common_path) = &self.common_path {
            config.common_path = Some(common_path.clone());
        }
        if let Some(project) = &self.project {
            config.project_name = Some(project.clone());
        }
        if let Some(pattern) = &self.pattern {
            config.file_pattern = pattern.clone();
        }
        if let Some(server) = &self.server {
            config.remote.host = Some(server.clone());
        }
        if let Some(port) = self.port {
            config.remote.port = port;
        }
        if let Some(user) = &self.user {
            config.remote.username = Some(user.clone());
        }
        if let Some(key) = &self.key {
            config.remote.private_key = Some(key.clone());
        }
        if let Some(transport) = self.transport {
            config.remote.transport = transport;
        }
        if let Some(size_limit) = self.size_limit {
            config.size_limit = size_limit;
        }

        config.overwrite |= self.overwrite;
        config.compression |= self.compress;
        config.recursive |= self.recursive;
        if self.no_grouping {
            config.use_grouping = false;
        }
        if self.no_subdirectories {
            config.use_subdirectories = false;
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "archiver.yaml")]
        path: PathBuf,
    },

    /// Print the size of files in human readable form
    Size {
        /// Files to measure
        #[clap(required = true)]
        paths: Vec<PathBuf>,

        /// Use SI units (kB, MB) instead of binary units (KiB, MiB)
        #[clap(long)]
        si: bool,

        /// Decimal digits to print
        #[clap(long, default_value = "2")]
        precision: usize,
    },
}
