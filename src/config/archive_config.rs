use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::env_vars::expand_path;
use crate::constants::{
    DEFAULT_CONFIG_NAME, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_FILE_PATTERN, DEFAULT_SIZE_LIMIT,
    SSH_DEFAULT_PORT,
};
use crate::orchestrator::ArchiveOptions;
use crate::transport::PollPolicy;
use crate::utils::discovery::SourceSpec;

/// Which kind of connection carries the transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// SSH connection that waits for every remote command
    #[default]
    Managed,
    /// SSH session that fires commands and polls for their effect
    Session,
    /// Target is a locally mounted filesystem
    Local,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Managed => write!(f, "managed"),
            TransportKind::Session => write!(f, "session"),
            TransportKind::Local => write!(f, "local"),
        }
    }
}

/// Remote host settings. Passwords are never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub private_key: Option<String>,
    pub transport: TransportKind,
    pub connection_timeout_sec: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: SSH_DEFAULT_PORT,
            username: None,
            private_key: None,
            transport: TransportKind::default(),
            connection_timeout_sec: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl RemoteConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_sec)
    }

    pub fn private_key_path(&self) -> Option<PathBuf> {
        self.private_key.as_deref().map(expand_path)
    }
}

/// Settings for an archival run, loaded from YAML and overridden from the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory searched for files
    pub source: Option<String>,
    /// Explicit files to archive instead of searching `source`
    pub files: Vec<String>,
    pub common_path: Option<String>,
    pub target: Option<String>,
    pub project_name: Option<String>,
    pub file_pattern: String,
    pub recursive: bool,
    pub overwrite: bool,
    pub compression: bool,
    pub use_grouping: bool,
    pub use_subdirectories: bool,
    /// Cumulative size limit of one archive in bytes
    pub size_limit: u64,
    pub remote: RemoteConfig,
    pub poll: PollPolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            source: None,
            files: Vec::new(),
            common_path: None,
            target: None,
            project_name: None,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            recursive: false,
            overwrite: false,
            compression: false,
            use_grouping: true,
            use_subdirectories: true,
            size_limit: DEFAULT_SIZE_LIMIT,
            remote: RemoteConfig::default(),
            poll: PollPolicy::default(),
        }
    }
}

impl ArchiveConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: ArchiveConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Where files come from, with `~` and environment variables expanded
    pub fn source_spec(&self) -> Result<SourceSpec> {
        if !self.files.is_empty() {
            return Ok(SourceSpec::Files(self.files.iter().map(|f| expand_path(f)).collect()));
        }

        match &self.source {
            Some(source) => Ok(SourceSpec::Directory(expand_path(source))),
            None => Err(anyhow!("No source directory or file list configured")),
        }
    }

    /// Resolve into the options of one run
    pub fn to_options(&self) -> Result<ArchiveOptions> {
        let target = self
            .target
            .as_deref()
            .map(expand_path)
            .ok_or_else(|| anyhow!("No target directory configured"))?;

        if self.size_limit == 0 {
            return Err(anyhow!("size_limit must be greater than zero"));
        }

        let mut options = ArchiveOptions::new(self.source_spec()?, target);
        options.common_path = self.common_path.as_deref().map(expand_path);
        options.project_name = self.project_name.clone();
        options.file_pattern = self.file_pattern.clone();
        options.overwrite = self.overwrite;
        options.compression = self.compression;
        options.recursive = self.recursive;
        options.use_grouping = self.use_grouping;
        options.use_subdirectories = self.use_subdirectories;
        options.size_limit = self.size_limit;
        options.poll = self.poll.clone();
        Ok(options)
    }
}

/// Load the configuration to use for a run.
///
/// 1. The given path, if provided and present
/// 2. `archiver.yaml` in the working directory, if no path was given
/// 3. Built-in defaults otherwise
pub fn load_or_default(config_path: Option<&Path>) -> Result<ArchiveConfig> {
    match config_path {
        Some(path) if path.exists() => ArchiveConfig::from_yaml_file(path),
        Some(path) => Err(anyhow!("Config file not found: {}", path.display())),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_NAME);
            if default_path.exists() {
                info!("Using configuration from {}", default_path.display());
                ArchiveConfig::from_yaml_file(default_path)
            } else {
                debug!("No config file found, using defaults");
                Ok(ArchiveConfig::default())
            }
        }
    }
}
