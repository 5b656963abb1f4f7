//! Global constants for the climate-archiver application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Size units
/// One kibibyte
pub const KIB: u64 = 1024;

/// One mebibyte
pub const MIB: u64 = 1024 * KIB;

/// One gibibyte
pub const GIB: u64 = 1024 * MIB;

/// Default cumulative size limit for a single archive (10GiB)
pub const DEFAULT_SIZE_LIMIT: u64 = 10 * GIB;

// Remote transport constants
/// Default SSH port
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Default connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Permission mode for newly created remote directories
pub const REMOTE_DIRECTORY_MODE: u32 = 0o775;

/// Number of times to check that a remote directory became visible
pub const REMOTE_DIRECTORY_POLL_ATTEMPTS: usize = 5;

/// Delay between remote directory visibility checks in milliseconds
pub const REMOTE_DIRECTORY_POLL_INTERVAL_MS: u64 = 1000;

/// Timeout handed to a command session for fire-and-forget commands
pub const REMOTE_COMMAND_TIMEOUT_MS: u64 = 1000;

/// Buffer size for streaming uploads (1MB)
pub const UPLOAD_BUFFER_SIZE: usize = 1024 * 1024;

// Naming
/// Default file pattern used when discovering source files
pub const DEFAULT_FILE_PATTERN: &str = "*.nc";

/// Label of the subdirectory group for files sitting directly under the source root
pub const ROOT_GROUP_LABEL: &str = ".";

/// Label of the group used when files could not be grouped by date
pub const UNGROUPED_LABEL: &str = "data";

/// Archive suffix without compression
pub const TAR_SUFFIX: &str = "tar";

/// Archive suffix with gzip compression
pub const TAR_GZ_SUFFIX: &str = "tar.gz";

/// Default name of the configuration file
pub const DEFAULT_CONFIG_NAME: &str = "archiver.yaml";

// Error messages
pub const ERROR_FAILED_TO_CREATE_SESSION: &str = "Failed to create SSH session";
pub const ERROR_FAILED_TO_CREATE_SFTP: &str = "Failed to create SFTP subsystem";
pub const ERROR_AUTHENTICATION_FAILED: &str = "Authentication failed";
pub const ERROR_RUN_FAILED: &str = "Failed to transfer files";
