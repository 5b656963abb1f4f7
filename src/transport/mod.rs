//! Remote transport abstraction.
//!
//! A [`Transport`] uploads files, answers whether a remote path exists and
//! hands out a command channel in one of two shapes:
//!
//! - [`CommandSession`]: commands are fired with a timeout and not waited on,
//!   so callers poll for their effect afterwards
//! - [`ManagedConnection`]: commands run to completion and report failure
//!
//! ## Backends
//!
//! - [`ssh::SshSession`]: SSH command session with SFTP uploads
//! - [`ssh::SshConnection`]: managed SSH connection with SFTP uploads
//! - [`local::LocalTransport`]: a mounted filesystem acting as the remote
//!
//! ```no_run
//! use climate_archiver::transport::{make_remote_directory, PollPolicy};
//! use climate_archiver::transport::local::LocalTransport;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut transport = LocalTransport::new();
//! make_remote_directory(Path::new("/mnt/backup/era5"), &mut transport, &PollPolicy::default())?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    REMOTE_COMMAND_TIMEOUT_MS, REMOTE_DIRECTORY_MODE, REMOTE_DIRECTORY_POLL_ATTEMPTS,
    REMOTE_DIRECTORY_POLL_INTERVAL_MS,
};

/// SSH backends
pub mod ssh;

/// Filesystem backend
pub mod local;

/// Interactive credential resolution
pub mod credentials;

/// A command understood by every remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// `mkdir -p -m <mode> '<path>'`
    MakeDirectory { path: PathBuf, mode: u32 },
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::MakeDirectory { path, mode } => {
                let quoted = path.to_string_lossy().replace('\'', r"'\''");
                write!(f, "mkdir -p -m {:04o} '{}'", mode, quoted)
            }
        }
    }
}

/// Shell that fires commands without waiting for them to finish
pub trait CommandSession {
    fn exec_command(&mut self, command: &RemoteCommand, timeout: Duration) -> Result<()>;
}

/// Connection that runs commands to completion
pub trait ManagedConnection {
    fn run(&mut self, command: &RemoteCommand) -> Result<()>;
}

/// Command capability offered by a transport
pub enum CommandChannel<'a> {
    Session(&'a mut dyn CommandSession),
    Managed(&'a mut dyn ManagedConnection),
}

/// Uploads files to, and inspects paths on, a remote host.
pub trait Transport {
    /// Copy a local file to `remote`, replacing anything already there
    fn put(&mut self, local: &Path, remote: &Path) -> Result<()>;

    /// Whether `remote` exists
    fn exists(&mut self, remote: &Path) -> Result<bool>;

    /// Channel for running remote commands
    fn channel(&mut self) -> CommandChannel<'_>;

    /// Label used in log messages
    fn describe(&self) -> String;
}

/// Bounded wait for a remote directory created through a command session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Number of existence checks
    pub attempts: usize,
    /// Pause after each failed check, in milliseconds
    pub interval_ms: u64,
    /// Timeout handed to the command session, in milliseconds
    pub command_timeout_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: REMOTE_DIRECTORY_POLL_ATTEMPTS,
            interval_ms: REMOTE_DIRECTORY_POLL_INTERVAL_MS,
            command_timeout_ms: REMOTE_COMMAND_TIMEOUT_MS,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Upper bound on the time spent waiting
    pub fn max_wait(&self) -> Duration {
        self.interval() * self.attempts as u32
    }
}

/// Create `directory` (and parents) on the remote with mode `0775`.
///
/// On a managed connection the command runs synchronously. On a command
/// session the directory is polled for according to `policy`; if it never
/// shows up a warning is logged and the call still succeeds.
pub fn make_remote_directory(
    directory: &Path,
    transport: &mut dyn Transport,
    policy: &PollPolicy,
) -> Result<()> {
    info!("Creating remote path: {}", directory.display());

    let command = RemoteCommand::MakeDirectory {
        path: directory.to_path_buf(),
        mode: REMOTE_DIRECTORY_MODE,
    };

    let needs_polling = match transport.channel() {
        CommandChannel::Managed(connection) => {
            connection
                .run(&command)
                .context(format!("Failed to create remote directory {}", directory.display()))?;
            false
        }
        CommandChannel::Session(session) => {
            session
                .exec_command(&command, policy.command_timeout())
                .context(format!("Failed to send mkdir for {}", directory.display()))?;
            true
        }
    };

    if !needs_polling {
        return Ok(());
    }

    for attempt in 1..=policy.attempts {
        if transport.exists(directory)? {
            debug!("{} visible after {} check(s)", directory.display(), attempt);
            return Ok(());
        }
        thread::sleep(policy.interval());
    }

    warn!(
        "Remote directory {} did not appear on {} within {:?}",
        directory.display(),
        transport.describe(),
        policy.max_wait()
    );
    Ok(())
}
