use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::transport::{CommandChannel, ManagedConnection, RemoteCommand, Transport};

/// Treats a locally mounted filesystem (NFS share, external disk) as the remote.
///
/// Remote paths are plain local paths. Commands are carried out natively
/// rather than through a shell.
#[derive(Debug, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

impl ManagedConnection for LocalTransport {
    fn run(&mut self, command: &RemoteCommand) -> Result<()> {
        match command {
            RemoteCommand::MakeDirectory { path, mode } => {
                fs::create_dir_all(path).context(format!("Failed to create {}", path.display()))?;
                set_mode(path, *mode)?;
                debug!("Created {} with mode {:04o}", path.display(), mode);
                Ok(())
            }
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .context(format!("Failed to set mode {:04o} on {}", mode, path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

impl Transport for LocalTransport {
    fn put(&mut self, local: &Path, remote: &Path) -> Result<()> {
        fs::copy(local, remote)
            .context(format!("Failed to copy {} to {}", local.display(), remote.display()))?;
        Ok(())
    }

    fn exists(&mut self, remote: &Path) -> Result<bool> {
        Ok(remote.exists())
    }

    fn channel(&mut self) -> CommandChannel<'_> {
        CommandChannel::Managed(self)
    }

    fn describe(&self) -> String {
        "local filesystem".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{make_remote_directory, PollPolicy};
    use tempfile::TempDir;

    #[test]
    fn test_put_and_exists() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("a.nc");
        let remote = temp_dir.path().join("copy.nc");
        fs::write(&local, b"payload").unwrap();

        let mut transport = LocalTransport::new();
        assert!(!transport.exists(&remote).unwrap());
        transport.put(&local, &remote).unwrap();
        assert!(transport.exists(&remote).unwrap());
        assert_eq!(fs::read(&remote).unwrap(), b"payload");
    }

    #[test]
    fn test_put_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("a.nc");
        fs::write(&local, b"payload").unwrap();

        let mut transport = LocalTransport::new();
        assert!(transport.put(&local, &temp_dir.path().join("missing/a.nc")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_make_directory_uses_group_writable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("era5/x");

        let mut transport = LocalTransport::new();
        make_remote_directory(&target, &mut transport, &PollPolicy::default()).unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o775);
    }
}
