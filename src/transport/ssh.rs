use std::fs;
use std::io::{self, BufReader, Read};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use ssh2::{Session, Sftp};

use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, ERROR_AUTHENTICATION_FAILED, ERROR_FAILED_TO_CREATE_SESSION,
    ERROR_FAILED_TO_CREATE_SFTP, SSH_DEFAULT_PORT, UPLOAD_BUFFER_SIZE,
};
use crate::transport::{CommandChannel, CommandSession, ManagedConnection, RemoteCommand, Transport};

/// How to prove our identity to the server
#[derive(Clone)]
pub enum SshAuth {
    Password(String),
    PrivateKey { path: PathBuf, passphrase: Option<String> },
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password(_) => write!(f, "Password(<redacted>)"),
            SshAuth::PrivateKey { path, .. } => write!(f, "PrivateKey({})", path.display()),
        }
    }
}

/// Connection settings for an SSH backend
#[derive(Clone, Debug)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
    pub connection_timeout: Duration,
}

impl SshConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: SshAuth) -> Self {
        Self {
            host: host.into(),
            port: SSH_DEFAULT_PORT,
            username: username.into(),
            auth,
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
        }
    }

    fn label(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Authenticated session plus its SFTP subsystem.
///
/// The session is disconnected when this value is dropped.
struct SshLink {
    session: Session,
    sftp: Sftp,
    label: String,
    timeout_ms: u32,
}

impl SshLink {
    fn open(config: &SshConfig) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .context(format!("Failed to connect to {}:{}", config.host, config.port))?;
        tcp.set_read_timeout(Some(config.connection_timeout))
            .context("Failed to set read timeout")?;
        tcp.set_write_timeout(Some(config.connection_timeout))
            .context("Failed to set write timeout")?;

        let mut session = Session::new().context(ERROR_FAILED_TO_CREATE_SESSION)?;
        let timeout_ms = config.connection_timeout.as_millis().min(u32::MAX as u128) as u32;
        session.set_timeout(timeout_ms);
        session.set_tcp_stream(tcp);
        session.handshake().context("Failed to perform SSH handshake")?;

        match &config.auth {
            SshAuth::Password(password) => session
                .userauth_password(&config.username, password)
                .context(format!("{} for {}", ERROR_AUTHENTICATION_FAILED, config.label()))?,
            SshAuth::PrivateKey { path, passphrase } => session
                .userauth_pubkey_file(&config.username, None, path, passphrase.as_deref())
                .context(format!(
                    "{} with private key {}",
                    ERROR_AUTHENTICATION_FAILED,
                    path.display()
                ))?,
        }

        if !session.authenticated() {
            return Err(anyhow!("{} for {}", ERROR_AUTHENTICATION_FAILED, config.label()));
        }

        let sftp = session.sftp().context(ERROR_FAILED_TO_CREATE_SFTP)?;
        info!("Connected to {}", config.label());

        Ok(Self {
            session,
            sftp,
            label: config.label(),
            timeout_ms,
        })
    }

    fn put(&self, local: &Path, remote: &Path) -> Result<()> {
        let file = fs::File::open(local).context(format!("Failed to open {}", local.display()))?;
        let mut reader = BufReader::with_capacity(UPLOAD_BUFFER_SIZE, file);
        let mut remote_file = self
            .sftp
            .create(remote)
            .context(format!("Failed to create remote file {}", remote.display()))?;

        let written = io::copy(&mut reader, &mut remote_file)
            .context(format!("Failed to upload {} to {}", local.display(), remote.display()))?;
        debug!("Uploaded {} bytes to sftp://{}{}", written, self.label, remote.display());
        Ok(())
    }

    fn exists(&self, remote: &Path) -> bool {
        self.sftp.stat(remote).is_ok()
    }
}

impl Drop for SshLink {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "archive run finished", None) {
            warn!("Failed to disconnect from {}: {}", self.label, e);
        } else {
            debug!("Disconnected from {}", self.label);
        }
    }
}

/// SSH backend that fires commands and leaves callers to poll for their effect
pub struct SshSession {
    link: SshLink,
}

impl SshSession {
    pub fn connect(config: &SshConfig) -> Result<Self> {
        Ok(Self {
            link: SshLink::open(config)?,
        })
    }

    fn fire(&self, command: &RemoteCommand) -> Result<()> {
        let mut channel = self
            .link
            .session
            .channel_session()
            .context("Failed to open SSH channel")?;
        channel
            .exec(&command.to_string())
            .context(format!("Failed to execute `{}`", command))?;
        Ok(())
    }
}

impl CommandSession for SshSession {
    fn exec_command(&mut self, command: &RemoteCommand, timeout: Duration) -> Result<()> {
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        self.link.session.set_timeout(timeout_ms);
        let result = self.fire(command);
        self.link.session.set_timeout(self.link.timeout_ms);
        result
    }
}

impl Transport for SshSession {
    fn put(&mut self, local: &Path, remote: &Path) -> Result<()> {
        self.link.put(local, remote)
    }

    fn exists(&mut self, remote: &Path) -> Result<bool> {
        Ok(self.link.exists(remote))
    }

    fn channel(&mut self) -> CommandChannel<'_> {
        CommandChannel::Session(self)
    }

    fn describe(&self) -> String {
        format!("ssh session {}", self.link.label)
    }
}

/// SSH backend that waits for each command and checks its exit status
pub struct SshConnection {
    link: SshLink,
}

impl SshConnection {
    pub fn connect(config: &SshConfig) -> Result<Self> {
        Ok(Self {
            link: SshLink::open(config)?,
        })
    }
}

impl ManagedConnection for SshConnection {
    fn run(&mut self, command: &RemoteCommand) -> Result<()> {
        let mut channel = self
            .link
            .session
            .channel_session()
            .context("Failed to open SSH channel")?;
        channel
            .exec(&command.to_string())
            .context(format!("Failed to execute `{}`", command))?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_close()?;

        let status = channel.exit_status()?;
        if status != 0 {
            return Err(anyhow!("`{}` exited with status {}: {}", command, status, stderr.trim()));
        }

        debug!("`{}` completed on {}", command, self.link.label);
        Ok(())
    }
}

impl Transport for SshConnection {
    fn put(&mut self, local: &Path, remote: &Path) -> Result<()> {
        self.link.put(local, remote)
    }

    fn exists(&mut self, remote: &Path) -> Result<bool> {
        Ok(self.link.exists(remote))
    }

    fn channel(&mut self) -> CommandChannel<'_> {
        CommandChannel::Managed(self)
    }

    fn describe(&self) -> String {
        format!("ssh connection {}", self.link.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let auth = SshAuth::Password("secret".to_string());
        let config = SshConfig::new("backup.example.org", "archivist", auth);
        assert_eq!(config.port, 22);
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.label(), "archivist@backup.example.org:22");
    }

    #[test]
    fn test_password_is_not_debug_printed() {
        let auth = SshAuth::Password("hunter2".to_string());
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        let mut config = SshConfig::new("127.0.0.1", "nobody", SshAuth::Password(String::new()));
        config.port = 1;
        assert!(SshConnection::connect(&config).is_err());
    }
}
