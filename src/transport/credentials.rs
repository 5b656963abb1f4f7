use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use log::debug;

use crate::transport::ssh::SshAuth;

/// Remote host name, asked for on the terminal when not configured
pub fn resolve_host(host: Option<String>) -> Result<String> {
    match host {
        Some(host) if !host.is_empty() => Ok(host),
        _ => Input::<String>::new()
            .with_prompt("Enter server URL")
            .interact_text()
            .context("Failed to read server URL"),
    }
}

/// Username and authentication method for a remote host.
///
/// Anything not supplied is asked for on the terminal; passwords are never
/// echoed and never written anywhere.
pub fn resolve_credentials(
    username: Option<String>,
    private_key: Option<PathBuf>,
    passphrase: Option<String>,
) -> Result<(String, SshAuth)> {
    let username = match username {
        Some(user) if !user.is_empty() => user,
        _ => Input::<String>::new()
            .with_prompt("Enter username")
            .interact_text()
            .context("Failed to read username")?,
    };

    let auth = match private_key {
        Some(path) => {
            debug!("Using private key {} for {}", path.display(), username);
            SshAuth::PrivateKey { path, passphrase }
        }
        None => {
            let password = Password::new()
                .with_prompt("Enter password")
                .interact()
                .context("Failed to read password")?;
            SshAuth::Password(password)
        }
    };

    Ok((username, auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplied_host_is_kept() {
        let host = resolve_host(Some("backup.example.org".to_string())).unwrap();
        assert_eq!(host, "backup.example.org");
    }

    #[test]
    fn test_supplied_credentials_skip_prompting() {
        let (user, auth) = resolve_credentials(
            Some("archivist".to_string()),
            Some(PathBuf::from("/home/archivist/.ssh/id_ed25519")),
            None,
        )
        .unwrap();

        assert_eq!(user, "archivist");
        match auth {
            SshAuth::PrivateKey { path, passphrase } => {
                assert_eq!(path, PathBuf::from("/home/archivist/.ssh/id_ed25519"));
                assert!(passphrase.is_none());
            }
            SshAuth::Password(_) => panic!("expected key authentication"),
        }
    }
}
