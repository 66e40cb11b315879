//! SSH client handler and host key verification
//!
//! Implements the `russh::client::Handler` trait. The only event handled is
//! server key verification, which is decided by a [`HostKeyPolicy`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use russh::keys::ssh_key::HashAlg;
use russh::keys::known_hosts::learn_known_hosts_path;
use russh::keys::{check_known_hosts_path, PublicKey};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// How the server host key is verified during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Key must already be present in known_hosts
    #[default]
    Strict,
    /// Unknown hosts are added to known_hosts; changed keys are rejected
    AcceptNew,
    /// Key must have this SHA-256 fingerprint (`SHA256:` prefix optional)
    Fingerprint(String),
    /// Accept every key. Vulnerable to man-in-the-middle attacks.
    Insecure,
}

impl FromStr for HostKeyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(HostKeyPolicy::Strict),
            "accept-new" => Ok(HostKeyPolicy::AcceptNew),
            "insecure" => Ok(HostKeyPolicy::Insecure),
            other => Err(Error::config(format!(
                "Unknown host key policy '{}' (expected strict, accept-new or insecure)",
                other
            ))),
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyPolicy::Strict => f.write_str("strict"),
            HostKeyPolicy::AcceptNew => f.write_str("accept-new"),
            HostKeyPolicy::Fingerprint(fp) => write!(f, "fingerprint {}", fp),
            HostKeyPolicy::Insecure => f.write_str("insecure"),
        }
    }
}

/// SHA-256 fingerprint of a public key, formatted as `SHA256:<base64>`
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

fn normalize_fingerprint(fp: &str) -> &str {
    let fp = fp.trim();
    fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=')
}

/// Check `key` presented by `host:port` against `policy`.
///
/// Returns `Error::HostKey` when the key is rejected. Under
/// [`HostKeyPolicy::AcceptNew`] an unknown key is appended to `known_hosts`.
pub fn verify_host_key(
    policy: &HostKeyPolicy,
    host: &str,
    port: u16,
    key: &PublicKey,
    known_hosts: &Path,
) -> Result<()> {
    let presented = fingerprint(key);

    match policy {
        HostKeyPolicy::Insecure => {
            warn!(
                "Accepting host key {} for {}:{} without verification",
                presented, host, port
            );
            Ok(())
        }
        HostKeyPolicy::Fingerprint(expected) => {
            if normalize_fingerprint(expected) == normalize_fingerprint(&presented) {
                debug!("Host key for {}:{} matches pinned fingerprint", host, port);
                Ok(())
            } else {
                Err(Error::host_key(format!(
                    "{}:{} presented {}, expected {}",
                    host, port, presented, expected
                )))
            }
        }
        HostKeyPolicy::Strict | HostKeyPolicy::AcceptNew => {
            let known = if known_hosts.exists() {
                check_known_hosts_path(host, port, key, known_hosts)
            } else {
                Ok(false)
            };

            match known {
                Ok(true) => {
                    debug!("Host key verified for {}:{}", host, port);
                    Ok(())
                }
                Ok(false) if *policy == HostKeyPolicy::AcceptNew => {
                    learn_known_hosts_path(host, port, key, known_hosts).map_err(|e| {
                        Error::host_key(format!(
                            "Failed to record host key in {}: {}",
                            known_hosts.display(),
                            e
                        ))
                    })?;
                    info!(
                        "Added {}:{} ({}) to {}",
                        host,
                        port,
                        presented,
                        known_hosts.display()
                    );
                    Ok(())
                }
                Ok(false) => Err(Error::host_key(format!(
                    "{}:{} is not in {} (presented {}). Add it or use --host-key-policy accept-new",
                    host,
                    port,
                    known_hosts.display(),
                    presented
                ))),
                Err(russh::keys::Error::KeyChanged { line }) => Err(Error::host_key(format!(
                    "HOST KEY CHANGED for {}:{} (presented {}); conflicting entry at {}:{}",
                    host,
                    port,
                    presented,
                    known_hosts.display(),
                    line
                ))),
                Err(e) => Err(Error::host_key(format!(
                    "Failed to read {} while verifying {}:{} ({}): {}",
                    known_hosts.display(),
                    host,
                    port,
                    presented,
                    e
                ))),
            }
        }
    }
}

/// SSH client handler for russh
#[derive(Debug, Clone)]
pub struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts: PathBuf,
}

impl SshHandler {
    /// Create a handler verifying `host:port` with `policy`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        policy: HostKeyPolicy,
        known_hosts: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
            known_hosts: known_hosts.into(),
        }
    }
}

impl russh::client::Handler for SshHandler {
    type Error = Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        verify_host_key(
            &self.policy,
            &self.host,
            self.port,
            server_public_key,
            &self.known_hosts,
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HOST_KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAILM+rvN+ot98qgEN796jTiQfZfG1KaT0PtFDJ/XFSqti";
    const OTHER_KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAILM+rvN+ot98qgEN796jTiQfZfG1KaT0PtFDJ+TFSqs3";

    fn key(openssh: &str) -> PublicKey {
        PublicKey::from_openssh(openssh).unwrap()
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("strict".parse::<HostKeyPolicy>().unwrap(), HostKeyPolicy::Strict);
        assert_eq!(
            "accept-new".parse::<HostKeyPolicy>().unwrap(),
            HostKeyPolicy::AcceptNew
        );
        assert_eq!(
            "INSECURE".parse::<HostKeyPolicy>().unwrap(),
            HostKeyPolicy::Insecure
        );
        assert!("yolo".parse::<HostKeyPolicy>().is_err());
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = fingerprint(&key(HOST_KEY));
        assert!(fp.starts_with("SHA256:"));
        assert_ne!(fp, fingerprint(&key(OTHER_KEY)));
    }

    #[test]
    fn test_strict_rejects_unknown_host() {
        let dir = tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");

        let err = verify_host_key(
            &HostKeyPolicy::Strict,
            "10.0.0.5",
            22,
            &key(HOST_KEY),
            &known_hosts,
        )
        .unwrap_err();
        assert!(matches!(err, Error::HostKey(_)));
        assert!(err.to_string().contains(&fingerprint(&key(HOST_KEY))));
        assert!(!known_hosts.exists());
    }

    #[test]
    fn test_accept_new_learns_then_strict_verifies() {
        let dir = tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        let host_key = key(HOST_KEY);

        verify_host_key(&HostKeyPolicy::AcceptNew, "10.0.0.5", 2222, &host_key, &known_hosts)
            .unwrap();
        assert!(fs::read_to_string(&known_hosts).unwrap().contains("10.0.0.5"));

        verify_host_key(&HostKeyPolicy::Strict, "10.0.0.5", 2222, &host_key, &known_hosts)
            .unwrap();
    }

    #[test]
    fn test_changed_key_rejected_even_with_accept_new() {
        let dir = tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        fs::write(&known_hosts, format!("10.0.0.5 {}\n", HOST_KEY)).unwrap();

        for policy in [HostKeyPolicy::Strict, HostKeyPolicy::AcceptNew] {
            let err = verify_host_key(&policy, "10.0.0.5", 22, &key(OTHER_KEY), &known_hosts)
                .unwrap_err();
            assert!(err.to_string().contains("HOST KEY CHANGED"));
        }
    }

    #[test]
    fn test_pinned_fingerprint() {
        let dir = tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        let host_key = key(HOST_KEY);
        let fp = fingerprint(&host_key);
        let bare = fp.trim_start_matches("SHA256:").to_string();

        for pinned in [fp.clone(), bare] {
            verify_host_key(
                &HostKeyPolicy::Fingerprint(pinned),
                "h",
                22,
                &host_key,
                &known_hosts,
            )
            .unwrap();
        }

        let err = verify_host_key(
            &HostKeyPolicy::Fingerprint(fp),
            "h",
            22,
            &key(OTHER_KEY),
            &known_hosts,
        )
        .unwrap_err();
        assert!(matches!(err, Error::HostKey(_)));
    }

    #[test]
    fn test_insecure_accepts_anything() {
        let dir = tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        fs::write(&known_hosts, format!("h {}\n", HOST_KEY)).unwrap();

        verify_host_key(&HostKeyPolicy::Insecure, "h", 22, &key(OTHER_KEY), &known_hosts)
            .unwrap();
    }

    #[tokio::test]
    async fn test_handler_applies_policy() {
        use russh::client::Handler;

        let dir = tempdir().unwrap();
        let mut handler = SshHandler::new(
            "10.0.0.5",
            22,
            HostKeyPolicy::Strict,
            dir.path().join("known_hosts"),
        );
        assert!(handler.check_server_key(&key(HOST_KEY)).await.is_err());

        let mut handler = SshHandler::new(
            "10.0.0.5",
            22,
            HostKeyPolicy::Insecure,
            dir.path().join("known_hosts"),
        );
        assert!(handler.check_server_key(&key(HOST_KEY)).await.unwrap());
    }
}
