//! SSH configuration types
//!
//! Connection parameters for a [`RemoteExecutor`](super::RemoteExecutor),
//! built with a small builder API.

use std::path::PathBuf;
use std::time::Duration;

use super::handler::HostKeyPolicy;
use super::sanitize::ArgQuoting;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Interpreter used to run the remote script when none is configured
pub const DEFAULT_INTERPRETER: &str = "python";

/// Connection timeout in seconds
pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// SSH connection configuration
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password for password authentication
    pub password: Option<String>,

    /// Private key path: a key file or a directory to search.
    /// Takes precedence over `password` when set.
    pub key_path: Option<PathBuf>,

    /// Passphrase for an encrypted private key
    pub key_passphrase: Option<String>,

    /// Program that runs the script on the remote host
    pub interpreter: String,

    /// Quoting applied to the script path and arguments
    pub quoting: ArgQuoting,

    /// How the server host key is verified
    pub host_key_policy: HostKeyPolicy,

    /// known_hosts file (None = `~/.ssh/known_hosts`)
    pub known_hosts: Option<PathBuf>,

    /// Limit on connection establishment and authentication
    pub connect_timeout: Duration,

    /// Limit on a single remote command (None = wait indefinitely)
    pub command_timeout: Option<Duration>,
}

impl SshConfig {
    /// Create a new SSH configuration with minimal required fields
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: None,
            key_path: None,
            key_passphrase: None,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            quoting: ArgQuoting::default(),
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
            connect_timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
            command_timeout: None,
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set password authentication
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set key authentication (path to a key file or a directory of keys)
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Set the passphrase used to decrypt the private key
    pub fn with_key_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.key_passphrase = Some(passphrase.into());
        self
    }

    /// Set the remote interpreter (e.g. `python3`, `powershell -File`)
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_quoting(mut self, quoting: ArgQuoting) -> Self {
        self.quoting = quoting;
        self
    }

    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`
    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Resolved known_hosts location
    pub fn known_hosts_path(&self) -> PathBuf {
        self.known_hosts.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".ssh").join("known_hosts"))
                .unwrap_or_else(|| PathBuf::from(".ssh").join("known_hosts"))
        })
    }
}
