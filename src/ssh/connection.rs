//! Remote script executor
//!
//! Owns the connection parameters and at most one open transport, and
//! exposes the connect / execute / close lifecycle.

use tracing::{debug, error, info, warn};

use super::command::{build_command_line, CommandOutput};
use super::config::SshConfig;
use super::keys::resolve_private_key;
use super::transport::{Connector, Credentials, RusshConnector, Transport};
use crate::error::{Error, Result};

/// Remote script executor
///
/// State machine: disconnected until [`connect`](Self::connect) succeeds,
/// connected until [`close`](Self::close). Methods take `&mut self`, so an
/// executor is driven by one task at a time.
pub struct RemoteExecutor<C: Connector = RusshConnector> {
    /// SSH configuration
    config: SshConfig,

    /// Opens the transport
    connector: C,

    /// Active transport
    transport: Option<C::Transport>,
}

impl RemoteExecutor<RusshConnector> {
    /// Create an executor using russh as the transport.
    ///
    /// Does not connect; call [`connect`](Self::connect).
    pub fn new(config: SshConfig) -> Self {
        Self::with_connector(config, RusshConnector)
    }
}

impl<C: Connector> RemoteExecutor<C> {
    /// Create an executor with a custom connector
    pub fn with_connector(config: SshConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            transport: None,
        }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Check if the connection is active
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Establish the SSH connection.
    ///
    /// With a key path configured, the key is resolved first and resolution
    /// errors are returned as [`Error::Key`]; the key is preferred over a
    /// password. Calling this while connected does nothing.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("Already connected to {}", self.config.host);
            return Ok(());
        }

        let resolved_key = match &self.config.key_path {
            Some(path) => {
                let key = resolve_private_key(path).inspect_err(|e| {
                    error!("Key resolution failed: {}", e);
                })?;
                Some(key)
            }
            None => None,
        };

        let credentials = match (&resolved_key, &self.config.password) {
            (Some(key), _) => Credentials::Key {
                path: key.path(),
                passphrase: self.config.key_passphrase.as_deref(),
            },
            (None, Some(password)) => Credentials::Password(password),
            (None, None) => Credentials::None,
        };

        match self.connector.open(&self.config, credentials).await {
            Ok(transport) => {
                self.transport = Some(transport);
                info!(
                    "Connected to {}@{}:{}",
                    self.config.username, self.config.host, self.config.port
                );
                Ok(())
            }
            Err(e) => {
                error!("Connection to {} failed: {}", self.config.host, e);
                Err(e)
            }
        }
    }

    /// Run `script_path` with the configured interpreter on the remote host.
    ///
    /// Blocks (asynchronously) until the remote process exits and returns
    /// its complete stdout, stderr and exit status.
    pub async fn execute<S: AsRef<str>>(
        &mut self,
        script_path: &str,
        args: &[S],
    ) -> Result<CommandOutput> {
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;

        let command = build_command_line(
            &self.config.interpreter,
            script_path,
            args,
            self.config.quoting,
        )?;
        debug!("Executing remote command: {}", command);

        transport.run(&command).await.map_err(|e| match e {
            Error::Timeout(_) | Error::Execution(_) | Error::NotConnected => e,
            other => Error::execution(other.to_string()),
        })
    }

    /// Close the connection. Safe to call when not connected.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("Error while disconnecting from {}: {}", self.config.host, e);
            }
            info!("SSH connection to {} closed", self.config.host);
        }
    }
}

impl<C: Connector> std::fmt::Debug for RemoteExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteExecutor")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .field("connected", &self.is_connected())
            .finish()
    }
}
