//! Transport seam between the executor and the SSH library
//!
//! [`Connector`] opens an authenticated [`Transport`]; a transport runs one
//! command at a time and collects its output. [`RusshConnector`] is the
//! production implementation on top of russh.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg};
use russh::{ChannelMsg, Disconnect};
use tokio::time::timeout;
use tracing::{debug, info};

use super::command::CommandOutput;
use super::config::SshConfig;
use super::handler::SshHandler;
use crate::error::{Error, Result};

/// Credentials selected for a connection attempt
#[derive(Debug, Clone, Copy)]
pub enum Credentials<'a> {
    /// Private key file (already resolved), with optional passphrase
    Key {
        path: &'a Path,
        passphrase: Option<&'a str>,
    },
    /// Password authentication
    Password(&'a str),
    /// Nothing configured; authentication will fail
    None,
}

/// An open, authenticated session to one host
#[async_trait]
pub trait Transport: Send {
    /// Run `command` and wait for the remote process to finish
    async fn run(&mut self, command: &str) -> Result<CommandOutput>;

    /// Tear down the session
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Connect, verify the host key and authenticate
    async fn open(&self, config: &SshConfig, credentials: Credentials<'_>)
        -> Result<Self::Transport>;
}

/// [`Connector`] backed by russh
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshConnector;

#[async_trait]
impl Connector for RusshConnector {
    type Transport = RusshTransport;

    async fn open(
        &self,
        config: &SshConfig,
        credentials: Credentials<'_>,
    ) -> Result<RusshTransport> {
        let limit = config.connect_timeout;
        match timeout(limit, connect_and_authenticate(config, credentials)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
        }
    }
}

async fn connect_and_authenticate(
    config: &SshConfig,
    credentials: Credentials<'_>,
) -> Result<RusshTransport> {
    info!(
        "Connecting to SSH server {}:{}...",
        config.host, config.port
    );

    let handler = SshHandler::new(
        &config.host,
        config.port,
        config.host_key_policy.clone(),
        config.known_hosts_path(),
    );
    let ssh_config = Arc::new(client::Config::default());

    // Host key rejections surface as Error::HostKey, russh failures as Error::Connection
    let mut session =
        client::connect(ssh_config, (config.host.as_str(), config.port), handler).await?;

    authenticate(&mut session, &config.username, credentials).await?;

    Ok(RusshTransport {
        session: Some(session),
        command_timeout: config.command_timeout,
    })
}

async fn authenticate(
    session: &mut Handle<SshHandler>,
    username: &str,
    credentials: Credentials<'_>,
) -> Result<()> {
    match credentials {
        Credentials::Key { path, passphrase } => {
            debug!(
                "Attempting key authentication for user '{}' with {}",
                username,
                path.display()
            );

            let key = load_secret_key(path, passphrase).map_err(|e| {
                Error::SshKey(format!(
                    "Failed to load private key {}: {}",
                    path.display(),
                    e
                ))
            })?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            let auth_result = session
                .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                .await
                .map_err(|e| Error::auth(e.to_string()))?;

            if auth_result.success() {
                info!("Key authentication successful");
                Ok(())
            } else {
                Err(Error::auth("Key authentication rejected"))
            }
        }
        Credentials::Password(password) => {
            debug!("Attempting password authentication for user '{}'", username);
            let auth_result = session
                .authenticate_password(username, password)
                .await
                .map_err(|e| Error::auth(e.to_string()))?;

            if auth_result.success() {
                info!("Password authentication successful");
                Ok(())
            } else {
                Err(Error::auth("Password authentication rejected"))
            }
        }
        Credentials::None => Err(Error::auth(
            "No authentication method available (require password or key)",
        )),
    }
}

/// [`Transport`] over a russh client session
pub struct RusshTransport {
    session: Option<Handle<SshHandler>>,
    command_timeout: Option<Duration>,
}

#[async_trait]
impl Transport for RusshTransport {
    async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| Error::execution(format!("Failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::execution(format!("Failed to exec command: {}", e)))?;

        match self.command_timeout {
            Some(limit) => match timeout(limit, collect_channel_output(channel)).await {
                Ok(output) => Ok(output),
                Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
            },
            None => Ok(collect_channel_output(channel).await),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "")
                .await?;
        }
        Ok(())
    }
}

/// Collect output from a channel until the server closes it.
async fn collect_channel_output(mut channel: russh::Channel<client::Msg>) -> CommandOutput {
    let mut collector = OutputCollector::default();
    while let Some(msg) = channel.wait().await {
        if !collector.push(msg) {
            break;
        }
    }
    collector.finish()
}

/// Folds channel messages into a [`CommandOutput`].
///
/// The exit status may arrive after EOF, so EOF alone does not end
/// collection; only `Close` does.
#[derive(Debug, Default)]
struct OutputCollector {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
}

impl OutputCollector {
    /// Record one message. Returns false once the channel is closed.
    fn push(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            // ext == 1 is SSH_EXTENDED_DATA_STDERR
            ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                self.stderr.extend_from_slice(&data)
            }
            ChannelMsg::ExtendedData { data, .. } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_code = Some(exit_status),
            ChannelMsg::Close => return false,
            _ => {}
        }
        true
    }

    fn finish(self) -> CommandOutput {
        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            exit_code: self.exit_code,
        };

        debug!(
            "Command completed: exit_code={:?}, stdout_len={}, stderr_len={}",
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );

        output
    }
}
