//! Error types for the SSH script runner

use thiserror::Error;

use crate::ssh::keys::KeyError;

/// Main error type for the SSH script runner
#[derive(Debug, Error)]
pub enum Error {
    /// Private key path could not be resolved to a usable key file
    #[error(transparent)]
    Key(#[from] KeyError),

    /// SSH connection failed (network, handshake)
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Server host key was rejected by the host-key policy
    #[error("Host key verification failed: {0}")]
    HostKey(String),

    /// Authentication failed (password or key)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation needs an open connection
    #[error("Not connected: call connect() first")]
    NotConnected,

    /// Remote command could not be run or its output collected
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Connection or command timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Invalid parameters provided
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SSH key parsing error
    #[error("SSH key error: {0}")]
    SshKey(String),
}

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create a host key error from a string
    pub fn host_key(msg: impl Into<String>) -> Self {
        Error::HostKey(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Authentication(msg.into())
    }

    /// Create an execution error from a string
    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    /// Create an invalid params error from a string
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Error::InvalidParams(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

// Needed by the russh client handler's error bound
impl From<russh::Error> for Error {
    fn from(e: russh::Error) -> Self {
        Error::connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_display() {
        let err = Error::Connection("failed to connect".to_string());
        assert_eq!(err.to_string(), "SSH connection error: failed to connect");

        let err = Error::Timeout(5000);
        assert_eq!(err.to_string(), "Timeout after 5000ms");

        let err = Error::NotConnected;
        assert!(err.to_string().contains("connect()"));
    }

    #[test]
    fn test_key_error_is_transparent() {
        let err: Error = KeyError::NotFound {
            path: PathBuf::from("/keys/missing"),
        }
        .into();
        assert_eq!(err.to_string(), "Private key not found: /keys/missing");
        assert!(matches!(err, Error::Key(_)));
    }
}
