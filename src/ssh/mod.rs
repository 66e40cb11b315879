//! SSH remote execution module
//!
//! Key resolution, host key verification, command line composition and the
//! connect / execute / close lifecycle on top of russh.

pub mod command;
pub mod config;
pub mod connection;
pub mod handler;
pub mod keys;
pub mod sanitize;
pub mod transport;

// Re-exports
pub use command::{build_command_line, CommandOutput};
pub use config::SshConfig;
pub use connection::RemoteExecutor;
pub use handler::{HostKeyPolicy, SshHandler};
pub use keys::{resolve_private_key, KeyError, KeyErrorKind, ResolvedKey};
pub use sanitize::{quote_posix, quote_windows, ArgQuoting};
pub use transport::{Connector, Credentials, RusshConnector, Transport};
