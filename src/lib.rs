//! SSH Script Runner - run a script on a remote host over SSH
//!
//! This crate connects to a remote host with password or key-based
//! authentication, runs a script through an interpreter (`python` by
//! default) and returns its standard output, standard error and exit status.
//!
//! # Features
//!
//! - Private key path resolution: a key file, or a directory searched for
//!   `id_ed25519`, `id_rsa`, `windows_key`, `winkey`
//! - PuTTY `.ppk` keys detected up front with a conversion hint
//! - Host key verification against known_hosts or a pinned fingerprint
//! - Arguments quoted for POSIX or Windows remote shells
//! - Tagged errors distinguishing key, host key, authentication, network
//!   and execution failures
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! ssh-run --host=192.168.16.105 --user=Administrator --key='~/.ssh' \
//!   --quoting=windows 'C:\Scripts\target.py' hello 123
//! ```
//!
//! # Example Usage (library)
//!
//! ```no_run
//! use ssh_script_runner::{RemoteExecutor, SshConfig};
//!
//! # async fn run() -> ssh_script_runner::Result<()> {
//! let mut executor = RemoteExecutor::new(
//!     SshConfig::new("192.168.16.105", "Administrator").with_key_path("~/.ssh"),
//! );
//! executor.connect().await?;
//! let output = executor.execute("target.py", &["hello", "123"]).await?;
//! println!("{}", output.stdout);
//! executor.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ssh;

// Re-exports for convenience
pub use config::{Args, Config};
pub use error::{Error, Result};
pub use ssh::{
    build_command_line, resolve_private_key, ArgQuoting, CommandOutput, HostKeyPolicy, KeyError,
    KeyErrorKind, RemoteExecutor, ResolvedKey, SshConfig,
};
