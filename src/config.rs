//! Configuration and CLI argument parsing for the SSH script runner

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ssh::config::{CONNECTION_TIMEOUT_SECS, DEFAULT_INTERPRETER};
use crate::ssh::{ArgQuoting, HostKeyPolicy, SshConfig};

/// SSH Script Runner CLI Arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "ssh-run")]
#[command(version)]
#[command(about = "Run a script on a remote host over SSH and report its output and exit status")]
pub struct Args {
    /// SSH host to connect to
    #[arg(long, env = "SSH_RUN_HOST")]
    pub host: String,

    /// SSH port
    #[arg(long, default_value = "22", env = "SSH_RUN_PORT")]
    pub port: u16,

    /// SSH username
    #[arg(long, env = "SSH_RUN_USER")]
    pub user: String,

    /// SSH password (used only when no key is given)
    #[arg(long, env = "SSH_RUN_PASSWORD")]
    pub password: Option<String>,

    /// Private key file, or a directory searched for
    /// id_ed25519, id_rsa, windows_key, winkey.
    /// `~` and environment variables are expanded.
    #[arg(long, env = "SSH_RUN_KEY")]
    pub key: Option<PathBuf>,

    /// Passphrase for an encrypted private key
    #[arg(long, env = "SSH_RUN_KEY_PASSPHRASE")]
    pub key_passphrase: Option<String>,

    /// Interpreter that runs the script on the remote host
    #[arg(long, default_value = DEFAULT_INTERPRETER, env = "SSH_RUN_INTERPRETER")]
    pub interpreter: String,

    /// Argument quoting for the remote shell: posix (sh), windows (cmd.exe)
    /// or none (unquoted, trusted input only)
    #[arg(long, default_value = "posix", env = "SSH_RUN_QUOTING")]
    pub quoting: String,

    /// Host key policy: strict, accept-new or insecure
    #[arg(long, default_value = "strict", env = "SSH_RUN_HOST_KEY_POLICY")]
    pub host_key_policy: String,

    /// Expected SHA-256 host key fingerprint (replaces the known_hosts check)
    #[arg(long, env = "SSH_RUN_HOST_FINGERPRINT")]
    pub host_fingerprint: Option<String>,

    /// known_hosts file (default: ~/.ssh/known_hosts)
    #[arg(long, env = "SSH_RUN_KNOWN_HOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = CONNECTION_TIMEOUT_SECS, env = "SSH_RUN_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Script execution timeout in milliseconds (0 or unset = no limit)
    #[arg(long, env = "SSH_RUN_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Print the result as JSON instead of forwarding the remote streams
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Path of the script on the remote host
    pub script: String,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SSH host
    pub host: String,

    /// SSH port
    pub port: u16,

    /// SSH username
    pub user: String,

    /// SSH password
    pub password: Option<String>,

    /// Private key file or directory (unexpanded)
    pub key: Option<PathBuf>,

    pub key_passphrase: Option<String>,

    pub interpreter: String,

    pub quoting: ArgQuoting,

    pub host_key_policy: HostKeyPolicy,

    pub known_hosts: Option<PathBuf>,

    pub connect_timeout: Duration,

    /// Script timeout (None = unlimited)
    pub command_timeout: Option<Duration>,

    /// Remote script path
    pub script: String,

    /// Script arguments
    pub args: Vec<String>,

    /// Emit JSON output
    pub json: bool,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        let mut errors = Vec::new();

        if args.host.trim().is_empty() {
            errors.push("Missing required --host".to_string());
        }

        if args.user.trim().is_empty() {
            errors.push("Missing required --user".to_string());
        }

        let password = sanitize_password(args.password);
        if password.is_none() && args.key.is_none() {
            errors.push("Must provide either --password or --key".to_string());
        }

        if args.interpreter.trim().is_empty() {
            errors.push("--interpreter cannot be empty".to_string());
        }

        if args.script.trim().is_empty() {
            errors.push("Script path cannot be empty".to_string());
        }

        if args.connect_timeout == 0 {
            errors.push("--connect-timeout must be greater than 0".to_string());
        }

        let quoting = args
            .quoting
            .parse::<ArgQuoting>()
            .map_err(|e| errors.push(e.to_string()))
            .ok();

        let host_key_policy = parse_host_key_policy(
            &args.host_key_policy,
            args.host_fingerprint.filter(|fp| !fp.trim().is_empty()),
        )
        .map_err(|e| errors.push(e.to_string()))
        .ok();

        let (Some(quoting), Some(host_key_policy), true) =
            (quoting, host_key_policy, errors.is_empty())
        else {
            return Err(Error::Config(format!(
                "Configuration error:\n{}",
                errors.join("\n")
            )));
        };

        Ok(Config {
            host: args.host.trim().to_string(),
            port: args.port,
            user: args.user,
            password,
            key: args.key,
            key_passphrase: sanitize_password(args.key_passphrase),
            interpreter: args.interpreter.trim().to_string(),
            quoting,
            host_key_policy,
            known_hosts: args.known_hosts,
            connect_timeout: Duration::from_secs(args.connect_timeout),
            command_timeout: parse_timeout_ms(args.timeout),
            script: args.script,
            args: args.args,
            json: args.json,
        })
    }

    /// Build the connection parameters for the executor
    pub fn ssh_config(&self) -> SshConfig {
        let mut config = SshConfig::new(&self.host, &self.user)
            .with_port(self.port)
            .with_interpreter(&self.interpreter)
            .with_quoting(self.quoting)
            .with_host_key_policy(self.host_key_policy.clone())
            .with_connect_timeout(self.connect_timeout);

        if let Some(ref password) = self.password {
            config = config.with_password(password);
        }
        if let Some(ref key) = self.key {
            config = config.with_key_path(key);
        }
        if let Some(ref passphrase) = self.key_passphrase {
            config = config.with_key_passphrase(passphrase);
        }
        if let Some(ref known_hosts) = self.known_hosts {
            config = config.with_known_hosts(known_hosts);
        }
        if let Some(timeout) = self.command_timeout {
            config = config.with_command_timeout(timeout);
        }

        config
    }
}

/// Combine `--host-key-policy` and `--host-fingerprint`.
///
/// A fingerprint pins the key and may only be combined with the default
/// `strict` policy.
fn parse_host_key_policy(policy: &str, fingerprint: Option<String>) -> Result<HostKeyPolicy> {
    let policy = policy.parse::<HostKeyPolicy>()?;
    match (policy, fingerprint) {
        (HostKeyPolicy::Strict, Some(fp)) => Ok(HostKeyPolicy::Fingerprint(fp)),
        (policy, Some(_)) => Err(Error::config(format!(
            "--host-fingerprint cannot be combined with --host-key-policy {}",
            policy
        ))),
        (policy, None) => Ok(policy),
    }
}

/// Parse the timeout argument
///
/// - None (not provided) → None (unlimited)
/// - 0 → None (unlimited)
/// - positive → Some(duration in milliseconds)
pub fn parse_timeout_ms(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}

/// Sanitize password: return None if empty
fn sanitize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Config> {
        let mut argv = vec!["ssh-run", "--host", "192.168.16.105", "--user", "Administrator"];
        argv.extend_from_slice(extra);
        Config::from_args(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_minimal_password_config() {
        let config = parse(&["--password", "123456", "target.py"]).unwrap();

        assert_eq!(config.port, 22);
        assert_eq!(config.interpreter, "python");
        assert_eq!(config.quoting, ArgQuoting::Posix);
        assert_eq!(config.host_key_policy, HostKeyPolicy::Strict);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.command_timeout.is_none());
        assert_eq!(config.script, "target.py");
        assert!(config.args.is_empty());
        assert!(!config.json);
    }

    #[test]
    fn test_script_arguments_keep_hyphens() {
        let config = parse(&["--key", "~/.ssh", "target.py", "hello", "-n", "123"]).unwrap();
        assert_eq!(config.args, vec!["hello", "-n", "123"]);
        assert_eq!(config.key, Some(PathBuf::from("~/.ssh")));
    }

    #[test]
    fn test_requires_password_or_key() {
        let err = parse(&["target.py"]).unwrap_err();
        assert!(err.to_string().contains("--password or --key"));

        let err = parse(&["--password", "", "target.py"]).unwrap_err();
        assert!(err.to_string().contains("--password or --key"));
    }

    #[test]
    fn test_collects_all_errors() {
        let err = parse(&[
            "--quoting",
            "fish",
            "--host-key-policy",
            "trusting",
            "--interpreter",
            " ",
            "target.py",
        ])
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("--password or --key"));
        assert!(msg.contains("Unknown quoting style"));
        assert!(msg.contains("Unknown host key policy"));
        assert!(msg.contains("--interpreter cannot be empty"));
    }

    #[test]
    fn test_fingerprint_pins_host_key() {
        let config = parse(&[
            "--password",
            "p",
            "--host-fingerprint",
            "SHA256:abc",
            "target.py",
        ])
        .unwrap();
        assert_eq!(
            config.host_key_policy,
            HostKeyPolicy::Fingerprint("SHA256:abc".to_string())
        );

        let err = parse(&[
            "--password",
            "p",
            "--host-fingerprint",
            "SHA256:abc",
            "--host-key-policy",
            "insecure",
            "target.py",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn test_ssh_config_from_config() {
        let config = parse(&[
            "--password",
            "p",
            "--key",
            "/keys",
            "--port",
            "2222",
            "--quoting",
            "windows",
            "--timeout",
            "1500",
            "target.py",
        ])
        .unwrap();
        let ssh = config.ssh_config();

        assert_eq!(ssh.host, "192.168.16.105");
        assert_eq!(ssh.username, "Administrator");
        assert_eq!(ssh.port, 2222);
        assert_eq!(ssh.password, Some("p".to_string()));
        assert_eq!(ssh.key_path, Some(PathBuf::from("/keys")));
        assert_eq!(ssh.quoting, ArgQuoting::Windows);
        assert_eq!(ssh.command_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_timeout_ms() {
        assert_eq!(parse_timeout_ms(None), None);
        assert_eq!(parse_timeout_ms(Some(0)), None);
        assert_eq!(parse_timeout_ms(Some(250)), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_sanitize_password() {
        assert_eq!(
            sanitize_password(Some("secret".to_string())),
            Some("secret".to_string())
        );
        assert_eq!(sanitize_password(Some("".to_string())), None);
        assert_eq!(sanitize_password(None), None);
    }
}
