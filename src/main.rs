//! SSH Script Runner - Entry point
//!
//! Parses CLI arguments, connects to the remote host, runs the script and
//! exits with the remote exit code.

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ssh_script_runner::config::{Args, Config};
use ssh_script_runner::ssh::{CommandOutput, RemoteExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries the remote script output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let json_output = args.json;
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) if json_output => {
            error!("{}", e);
            print_json(&error_report(&e))?;
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    info!("ssh-run v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Target {}@{}:{} (host key policy: {})",
        config.user, config.host, config.port, config.host_key_policy
    );

    let mut executor = RemoteExecutor::new(config.ssh_config());

    if let Err(e) = executor.connect().await {
        error!("Connection failed: {}", e);
        if config.json {
            print_json(&error_report(&e))?;
        }
        return Ok(ExitCode::FAILURE);
    }

    let result = executor.execute(&config.script, config.args.as_slice()).await;
    executor.close().await;

    match result {
        Ok(output) => {
            if output.success() {
                info!("Script completed successfully");
            } else {
                warn!("Script exited with status {:?}", output.exit_code);
            }
            if config.json {
                print_json(&serde_json::to_value(&output)?)?;
            } else {
                forward_streams(&output)?;
            }
            Ok(exit_code(&output))
        }
        Err(e) => {
            error!("Execution failed: {}", e);
            if config.json {
                print_json(&error_report(&e))?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    writeln!(std::io::stdout(), "{}", rendered).context("Failed to write to stdout")
}

/// `--json` body for a run that produced no script output
fn error_report(e: &impl std::fmt::Display) -> serde_json::Value {
    json!({ "error": e.to_string() })
}

fn forward_streams(output: &CommandOutput) -> anyhow::Result<()> {
    std::io::stdout()
        .write_all(output.stdout.as_bytes())
        .context("Failed to write remote stdout")?;
    std::io::stderr()
        .write_all(output.stderr.as_bytes())
        .context("Failed to write remote stderr")?;
    Ok(())
}

/// Remote exit status as a local exit code. A missing status or one outside
/// 0..=255 is reported as failure.
fn exit_code(output: &CommandOutput) -> ExitCode {
    match output.exit_code.map(u8::try_from) {
        Some(Ok(code)) => ExitCode::from(code),
        _ => ExitCode::FAILURE,
    }
}
