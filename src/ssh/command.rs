//! Remote command output and command line composition

use serde::Serialize;

use super::sanitize::{validate_argument, ArgQuoting};
use crate::error::{Error, Result};

/// Output from a remote script execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,

    /// Standard error from the command
    pub stderr: String,

    /// Exit code of the command (None if the server sent no exit status)
    pub exit_code: Option<u32>,
}

impl CommandOutput {
    /// Check if the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Compose `<interpreter> <script> <args...>` for the remote shell.
///
/// The interpreter is inserted verbatim so it may carry its own flags
/// (`python3 -u`). The script path and each argument are validated and
/// quoted with `quoting`.
///
/// # Examples
///
/// ```
/// use ssh_script_runner::ssh::command::build_command_line;
/// use ssh_script_runner::ssh::ArgQuoting;
///
/// let cmd = build_command_line("python", "/opt/target.py", &["hello", "1 2"], ArgQuoting::Posix).unwrap();
/// assert_eq!(cmd, "python /opt/target.py hello '1 2'");
/// ```
pub fn build_command_line<S: AsRef<str>>(
    interpreter: &str,
    script_path: &str,
    args: &[S],
    quoting: ArgQuoting,
) -> Result<String> {
    let interpreter = interpreter.trim();
    if interpreter.is_empty() {
        return Err(Error::invalid_params("Interpreter cannot be empty"));
    }
    validate_argument(interpreter)?;

    if script_path.trim().is_empty() {
        return Err(Error::invalid_params("Script path cannot be empty"));
    }
    validate_argument(script_path)?;

    let mut command = format!("{} {}", interpreter, quoting.quote(script_path));
    for arg in args {
        let arg = arg.as_ref();
        validate_argument(arg)?;
        command.push(' ');
        command.push_str(&quoting.quote(arg));
    }

    Ok(command)
}
