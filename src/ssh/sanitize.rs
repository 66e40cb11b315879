//! Argument validation and quoting for remote command lines
//!
//! The remote command is a single string interpreted by the login shell of
//! the target account, so every user-supplied piece is quoted for that
//! shell family before being joined.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// How arguments are quoted when composing the remote command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgQuoting {
    /// POSIX `sh` single quoting
    #[default]
    Posix,
    /// Windows OpenSSH with the default `cmd.exe` shell: `CommandLineToArgvW`
    /// double quoting, then caret escaping of cmd.exe metacharacters
    /// (`& | < > ^ ( ) % ! "`), see [`escape_cmd`].
    Windows,
    /// No quoting: arguments are joined with spaces as given.
    ///
    /// Any shell metacharacter in an argument is interpreted by the remote
    /// shell. Only use with trusted input.
    None,
}

impl ArgQuoting {
    /// Quote a single argument for this shell family
    pub fn quote(self, arg: &str) -> String {
        match self {
            ArgQuoting::Posix => quote_posix(arg),
            ArgQuoting::Windows => escape_cmd(&quote_windows(arg)),
            ArgQuoting::None => arg.to_string(),
        }
    }
}

impl FromStr for ArgQuoting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "posix" | "sh" => Ok(ArgQuoting::Posix),
            "windows" | "cmd" => Ok(ArgQuoting::Windows),
            "none" => Ok(ArgQuoting::None),
            other => Err(Error::invalid_params(format!(
                "Unknown quoting style '{}' (expected posix, windows or none)",
                other
            ))),
        }
    }
}

impl fmt::Display for ArgQuoting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgQuoting::Posix => "posix",
            ArgQuoting::Windows => "windows",
            ArgQuoting::None => "none",
        };
        f.write_str(name)
    }
}

/// Validate one piece of a command line.
///
/// Rejects NUL, carriage return and newline: none of the supported shells
/// can carry them inside a single command line argument.
///
/// # Examples
/// ```
/// use ssh_script_runner::ssh::sanitize::validate_argument;
///
/// assert!(validate_argument("hello world").is_ok());
/// assert!(validate_argument("line\nbreak").is_err());
/// ```
pub fn validate_argument(arg: &str) -> Result<()> {
    if let Some(c) = arg.chars().find(|&c| matches!(c, '\0' | '\r' | '\n')) {
        return Err(Error::invalid_params(format!(
            "Argument {:?} contains forbidden control character {:?}",
            arg, c
        )));
    }
    Ok(())
}

/// Escapes a string for safe use in single-quoted shell contexts.
///
/// Replaces single quotes with `'"'"'`: close the quote, add a double-quoted
/// single quote, reopen.
///
/// # Examples
///
/// ```
/// use ssh_script_runner::ssh::sanitize::escape_for_shell;
///
/// assert_eq!(escape_for_shell("hello"), "hello");
/// assert_eq!(escape_for_shell("it's"), "it'\"'\"'s");
/// ```
pub fn escape_for_shell(s: &str) -> String {
    s.replace('\'', "'\"'\"'")
}

/// Quote an argument for a POSIX shell.
///
/// Arguments made only of characters the shell treats literally pass through
/// unchanged.
///
/// # Examples
///
/// ```
/// use ssh_script_runner::ssh::sanitize::quote_posix;
///
/// assert_eq!(quote_posix("hello"), "hello");
/// assert_eq!(quote_posix("a b"), "'a b'");
/// assert_eq!(quote_posix(""), "''");
/// ```
pub fn quote_posix(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));

    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", escape_for_shell(arg))
    }
}

/// Quote an argument following the `CommandLineToArgvW` rules.
///
/// Backslashes are literal unless they precede a double quote, in which case
/// they are doubled and the quote escaped.
///
/// # Examples
///
/// ```
/// use ssh_script_runner::ssh::sanitize::quote_windows;
///
/// assert_eq!(quote_windows("C:\\Scripts\\target.py"), "C:\\Scripts\\target.py");
/// assert_eq!(quote_windows("two words"), "\"two words\"");
/// ```
pub fn quote_windows(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.contains([' ', '\t', '"']);
    if !needs_quotes {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');

    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat_n('\\', backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }

    // Trailing backslashes would escape the closing quote
    quoted.extend(std::iter::repeat_n('\\', backslashes * 2));
    quoted.push('"');
    quoted
}

/// Characters cmd.exe interprets on a command line, even inside double quotes
/// for `%` and `!`
const CMD_METACHARACTERS: &[char] = &['&', '|', '<', '>', '^', '(', ')', '%', '!', '"'];

/// Caret-escape cmd.exe metacharacters in an already argv-quoted string.
///
/// Double quotes are escaped too, so cmd.exe never enters a quoted region
/// and every caret is consumed before the program parses its arguments.
/// `%NAME%` becomes `^%NAME^%`, which names no variable and is left alone by
/// cmd.exe's expansion pass.
///
/// # Examples
///
/// ```
/// use ssh_script_runner::ssh::sanitize::escape_cmd;
///
/// assert_eq!(escape_cmd("a&b"), "a^&b");
/// assert_eq!(escape_cmd("\"two words\""), "^\"two words^\"");
/// ```
pub fn escape_cmd(quoted: &str) -> String {
    let mut escaped = String::with_capacity(quoted.len() * 2);
    for c in quoted.chars() {
        if CMD_METACHARACTERS.contains(&c) {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_argument() {
        assert!(validate_argument("hello").is_ok());
        assert!(validate_argument("").is_ok());
        assert!(validate_argument("tab\tok").is_ok());

        let err = validate_argument("a\0b").unwrap_err();
        assert!(err.to_string().contains("forbidden control character"));
        assert!(validate_argument("a\rb").is_err());
        assert!(validate_argument("a\nb").is_err());
    }

    #[test]
    fn test_escape_for_shell_single_quote() {
        assert_eq!(escape_for_shell("it's"), "it'\"'\"'s");
        assert_eq!(escape_for_shell("hello world"), "hello world");
    }

    #[test]
    fn test_quote_posix_plain() {
        assert_eq!(quote_posix("hello"), "hello");
        assert_eq!(quote_posix("123"), "123");
        assert_eq!(quote_posix("/opt/scripts/target.py"), "/opt/scripts/target.py");
        assert_eq!(quote_posix("--flag=value"), "--flag=value");
    }

    #[test]
    fn test_quote_posix_metacharacters() {
        assert_eq!(quote_posix("a b"), "'a b'");
        assert_eq!(quote_posix("$(reboot)"), "'$(reboot)'");
        assert_eq!(quote_posix("x; rm -rf /"), "'x; rm -rf /'");
        assert_eq!(quote_posix("it's"), "'it'\"'\"'s'");
        assert_eq!(quote_posix("C:\\Scripts"), "'C:\\Scripts'");
        assert_eq!(quote_posix(""), "''");
    }

    #[test]
    fn test_quote_windows_plain() {
        assert_eq!(quote_windows("hello"), "hello");
        assert_eq!(
            quote_windows("C:\\Users\\Administrator\\target.py"),
            "C:\\Users\\Administrator\\target.py"
        );
    }

    #[test]
    fn test_quote_windows_spaces_and_quotes() {
        assert_eq!(quote_windows("two words"), "\"two words\"");
        assert_eq!(quote_windows(""), "\"\"");
        assert_eq!(quote_windows("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_quote_windows_backslashes() {
        // Backslashes before a quote are doubled, trailing ones too
        assert_eq!(quote_windows("a\\\"b"), "\"a\\\\\\\"b\"");
        assert_eq!(quote_windows("C:\\My Dir\\"), "\"C:\\My Dir\\\\\"");
        assert_eq!(quote_windows("C:\\My Dir\\x"), "\"C:\\My Dir\\x\"");
    }

    #[test]
    fn test_windows_quoting_escapes_cmd_metacharacters() {
        let windows = ArgQuoting::Windows;
        assert_eq!(windows.quote("a&b"), "a^&b");
        assert_eq!(windows.quote("x&whoami"), "x^&whoami");
        assert_eq!(windows.quote("a|b"), "a^|b");
        assert_eq!(windows.quote("a>out.txt"), "a^>out.txt");
        assert_eq!(windows.quote("%PATH%"), "^%PATH^%");
        assert_eq!(windows.quote("(x)^!"), "^(x^)^^^!");
    }

    #[test]
    fn test_windows_quoting_escapes_quotes_around_spaces() {
        let windows = ArgQuoting::Windows;
        assert_eq!(windows.quote("two words"), "^\"two words^\"");
        assert_eq!(windows.quote("a b&c"), "^\"a b^&c^\"");
        assert_eq!(windows.quote("C:\\Scripts\\run.py"), "C:\\Scripts\\run.py");
    }

    #[test]
    fn test_arg_quoting_from_str() {
        assert_eq!("posix".parse::<ArgQuoting>().unwrap(), ArgQuoting::Posix);
        assert_eq!("Windows".parse::<ArgQuoting>().unwrap(), ArgQuoting::Windows);
        assert_eq!("none".parse::<ArgQuoting>().unwrap(), ArgQuoting::None);
        assert!("fish".parse::<ArgQuoting>().is_err());
        assert_eq!(ArgQuoting::default(), ArgQuoting::Posix);
        assert_eq!(ArgQuoting::Windows.to_string(), "windows");
    }

    #[test]
    fn test_arg_quoting_none_passes_through() {
        assert_eq!(ArgQuoting::None.quote("a b; c"), "a b; c");
    }
}
