//! Private key path resolution
//!
//! Turns a user-supplied key path (a directory such as `~/.ssh`, a specific
//! key file, or a path that does not exist) into exactly one usable private
//! key file, or a [`KeyError`] describing what went wrong.
//!
//! PuTTY `.ppk` keys cannot be loaded by russh. They are rejected by
//! extension, by their `PuTTY-User-Key-File` header, or (for a missing path)
//! when a `.ppk` sibling exists next to it, so the user gets a conversion
//! hint instead of an opaque authentication failure.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Key file names searched, in priority order, when a directory is given
pub const KEY_CANDIDATES: [&str; 4] = ["id_ed25519", "id_rsa", "windows_key", "winkey"];

/// Extension of PuTTY private key files (compared case-insensitively)
pub const PUTTY_EXTENSION: &str = ".ppk";

/// First-line signature of PuTTY private key files
pub const PUTTY_SIGNATURE: &str = "PuTTY-User-Key-File";

/// Upper bound on bytes read while looking for the first line of a key file
const HEADER_READ_LIMIT: u64 = 64 * 1024;

/// Key resolution errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error(
        "No private key found in directory: {}. Looked for id_ed25519, id_rsa, windows_key, winkey",
        .dir.display()
    )]
    NoKeyInDirectory { dir: PathBuf },

    #[error("Private key not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error(
        "PuTTY .ppk keys are not supported. Convert to OpenSSH format \
         (PuTTYgen: Load .ppk -> Conversions -> Export OpenSSH key) \
         and use that file instead. Provided: {}",
        .path.display()
    )]
    PuttyExtension { path: PathBuf },

    #[error(
        "Detected PuTTY key format. Convert to OpenSSH format \
         (PuTTYgen: Load .ppk -> Conversions -> Export OpenSSH key) \
         and use that file instead. Provided: {}",
        .path.display()
    )]
    PuttySignature { path: PathBuf },

    #[error(
        "PuTTY .ppk key detected adjacent to the requested path. Convert to OpenSSH format \
         (PuTTYgen: Load .ppk -> Conversions -> Export OpenSSH key) \
         and use that file instead. Found: {}",
        .sibling.display()
    )]
    AdjacentPutty { requested: PathBuf, sibling: PathBuf },
}

/// Coarse classification of a [`KeyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyErrorKind {
    /// No key file at the given location
    NotFound,
    /// A key exists but is in PuTTY format
    UnsupportedFormat,
}

impl KeyError {
    /// Classify this error as not-found or unsupported-format
    pub fn kind(&self) -> KeyErrorKind {
        match self {
            KeyError::NoKeyInDirectory { .. } | KeyError::NotFound { .. } => {
                KeyErrorKind::NotFound
            }
            KeyError::PuttyExtension { .. }
            | KeyError::PuttySignature { .. }
            | KeyError::AdjacentPutty { .. } => KeyErrorKind::UnsupportedFormat,
        }
    }
}

/// A private key file selected by [`resolve_private_key`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    path: PathBuf,
    warning: Option<String>,
}

impl ResolvedKey {
    /// Path of the selected key file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set when the key header could not be inspected; the key is still
    /// returned and any real problem surfaces during authentication.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Resolve a user-supplied key path to a single usable private key file.
///
/// `~` and environment variables (`$NAME`, `${NAME}`, `%NAME%`) are expanded
/// first. See the module docs for the rules applied afterwards.
///
/// # Examples
///
/// ```no_run
/// use ssh_script_runner::ssh::keys::resolve_private_key;
///
/// let key = resolve_private_key("~/.ssh").unwrap();
/// println!("using {}", key.path().display());
/// ```
pub fn resolve_private_key(path: impl AsRef<Path>) -> Result<ResolvedKey, KeyError> {
    let expanded = expand_path(path.as_ref());
    debug!("Resolving private key at {}", expanded.display());
    resolve_expanded(expanded)
}

fn resolve_expanded(expanded: PathBuf) -> Result<ResolvedKey, KeyError> {
    if expanded.is_dir() {
        let found = KEY_CANDIDATES
            .iter()
            .map(|name| expanded.join(name))
            .find(|candidate| candidate.is_file());

        return match found {
            Some(path) => Ok(ResolvedKey {
                path,
                warning: None,
            }),
            None => Err(KeyError::NoKeyInDirectory { dir: expanded }),
        };
    }

    if expanded.is_file() {
        if has_putty_extension(&expanded) {
            return Err(KeyError::PuttyExtension { path: expanded });
        }

        return match read_first_line(&expanded) {
            Ok(line) if line.starts_with(PUTTY_SIGNATURE) => {
                Err(KeyError::PuttySignature { path: expanded })
            }
            Ok(_) => Ok(ResolvedKey {
                path: expanded,
                warning: None,
            }),
            Err(e) => {
                let warning = format!(
                    "Could not inspect key header of {}: {}",
                    expanded.display(),
                    e
                );
                warn!("{}; deferring to authentication", warning);
                Ok(ResolvedKey {
                    path: expanded,
                    warning: Some(warning),
                })
            }
        };
    }

    if !has_putty_extension(&expanded) {
        let mut sibling = expanded.clone().into_os_string();
        sibling.push(PUTTY_EXTENSION);
        let sibling = PathBuf::from(sibling);
        if sibling.is_file() {
            return Err(KeyError::AdjacentPutty {
                requested: expanded,
                sibling,
            });
        }
    }

    Err(KeyError::NotFound { path: expanded })
}

fn has_putty_extension(path: &Path) -> bool {
    path.to_string_lossy()
        .to_lowercase()
        .ends_with(PUTTY_EXTENSION)
}

/// Read the first line of a file as text, dropping invalid UTF-8 and
/// surrounding whitespace.
fn read_first_line(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file.take(HEADER_READ_LIMIT));
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;

    let line: String = String::from_utf8_lossy(&buf)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect();
    Ok(line.trim().to_string())
}

/// Expand `~` and environment variables in a path.
///
/// Non UTF-8 paths are returned unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(expand_str(s, dirs::home_dir(), |name| {
            std::env::var(name).ok()
        })),
        None => path.to_path_buf(),
    }
}

fn expand_str(
    input: &str,
    home: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let expanded =
        shellexpand::full_with_context_no_errors(input, || home.as_deref().and_then(Path::to_str), |name| lookup(name));
    expand_percent_vars(&expanded, lookup)
}

/// Replace `%NAME%` with its value. Unset names and lone `%` are kept.
fn expand_percent_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let body = &rest[start + 1..];
        let value = body
            .find('%')
            .filter(|&end| end > 0)
            .and_then(|end| lookup(&body[..end]).map(|value| (value, end)));

        match value {
            Some((value, end)) => {
                out.push_str(&value);
                rest = &body[end + 1..];
            }
            None => {
                out.push('%');
                rest = body;
            }
        }
    }

    out.push_str(rest);
    out
}
