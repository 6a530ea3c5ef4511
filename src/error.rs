//! Error types for the fileinfo library
//!
//! Three families of errors exist, and they travel very differently:
//!
//! - [`FileinfoError`] is the top-level error returned by snapshot and read
//!   operations. It aborts whatever operation produced it.
//! - [`FormatError`] describes a structurally broken manifest. It is fatal to
//!   the read path and surfaced to the caller as soon as it is detected.
//! - [`HashingError`] is attached to a single record when its content could not
//!   be hashed. It never aborts a snapshot; it only produces a diagnostic line
//!   on the error channel.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the fileinfo library
pub type Result<T> = std::result::Result<T, FileinfoError>;

/// Main error type for all fileinfo operations
#[derive(Debug, Error)]
pub enum FileinfoError {
    /// I/O errors while writing the manifest or reading it back
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed manifest
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Errors while listing a directory
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Errors during JSON serialization of reports
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A directory could not be listed
    #[error("Cannot read directory: {path:?}")]
    UnreadableDirectory {
        /// Directory that failed to list
        path: PathBuf,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A pipeline queue was closed before the run finished
    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    /// Worker or serializer thread failure
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FileinfoError {
    /// Create an invalid configuration error with a custom message
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        FileinfoError::InvalidConfiguration(msg.into())
    }

    /// Create a thread pool error with a custom message
    pub fn thread_pool(msg: impl Into<String>) -> Self {
        FileinfoError::ThreadPool(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        FileinfoError::Internal(msg.into())
    }

    /// Check if this error came from a malformed manifest
    pub fn is_format_error(&self) -> bool {
        matches!(self, FileinfoError::Format(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            FileinfoError::Format(FormatError::NotFileInfo) => {
                "Input is not a fileinfo manifest (missing '%fileinfo' header).".to_string()
            }
            FileinfoError::Format(FormatError::BadVersion(found)) => {
                format!(
                    "Manifest version '{}' is not supported. Upgrade fileinfo to read it.",
                    found
                )
            }
            FileinfoError::InvalidConfiguration(msg) => {
                format!("{}. Check the command-line options.", msg)
            }
            _ => self.to_string(),
        }
    }
}

/// Structural errors found while reading a manifest back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The first line is not a `%fileinfo` header
    #[error("not a fileinfo manifest")]
    NotFileInfo,

    /// The header names a version this reader does not understand
    #[error("unsupported manifest version '{0}'")]
    BadVersion(String),

    /// A file line appeared before any directory line
    #[error("line {line}: file information before the first directory")]
    NoStartDirectory {
        /// 1-based line number of the offending line
        line: usize,
    },

    /// A line with an unknown marker or an undecodable payload
    #[error("line {line}: syntax error")]
    SyntaxError {
        /// 1-based line number of the offending line
        line: usize,
    },
}

/// Failure to compute a content hash for one record
///
/// Stored on the record itself; the pipeline never retries and never aborts
/// because of it. Displays as `[<errno name>] <system message>`, the form the
/// diagnostic line carries after the file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashingError {
    /// The file could not be opened for reading
    #[error("[EACCES] {0}")]
    PermissionDenied(String),

    /// The file disappeared between stat and open
    #[error("[ENOENT] {0}")]
    NotFound(String),

    /// Any other read failure, already tagged with its errno name if known
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for HashingError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let message = system_message(&err);
        let tag = err.raw_os_error().and_then(errno_name);
        match (err.kind(), tag) {
            (ErrorKind::PermissionDenied, None | Some("EACCES")) => {
                HashingError::PermissionDenied(message)
            }
            (ErrorKind::NotFound, None | Some("ENOENT")) => HashingError::NotFound(message),
            (_, Some(tag)) => HashingError::Io(format!("[{}] {}", tag, message)),
            (_, None) => HashingError::Io(message),
        }
    }
}

/// The error text without the " (os error N)" suffix std appends
fn system_message(err: &std::io::Error) -> String {
    let text = err.to_string();
    match text.rfind(" (os error ") {
        Some(at) => text[..at].to_string(),
        None => text,
    }
}

/// Symbolic name of the errno values a read can fail with
#[cfg(unix)]
fn errno_name(code: i32) -> Option<&'static str> {
    let name = match code {
        libc::EACCES => "EACCES",
        libc::EPERM => "EPERM",
        libc::ENOENT => "ENOENT",
        libc::EIO => "EIO",
        libc::ENXIO => "ENXIO",
        libc::EISDIR => "EISDIR",
        libc::ENOTDIR => "ENOTDIR",
        libc::EINVAL => "EINVAL",
        libc::ELOOP => "ELOOP",
        libc::EMFILE => "EMFILE",
        libc::ENFILE => "ENFILE",
        libc::ENOMEM => "ENOMEM",
        libc::ETXTBSY => "ETXTBSY",
        libc::EAGAIN => "EAGAIN",
        libc::EINTR => "EINTR",
        libc::ESTALE => "ESTALE",
        _ => return None,
    };
    Some(name)
}

#[cfg(not(unix))]
fn errno_name(_code: i32) -> Option<&'static str> {
    None
}

/// Malformed escape sequence in an escaped name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
    /// A backslash not followed by `x`, `u` or `U`
    #[error("unknown escape at offset {offset}")]
    UnknownEscape {
        /// Byte offset of the backslash
        offset: usize,
    },

    /// Too few or non-hexadecimal digits after the escape letter
    #[error("bad hex digits at offset {offset}")]
    BadDigits {
        /// Byte offset of the backslash
        offset: usize,
    },

    /// The escaped value is not a representable code point
    #[error("invalid code point {value:#x} at offset {offset}")]
    InvalidCodePoint {
        /// Byte offset of the backslash
        offset: usize,
        /// Decoded value
        value: u32,
    },
}
