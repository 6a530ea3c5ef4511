//! Utility functions for fileinfo
//!
//! ## Categories of Utilities
//!
//! ### Path Manipulation
//! - Lexical path normalization (no file system access, symlinks untouched)
//!
//! ### Output
//! - A byte-counting `Write` adapter for the manifest sink
//! - Human-readable byte counts for summaries

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically
///
/// Removes `.` components and redundant separators and folds `name/..`
/// pairs, without touching the file system. Leading `..` components of a
/// relative path are kept; `..` directly under the root is dropped. An empty
/// result becomes `.`.
///
/// # Example
///
/// ```rust
/// use fileinfo::utils::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(normalize_path(Path::new("./a//b/../c")), PathBuf::from("a/c"));
/// assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    let mut rooted = false;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                normalized.push(component.as_os_str());
                rooted = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else if !rooted {
                    normalized.push("..");
                }
            }
            Component::Normal(name) => {
                normalized.push(name);
                depth += 1;
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// `Write` adapter that counts the bytes passed through it
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes accepted by the inner sink so far
    pub fn bytes_written(&self) -> u64 {
        self.count
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Format bytes in both binary and decimal units
///
/// # Example
///
/// ```rust
/// use fileinfo::utils::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KiB / 1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const BINARY: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    const DECIMAL: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    format!(
        "{} / {}",
        scaled(bytes, 1024.0, BINARY),
        scaled(bytes, 1000.0, DECIMAL)
    )
}

fn scaled(bytes: u64, base: f64, units: &[&str]) -> String {
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= base && unit_idx < units.len() - 1 {
        size /= base;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, units[0])
    } else {
        format!("{:.1} {}", size, units[unit_idx])
    }
}
