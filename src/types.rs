//! Core data types used throughout the fileinfo library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **File system state**: [`FileStat`], [`FileTime`] - what a no-follow stat reports
//! - **Pipeline items**: [`DirectoryMarker`], [`CachedReference`], [`FileRecord`],
//!   wrapped in the closed union [`ManifestItem`] and the [`Sequenced`] envelope
//! - **Reporting**: [`ProgressInfo`], [`SnapshotSummary`]
//! - **Configuration**: [`SnapshotConfig`]

use crate::error::HashingError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;

/// A file timestamp at the best resolution the platform offers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileTime {
    /// Whole seconds since the epoch plus nanoseconds
    Precise {
        /// Seconds since 1970-01-01T00:00:00Z
        secs: i64,
        /// Nanoseconds past `secs`
        nanos: u32,
    },
    /// Floating-point seconds since the epoch (microsecond accuracy at best)
    Approximate(f64),
}

impl FileTime {
    /// Timestamp with native nanosecond resolution
    pub fn precise(secs: i64, nanos: u32) -> Self {
        FileTime::Precise { secs, nanos }
    }
}

impl Default for FileTime {
    fn default() -> Self {
        FileTime::precise(0, 0)
    }
}

/// Metadata returned by a no-follow stat
///
/// `blksize` is only used to size read chunks while hashing and is never
/// written to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FileStat {
    /// File type and permission bits
    pub mode: u32,
    /// Inode number
    pub ino: u64,
    /// Hard link count
    pub nlink: u64,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Size in bytes
    pub size: u64,
    /// Last status change
    pub ctime: FileTime,
    /// Last modification
    pub mtime: FileTime,
    /// Last access
    pub atime: FileTime,
    /// Device id (special files only)
    pub rdev: u64,
    /// BSD-style file flags (0 where unsupported)
    pub flags: u32,
    /// Preferred I/O block size, if the platform reports one
    pub blksize: Option<u64>,
}

impl FileStat {
    /// Whether this is a regular file (the only kind that gets hashed)
    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// Whether this is a real directory (symlinks to directories are not)
    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }
}

/// Kind of file system a directory lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsClass {
    /// Any file system with normal timestamp accuracy
    Unix,
    /// FAT, whose timestamps are only accurate to two seconds
    Fat,
}

/// Announces that the following entries belong to a directory
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryMarker {
    /// Normalized directory path
    pub path: PathBuf,
    /// File system class, fixed when the marker is built
    pub fs_class: FsClass,
}

/// An entry whose inode was already fully described earlier in the run
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReference {
    /// Entry name within its directory
    pub name: OsString,
    /// Stat of this entry; becomes the encoder baseline once written
    pub stat: FileStat,
}

/// Full metadata for one directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Entry name within its directory
    pub name: OsString,
    /// Normalized path used to open the file for hashing
    pub path: PathBuf,
    /// No-follow stat of the entry
    pub stat: FileStat,
    /// Base64 SHA-224 of the content, set only after a successful read
    pub hash: Option<String>,
    /// Why hashing failed, if it did
    pub hash_error: Option<HashingError>,
}

impl FileRecord {
    /// Create a record without hash information
    pub fn new(name: OsString, path: PathBuf, stat: FileStat) -> Self {
        Self {
            name,
            path,
            stat,
            hash: None,
            hash_error: None,
        }
    }
}

/// Everything the serializer knows how to write
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestItem {
    /// Start of a directory
    Directory(DirectoryMarker),
    /// Repeated inode
    Cached(CachedReference),
    /// Fully described entry
    File(FileRecord),
}

/// A pipeline item tagged with its position in traversal order
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced<T> {
    /// Gapless, strictly increasing sequence number assigned by the dispatcher
    pub seq: u64,
    /// The payload
    pub item: T,
}

impl<T> Sequenced<T> {
    /// Wrap an item
    pub fn new(seq: u64, item: T) -> Self {
        Self { seq, item }
    }
}

/// Information passed to progress callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Directories entered so far
    pub directories: usize,
    /// Entries (subdirectories and files) processed so far
    pub processed: usize,
    /// Bytes of regular files queued for hashing so far
    pub bytes_processed: u64,
}

/// Result of a completed snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Directory lines written, roots included
    pub directory_markers: usize,
    /// Subdirectory entries written
    pub directories: usize,
    /// File entries (regular files, links, devices, ...) written
    pub files: usize,
    /// Entries written as cached references
    pub cached_references: usize,
    /// Entries skipped because they could not be stat'ed
    pub stat_errors: usize,
    /// Directories skipped because they could not be listed
    pub unreadable_directories: usize,
    /// Records whose content could not be hashed
    pub hashing_errors: u64,
    /// Total size of regular files sent for hashing
    pub bytes_hashed: u64,
    /// Bytes of manifest output, header included
    pub bytes_written: u64,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl SnapshotSummary {
    /// Directories per second, if the run took measurable time
    pub fn directories_per_second(&self) -> Option<f64> {
        let secs = self.duration.as_secs_f64();
        (secs > 0.0).then(|| self.directories as f64 / secs)
    }

    /// Files per second, if the run took measurable time
    pub fn files_per_second(&self) -> Option<f64> {
        let secs = self.duration.as_secs_f64();
        (secs > 0.0).then(|| self.files as f64 / secs)
    }

    /// Average manifest bytes per file, if any files were written
    pub fn bytes_per_file(&self) -> Option<f64> {
        (self.files > 0).then(|| self.bytes_written as f64 / self.files as f64)
    }
}

/// Configuration of a snapshot run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Number of hashing workers; 1 selects direct mode
    pub parallelism: usize,
    /// Hashing queue slots per worker
    pub queue_depth_per_worker: usize,
    /// Read chunk size when the file system reports no block size
    pub default_block_size: usize,
    /// Whether the header advertises nanosecond timestamps
    pub nanosecond_times: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get().max(1),
            queue_depth_per_worker: 4,
            default_block_size: 8192,
            nanosecond_times: true,
        }
    }
}
