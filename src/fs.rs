//! File system collaborators of the snapshot pipeline
//!
//! The pipeline never talks to the file system directly except to read file
//! content for hashing. Everything else goes through three small traits so
//! that tests (and unusual platforms) can substitute their own behavior:
//!
//! - [`StatProvider`]: no-follow stat of a path
//! - [`Traversal`]: names of the subdirectories and files of one directory
//! - [`FsClassifier`]: whether a directory lives on a FAT file system
//!
//! The local implementations are [`LocalStat`], [`LocalTraversal`] (backed by
//! `walkdir`) and [`default_classifier`].

use crate::error::{FileinfoError, Result};
use crate::types::{FileStat, FileTime, FsClass};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Stat a path without following a final symlink
pub trait StatProvider: Send + Sync {
    /// Metadata of `path` itself
    fn lstat(&self, path: &Path) -> io::Result<FileStat>;
}

/// Names found in one directory, in whatever order the system returns them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    /// Entries that are directories, or symlinks pointing at directories
    pub subdirs: Vec<OsString>,
    /// Every other entry
    pub files: Vec<OsString>,
}

/// Lists a single directory
pub trait Traversal: Send + Sync {
    /// List the entries of `dir`
    fn list(&self, dir: &Path) -> Result<DirListing>;
}

/// Decides whether a directory is on a FAT file system
pub trait FsClassifier: Send + Sync {
    /// `true` for FAT
    fn is_fat(&self, dir: &Path) -> bool;

    /// Class tag for a directory marker
    fn classify(&self, dir: &Path) -> FsClass {
        if self.is_fat(dir) {
            FsClass::Fat
        } else {
            FsClass::Unix
        }
    }
}

impl<F> FsClassifier for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_fat(&self, dir: &Path) -> bool {
        self(dir)
    }
}

/// `lstat(2)` through `std::fs::symlink_metadata`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStat;

impl StatProvider for LocalStat {
    fn lstat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(stat_from_metadata(&metadata))
    }
}

/// Convert std metadata to a [`FileStat`]
#[cfg(unix)]
pub fn stat_from_metadata(metadata: &fs::Metadata) -> FileStat {
    use std::os::unix::fs::MetadataExt;

    FileStat {
        mode: metadata.mode(),
        ino: metadata.ino(),
        nlink: metadata.nlink(),
        uid: metadata.uid(),
        gid: metadata.gid(),
        size: metadata.size(),
        ctime: FileTime::precise(metadata.ctime(), metadata.ctime_nsec() as u32),
        mtime: FileTime::precise(metadata.mtime(), metadata.mtime_nsec() as u32),
        atime: FileTime::precise(metadata.atime(), metadata.atime_nsec() as u32),
        rdev: metadata.rdev(),
        flags: file_flags(metadata),
        blksize: Some(metadata.blksize()),
    }
}

/// Convert std metadata to a [`FileStat`]
#[cfg(not(unix))]
pub fn stat_from_metadata(metadata: &fs::Metadata) -> FileStat {
    use std::time::{SystemTime, UNIX_EPOCH};

    let to_time = |t: io::Result<SystemTime>| {
        t.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| FileTime::Approximate(d.as_secs_f64()))
            .unwrap_or_default()
    };
    let mode = if metadata.is_dir() {
        0o040755
    } else if metadata.file_type().is_symlink() {
        0o120777
    } else if metadata.permissions().readonly() {
        0o100444
    } else {
        0o100644
    };
    let mtime = to_time(metadata.modified());

    FileStat {
        mode,
        nlink: 1,
        size: metadata.len(),
        ctime: mtime,
        mtime,
        atime: to_time(metadata.accessed()),
        ..Default::default()
    }
}

#[cfg(target_os = "macos")]
fn file_flags(metadata: &fs::Metadata) -> u32 {
    use std::os::macos::fs::MetadataExt;
    metadata.st_flags()
}

#[cfg(target_os = "freebsd")]
fn file_flags(metadata: &fs::Metadata) -> u32 {
    use std::os::freebsd::fs::MetadataExt;
    metadata.st_flags()
}

#[cfg(all(unix, not(any(target_os = "macos", target_os = "freebsd"))))]
fn file_flags(_metadata: &fs::Metadata) -> u32 {
    0
}

/// Whether a converted stat carries whole-nanosecond timestamps
pub fn has_nanosecond_times(stat: &FileStat) -> bool {
    matches!(stat.mtime, FileTime::Precise { .. })
}

/// Whether stat results on this system carry nanosecond timestamps
///
/// Decided from how the current directory's metadata converts, and consulted
/// once per run to choose the header suffix. A zero nanosecond field still
/// counts: resolution belongs to the stat interface, not to one timestamp.
pub fn nanosecond_times_available() -> bool {
    match fs::symlink_metadata(".") {
        Ok(metadata) => has_nanosecond_times(&stat_from_metadata(&metadata)),
        Err(e) => {
            warn!("Cannot stat current directory to probe timestamp resolution: {}", e);
            false
        }
    }
}

/// Directory listing backed by `walkdir`, one level at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTraversal;

impl Traversal for LocalTraversal {
    fn list(&self, dir: &Path) -> Result<DirListing> {
        // a root that is a plain file would otherwise yield an empty listing
        if !fs::metadata(dir)?.is_dir() {
            return Err(FileinfoError::UnreadableDirectory { path: dir.to_path_buf() });
        }

        let mut listing = DirListing::default();
        let walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // the directory itself could not be read
                Err(e) if e.depth() == 0 => return Err(FileinfoError::WalkDir(e)),
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
            };

            let file_type = entry.file_type();
            let is_dir = file_type.is_dir()
                || (file_type.is_symlink()
                    && fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false));
            if is_dir {
                listing.subdirs.push(entry.file_name().to_os_string());
            } else {
                listing.files.push(entry.file_name().to_os_string());
            }
        }

        Ok(listing)
    }
}

/// Never reports FAT
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFat;

impl FsClassifier for NeverFat {
    fn is_fat(&self, _dir: &Path) -> bool {
        false
    }
}

/// Detects FAT directories with the `FAT_IOCTL_GET_ATTRIBUTES` ioctl (Linux)
///
/// The ioctl only succeeds on FAT; other file systems answer `ENOTTY` (or
/// `ENOSYS`, as NTFS-3G does). Any other failure is logged and treated as
/// not FAT.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct FatIoctlClassifier;

#[cfg(target_os = "linux")]
impl FatIoctlClassifier {
    /// `_IOR('r', 0x10, __u32)` from `<linux/msdos_fs.h>`
    const FAT_IOCTL_GET_ATTRIBUTES: u32 = 0x8004_7210;

    /// Probe a path, surfacing unexpected errors
    pub fn probe(&self, dir: &Path) -> io::Result<bool> {
        use std::os::unix::io::AsRawFd;

        let file = fs::File::open(dir)?;
        let mut attributes: u32 = 0;
        // SAFETY: the descriptor is open for the duration of the call and the
        // request writes a single u32 into `attributes`.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                Self::FAT_IOCTL_GET_ATTRIBUTES as _,
                &mut attributes as *mut u32,
            )
        };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ENOTTY) | Some(libc::ENOSYS) => Ok(false),
            _ => Err(err),
        }
    }
}

#[cfg(target_os = "linux")]
impl FsClassifier for FatIoctlClassifier {
    fn is_fat(&self, dir: &Path) -> bool {
        self.probe(dir).unwrap_or_else(|e| {
            warn!("Cannot determine file system type of {:?}: {}", dir, e);
            false
        })
    }
}

/// The best classifier for this platform
pub fn default_classifier() -> Box<dyn FsClassifier> {
    #[cfg(target_os = "linux")]
    {
        Box::new(FatIoctlClassifier)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(NeverFat)
    }
}
