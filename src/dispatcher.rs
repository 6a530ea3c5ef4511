//! Traversal, classification and ordering
//!
//! The [`Dispatcher`] is the single producer of the pipeline. It walks each
//! root depth-first (a directory's own entries first, then its subdirectories
//! in sorted order), assigns every item a sequence number and classifies it:
//!
//! - a directory about to be listed → [`DirectoryMarker`]
//! - an entry whose inode was already described → [`CachedReference`]
//! - a regular file → hashing candidate
//! - anything else (directories, symlinks, devices, ...) → plain record
//!
//! Names are sorted here by code point, not by the traversal provider, so the
//! output order never depends on what the file system happens to return.
//! Undecodable bytes sort as their surrogate escapes. Sequence numbers
//! are handed out only for items that are actually submitted, which keeps
//! them gapless even when an entry cannot be stat'ed.

use crate::error::Result;
use crate::escape::code_point_key;
use crate::fs::{FsClassifier, StatProvider, Traversal};
use crate::inode_cache::InodeCache;
use crate::pipeline::RecordSink;
use crate::types::{CachedReference, DirectoryMarker, FileRecord, ProgressInfo};
use crate::utils::normalize_path;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Counters collected while dispatching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Directory markers submitted, roots included
    pub directory_markers: usize,
    /// Subdirectory entries submitted (including links to directories)
    pub directories: usize,
    /// File entries submitted
    pub files: usize,
    /// Entries submitted as cached references
    pub cached_references: usize,
    /// Entries skipped because their stat failed
    pub stat_errors: usize,
    /// Directories skipped because they could not be listed
    pub unreadable_directories: usize,
    /// Total size of regular files sent for hashing
    pub bytes_hashed: u64,
}

/// Walks the roots and feeds a [`RecordSink`]
pub struct Dispatcher<'a> {
    stat: &'a dyn StatProvider,
    traversal: &'a dyn Traversal,
    classifier: &'a dyn FsClassifier,
    cache: InodeCache,
    next_seq: u64,
    stats: DispatchStats,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher with an empty inode cache
    pub fn new(
        stat: &'a dyn StatProvider,
        traversal: &'a dyn Traversal,
        classifier: &'a dyn FsClassifier,
    ) -> Self {
        Self {
            stat,
            traversal,
            classifier,
            cache: InodeCache::new(),
            next_seq: 0,
            stats: DispatchStats::default(),
        }
    }

    /// Walk every root in order, submitting everything to `sink`
    ///
    /// Only sink failures abort the walk; unreadable directories and entries
    /// that cannot be stat'ed are logged and skipped.
    pub fn run<S, F>(
        &mut self,
        roots: &[PathBuf],
        sink: &mut S,
        progress_callback: Option<F>,
    ) -> Result<DispatchStats>
    where
        S: RecordSink + ?Sized,
        F: Fn(ProgressInfo),
    {
        for root in roots {
            let mut pending = vec![normalize_path(root)];

            while let Some(dir) = pending.pop() {
                let children = self.dispatch_directory(&dir, sink, progress_callback.as_ref())?;
                // reversed so the smallest name is popped first
                pending.extend(children.into_iter().rev());
            }
        }

        debug!(
            "Dispatched {} items ({} directories, {} cached, {} stat errors)",
            self.next_seq,
            self.stats.directory_markers,
            self.stats.cached_references,
            self.stats.stat_errors
        );
        Ok(self.stats)
    }

    /// Items submitted so far
    pub fn dispatched(&self) -> u64 {
        self.next_seq
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Submit one directory and its entries; returns the subdirectories to
    /// descend into, in sorted order
    fn dispatch_directory<S, F>(
        &mut self,
        dir: &Path,
        sink: &mut S,
        progress_callback: Option<&F>,
    ) -> Result<Vec<PathBuf>>
    where
        S: RecordSink + ?Sized,
        F: Fn(ProgressInfo),
    {
        let listing = match self.traversal.list(dir) {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Skipping unreadable directory {:?}: {}", dir, e);
                self.stats.unreadable_directories += 1;
                return Ok(Vec::new());
            }
        };

        let marker = DirectoryMarker {
            path: dir.to_path_buf(),
            fs_class: self.classifier.classify(dir),
        };
        trace!("Entering {:?} ({:?})", dir, marker.fs_class);
        let seq = self.next_sequence();
        sink.submit_directory(seq, marker)?;
        self.stats.directory_markers += 1;
        self.report(progress_callback, dir);

        let mut subdirs = listing.subdirs;
        let mut files = listing.files;
        subdirs.sort_by_cached_key(|name| code_point_key(name));
        files.sort_by_cached_key(|name| code_point_key(name));

        let mut descend = Vec::new();
        for name in subdirs {
            let path = normalize_path(&dir.join(&name));
            if self.dispatch_entry(name, &path, true, sink)? {
                descend.push(path.clone());
            }
            self.report(progress_callback, &path);
        }
        for name in files {
            let path = normalize_path(&dir.join(&name));
            self.dispatch_entry(name, &path, false, sink)?;
            self.report(progress_callback, &path);
        }

        Ok(descend)
    }

    fn report<F: Fn(ProgressInfo)>(&self, progress_callback: Option<&F>, current: &Path) {
        if let Some(callback) = progress_callback {
            callback(ProgressInfo {
                operation: "Scanning".to_string(),
                current_item: Some(current.display().to_string()),
                directories: self.stats.directory_markers,
                processed: self.stats.directories + self.stats.files,
                bytes_processed: self.stats.bytes_hashed,
            });
        }
    }

    /// Classify and submit one entry; returns whether it is a real directory
    ///
    /// `from_subdirs` says which list of the listing the name came from and
    /// decides whether it counts as a directory or a file.
    fn dispatch_entry<S>(
        &mut self,
        name: OsString,
        path: &Path,
        from_subdirs: bool,
        sink: &mut S,
    ) -> Result<bool>
    where
        S: RecordSink + ?Sized,
    {
        let stat = match self.stat.lstat(path) {
            Ok(stat) => stat,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                self.stats.stat_errors += 1;
                return Ok(false);
            }
        };

        let seq = self.next_sequence();
        if from_subdirs {
            self.stats.directories += 1;
        } else {
            self.stats.files += 1;
        }

        if self.cache.contains(stat.ino) {
            self.stats.cached_references += 1;
            sink.submit_cached_reference(seq, CachedReference { name, stat })?;
            return Ok(false);
        }

        let is_directory = stat.is_directory();
        let record = FileRecord::new(name, path.to_path_buf(), stat);
        if stat.is_regular() {
            self.stats.bytes_hashed += stat.size;
            sink.submit_hash_candidate(seq, record)?;
        } else {
            sink.submit_plain_record(seq, record)?;
        }
        self.cache.insert(stat.ino);

        Ok(is_directory)
    }
}
