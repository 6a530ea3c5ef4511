//! Snapshot orchestration
//!
//! [`Snapshotter`] ties the pieces together: it writes the header, runs the
//! [`Dispatcher`] against the sink chosen by its [`ExecutionMode`], and
//! collects a [`SnapshotSummary`]. The execution mode is fixed once, when the
//! [`SnapshotBuilder`] is built; nothing about it is process-wide state.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fileinfo::SnapshotBuilder;
//! use std::path::PathBuf;
//!
//! # fn main() -> fileinfo::Result<()> {
//! let snapshotter = SnapshotBuilder::new().parallelism(4).build()?;
//! let summary = snapshotter.snapshot(
//!     &[PathBuf::from("/srv/backup")],
//!     std::io::stdout(),
//!     std::io::stderr(),
//! )?;
//! eprintln!("{} files in {:?}", summary.files, summary.duration);
//! # Ok(())
//! # }
//! ```

use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::{FileinfoError, Result};
use crate::fs::{
    default_classifier, nanosecond_times_available, FsClassifier, LocalStat, LocalTraversal,
    StatProvider, Traversal,
};
use crate::pipeline::{DirectSink, ParallelSink};
use crate::serializer::{ManifestWriter, WriterReport};
use crate::types::{ProgressInfo, SnapshotConfig, SnapshotSummary};
use crate::utils::normalize_path;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How hashing is scheduled, chosen once per [`Snapshotter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Hash on the dispatching thread and write immediately
    Direct,
    /// Hash on a pool of worker threads, reorder in a serializer thread
    Parallel {
        /// Number of hashing workers
        workers: usize,
    },
}

impl ExecutionMode {
    /// Mode for a parallelism setting (must be at least 1)
    pub fn for_parallelism(parallelism: usize) -> Self {
        if parallelism <= 1 {
            ExecutionMode::Direct
        } else {
            ExecutionMode::Parallel { workers: parallelism }
        }
    }
}

/// Size of the trees about to be snapshotted, for progress display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Survey {
    /// Directories that can be listed, roots included
    pub listed: usize,
    /// Subdirectory entries found in them
    pub directories: usize,
    /// File entries found in them
    pub files: usize,
}

impl Survey {
    /// Progress updates a snapshot of the surveyed trees will send
    pub fn total(&self) -> usize {
        self.listed + self.directories + self.files
    }
}

/// Builder for a [`Snapshotter`]
///
/// # Default Values
///
/// - `parallelism`: number of CPU cores
/// - `queue_depth_per_worker`: 4
/// - `block_size`: 8192
/// - `nanosecond_times`: probed from the platform
/// - `stat_provider` / `traversal`: the local file system
/// - `fs_classifier`: the platform's FAT detection
pub struct SnapshotBuilder {
    parallelism: usize,
    queue_depth_per_worker: usize,
    block_size: usize,
    nanosecond_times: Option<bool>,
    stat_provider: Option<Box<dyn StatProvider>>,
    traversal: Option<Box<dyn Traversal>>,
    fs_classifier: Option<Box<dyn FsClassifier>>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        let defaults = SnapshotConfig::default();
        Self {
            parallelism: defaults.parallelism,
            queue_depth_per_worker: defaults.queue_depth_per_worker,
            block_size: defaults.default_block_size,
            nanosecond_times: None,
            stat_provider: None,
            traversal: None,
            fs_classifier: None,
        }
    }

    /// Set the number of hashing workers
    ///
    /// 1 selects direct mode. 0 is rejected by [`build`](Self::build).
    pub fn parallelism(mut self, count: usize) -> Self {
        self.parallelism = count;
        self
    }

    /// Set how many hashing jobs may be queued per worker
    pub fn queue_depth_per_worker(mut self, depth: usize) -> Self {
        self.queue_depth_per_worker = depth;
        self
    }

    /// Set the read chunk size used when a file reports no block size
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Override whether the header advertises nanosecond timestamps
    pub fn nanosecond_times(mut self, enabled: bool) -> Self {
        self.nanosecond_times = Some(enabled);
        self
    }

    /// Replace the stat provider
    pub fn stat_provider(mut self, provider: impl StatProvider + 'static) -> Self {
        self.stat_provider = Some(Box::new(provider));
        self
    }

    /// Replace the directory lister
    pub fn traversal(mut self, traversal: impl Traversal + 'static) -> Self {
        self.traversal = Some(Box::new(traversal));
        self
    }

    /// Replace the FAT classifier; any `Fn(&Path) -> bool` works
    pub fn fs_classifier(mut self, classifier: impl FsClassifier + 'static) -> Self {
        self.fs_classifier = Some(Box::new(classifier));
        self
    }

    /// Validate the settings and fix the execution mode
    ///
    /// # Errors
    ///
    /// [`FileinfoError::InvalidConfiguration`] if parallelism, queue depth or
    /// block size is zero.
    pub fn build(self) -> Result<Snapshotter> {
        if self.parallelism == 0 {
            return Err(FileinfoError::invalid_configuration(
                "parallelism must be at least 1",
            ));
        }
        if self.queue_depth_per_worker == 0 {
            return Err(FileinfoError::invalid_configuration(
                "queue depth per worker must be at least 1",
            ));
        }
        if self.block_size == 0 {
            return Err(FileinfoError::invalid_configuration("block size must be at least 1"));
        }

        let config = SnapshotConfig {
            parallelism: self.parallelism,
            queue_depth_per_worker: self.queue_depth_per_worker,
            default_block_size: self.block_size,
            nanosecond_times: self.nanosecond_times.unwrap_or_else(nanosecond_times_available),
        };
        let mode = ExecutionMode::for_parallelism(config.parallelism);
        debug!(
            "Snapshot configuration: {} ({:?})",
            serde_json::to_string(&config)?,
            mode
        );

        Ok(Snapshotter {
            config,
            mode,
            stat: self.stat_provider.unwrap_or_else(|| Box::new(LocalStat)),
            traversal: self.traversal.unwrap_or_else(|| Box::new(LocalTraversal)),
            classifier: self.fs_classifier.unwrap_or_else(default_classifier),
        })
    }
}

/// Produces manifests
pub struct Snapshotter {
    config: SnapshotConfig,
    mode: ExecutionMode,
    stat: Box<dyn StatProvider>,
    traversal: Box<dyn Traversal>,
    classifier: Box<dyn FsClassifier>,
}

impl Snapshotter {
    /// Snapshotter with default settings
    pub fn new() -> Result<Self> {
        SnapshotBuilder::new().build()
    }

    /// Create a builder
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Effective configuration
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Execution mode fixed at build time
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Write a manifest of `roots` to `out`, diagnostics to `diagnostics`
    pub fn snapshot<W, E>(&self, roots: &[PathBuf], out: W, diagnostics: E) -> Result<SnapshotSummary>
    where
        W: Write + Send,
        E: Write + Send,
    {
        self.snapshot_with_progress::<W, E, fn(ProgressInfo)>(roots, out, diagnostics, None)
    }

    /// [`snapshot`](Self::snapshot) with a progress callback
    ///
    /// The callback runs on the calling thread once per directory.
    pub fn snapshot_with_progress<W, E, F>(
        &self,
        roots: &[PathBuf],
        out: W,
        diagnostics: E,
        progress_callback: Option<F>,
    ) -> Result<SnapshotSummary>
    where
        W: Write + Send,
        E: Write + Send,
        F: Fn(ProgressInfo),
    {
        let start = Instant::now();
        info!("Taking snapshot of {} root(s) ({:?})", roots.len(), self.mode);

        let mut writer = ManifestWriter::new(out, diagnostics);
        writer.write_header(self.config.nanosecond_times)?;

        let mut dispatcher =
            Dispatcher::new(self.stat.as_ref(), self.traversal.as_ref(), self.classifier.as_ref());

        let (stats, report) = match self.mode {
            ExecutionMode::Direct => {
                let mut sink = DirectSink::new(writer, self.config.default_block_size);
                let stats = dispatcher.run(roots, &mut sink, progress_callback)?;
                (stats, sink.finish()?)
            }
            ExecutionMode::Parallel { workers } => thread::scope(|scope| {
                let mut sink = ParallelSink::start(
                    scope,
                    writer,
                    workers,
                    workers * self.config.queue_depth_per_worker,
                    self.config.default_block_size,
                )?;
                let dispatched = dispatcher.run(roots, &mut sink, progress_callback);
                let finished = sink.finish();
                merge_outcomes(dispatched, finished)
            })?,
        };

        let summary = SnapshotSummary {
            directory_markers: stats.directory_markers,
            directories: stats.directories,
            files: stats.files,
            cached_references: stats.cached_references,
            stat_errors: stats.stat_errors,
            unreadable_directories: stats.unreadable_directories,
            hashing_errors: report.hashing_errors,
            bytes_hashed: stats.bytes_hashed,
            bytes_written: report.bytes_written,
            duration: start.elapsed(),
        };

        if summary.stat_errors > 0 || summary.unreadable_directories > 0 {
            warn!(
                "Skipped {} entries and {} directories that could not be read",
                summary.stat_errors, summary.unreadable_directories
            );
        }
        info!(
            "Snapshot complete: {} directories, {} files in {:?}",
            summary.directories, summary.files, summary.duration
        );
        Ok(summary)
    }

    /// Count directories and entries without writing anything
    ///
    /// Follows the same descent rules as a snapshot, so the totals match what
    /// a snapshot taken right now would report.
    pub fn survey(&self, roots: &[PathBuf]) -> Survey {
        let mut survey = Survey::default();
        for root in roots {
            let mut pending = vec![normalize_path(root)];
            while let Some(dir) = pending.pop() {
                let listing = match self.traversal.list(&dir) {
                    Ok(listing) => listing,
                    Err(_) => continue,
                };
                survey.listed += 1;
                survey.directories += listing.subdirs.len();
                survey.files += listing.files.len();
                for name in listing.subdirs {
                    let path = normalize_path(&dir.join(name));
                    if self.stat.lstat(&path).map(|s| s.is_directory()).unwrap_or(false) {
                        pending.push(path);
                    }
                }
            }
        }
        survey
    }
}

/// A sink failure usually explains a dispatcher failure, so it wins
fn merge_outcomes(
    dispatched: Result<DispatchStats>,
    finished: Result<WriterReport>,
) -> Result<(DispatchStats, WriterReport)> {
    match (dispatched, finished) {
        (Ok(stats), Ok(report)) => Ok((stats, report)),
        (_, Err(e)) => Err(e),
        (Err(e), Ok(_)) => Err(e),
    }
}
