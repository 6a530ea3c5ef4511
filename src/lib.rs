//! # fileinfo - Deterministic file system metadata manifests
//!
//! Produces a compact, line-oriented snapshot of a directory tree's metadata
//! (mode, inode, ownership, size, timestamps and a content hash per regular
//! file) so that two snapshots taken at different times can be diffed. This
//! is useful for checking backups on file systems that do not checksum file
//! contents themselves.
//!
//! ## Overview
//!
//! A manifest looks like this:
//!
//! ```text
//! %fileinfo 0.3+n
//! !.
//! m100644
//! i4196237
//! n1
//! u1000
//! g1000
//! s105
//! C20131003215722.14093
//! A20131003215729.572949
//! #GA0M/SJY26NzYANCbFjjEEnnxb73kfx0Icw+jg==
//! >hello.c
//! i4196240
//! s213
//! C20131003215731.5
//! #oq2Jf4DGGUjW5/V1lWj1+ZcQ2pW07OzRxNRRcg==
//! >world.c
//! ```
//!
//! Fields equal to those of the previously written record are left out, the
//! modification time is only written when it differs from the change time,
//! and a second hard link to an already described inode is written as a
//! two-line cached reference.
//!
//! ## Architecture
//!
//! - **Dispatcher**: walks the trees in sorted depth-first order, numbers
//!   every item and decides what each one is
//! - **Worker pool**: hashes regular files (SHA-224, base64) on N threads
//! - **Serializer**: puts results back into sequence order and writes them
//!   through the delta encoder
//! - **Parser**: reads a manifest back, structurally
//!
//! The output is byte-identical for every worker count: ordering depends only
//! on the sequence numbers the dispatcher hands out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fileinfo::SnapshotBuilder;
//! use std::fs::File;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshotter = SnapshotBuilder::new().build()?;
//! let summary = snapshotter.snapshot(
//!     &[PathBuf::from("/mnt/backup")],
//!     File::create("backup.fileinfo")?,
//!     std::io::stderr(),
//! )?;
//! println!("{} directories, {} files", summary.directories, summary.files);
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a Manifest Back
//!
//! ```rust,no_run
//! use fileinfo::{ManifestEntry, ManifestReader};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = ManifestReader::new(BufReader::new(File::open("backup.fileinfo")?))?;
//! for entry in reader {
//!     if let ManifestEntry::Directory { path, .. } = entry? {
//!         println!("{}", path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Operations return `Result<T, FileinfoError>`. Files that cannot be hashed
//! do not fail a snapshot: the record is written without a hash and a
//! diagnostic line goes to the separate diagnostics writer.
//!
//! ## Module Organization
//!
//! - [`snapshot`]: builder, execution modes and orchestration
//! - [`dispatcher`]: traversal order, inode cache lookups, sequence numbers
//! - [`pipeline`]: direct and threaded record sinks
//! - [`serializer`]: reorder buffer and manifest writer
//! - [`encoder`]: delta encoding of single items
//! - [`parser`]: structural manifest reader
//! - [`fs`]: stat, listing and FAT detection collaborators
//! - [`types`]: Common types and data structures
//! - [`error`]: Error types and handling

// Public API modules
pub mod checksum;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod escape;
pub mod format;
pub mod fs;
pub mod inode_cache;
pub mod parser;
pub mod pipeline;
pub mod serializer;
pub mod snapshot;
pub mod timestamp;
pub mod types;
pub mod utils;

// Internal modules (not part of public API)
mod collections;

// Re-export main types for convenience
pub use error::{EscapeError, FileinfoError, FormatError, HashingError, Result};
pub use format::FieldTag;
pub use fs::{FsClassifier, StatProvider, Traversal};
pub use parser::{ManifestEntry, ManifestReader, RawField, RawRecord};
pub use snapshot::{ExecutionMode, SnapshotBuilder, Snapshotter, Survey};
pub use types::*;
