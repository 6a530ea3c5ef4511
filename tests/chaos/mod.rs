//! Chaos tests for fileinfo
//!
//! Trees that change underneath a running snapshot, files that cannot be read
//! and sinks that fail. Whatever happens, a run must either finish with a
//! structurally valid manifest or fail with an error; it must never hang or
//! panic.

use crate::support::PinnedAtime;
use ::fileinfo::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tracing::info;

/// Randomly creates and deletes files under a root until stopped
pub struct ChaosEngine {
    rng: StdRng,
    root: PathBuf,
}

impl ChaosEngine {
    pub fn new(seed: u64, root: &Path) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), root: root.to_path_buf() }
    }

    /// One random mutation; failures are expected while racing the snapshot
    pub fn mutate(&mut self) {
        let name = format!("churn{:03}", self.rng.random_range(0..200));
        let path = self.root.join(name);
        if self.rng.random_bool(0.5) {
            let _ = fs::write(&path, vec![0u8; self.rng.random_range(0..50_000)]);
        } else {
            let _ = fs::remove_file(&path);
        }
    }
}

fn assert_well_formed(manifest: &[u8]) -> usize {
    let reader = ManifestReader::new(manifest).unwrap();
    let mut entries = 0;
    for entry in reader {
        entry.unwrap();
        entries += 1;
    }
    entries
}

/// Writer that fails after a byte budget is used up
struct FailingWriter {
    budget: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.budget {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.budget -= buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn populate(root: &Path, files: usize) {
    fs::create_dir_all(root.join("stable")).unwrap();
    for i in 0..files {
        fs::write(root.join("stable").join(format!("s{:04}", i)), vec![1u8; 4096]).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_tree_changing_during_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path(), 300);

        let stop = Arc::new(AtomicBool::new(false));
        let churn = {
            let stop = Arc::clone(&stop);
            let mut engine = ChaosEngine::new(42, temp_dir.path());
            thread::spawn(move || {
                let mut mutations = 0;
                while !stop.load(Ordering::Relaxed) {
                    engine.mutate();
                    mutations += 1;
                }
                mutations
            })
        };

        for workers in [1, 4, 8] {
            let snapshotter = SnapshotBuilder::new().parallelism(workers).build().unwrap();
            let mut out = Vec::new();
            let summary = snapshotter
                .snapshot(&[temp_dir.path().to_path_buf()], &mut out, io::sink())
                .unwrap();

            let entries = assert_well_formed(&out);
            assert_eq!(
                entries,
                summary.directory_markers + summary.directories + summary.files
            );
            assert!(summary.directories >= 1);
            assert!(summary.files >= 300, "stable files must always be present");
        }

        stop.store(true, Ordering::Relaxed);
        let mutations = churn.join().unwrap();
        info!("Survived {} concurrent mutations", mutations);
    }

    #[test]
    #[traced_test]
    fn test_files_vanishing_before_hashing() {
        /// Stats normally, then deletes regular files so hashing must fail
        struct Vanishing;

        impl StatProvider for Vanishing {
            fn lstat(&self, path: &Path) -> io::Result<FileStat> {
                let stat = PinnedAtime.lstat(path)?;
                if stat.is_regular() && path.to_string_lossy().ends_with("7") {
                    fs::remove_file(path)?;
                }
                Ok(stat)
            }
        }

        let temp_dir = TempDir::new().unwrap();
        for workers in [1, 3] {
            for i in 0..50 {
                fs::write(temp_dir.path().join(format!("f{:02}", i)), "x").unwrap();
            }
            let snapshotter = SnapshotBuilder::new()
                .parallelism(workers)
                .stat_provider(Vanishing)
                .build()
                .unwrap();
            let mut out = Vec::new();
            let mut err = Vec::new();
            let summary = snapshotter
                .snapshot(&[temp_dir.path().to_path_buf()], &mut out, &mut err)
                .unwrap();

            // f07, f17, f27, f37, f47
            assert_eq!(summary.hashing_errors, 5);
            let err = String::from_utf8(err).unwrap();
            assert_eq!(err.lines().count(), 5);
            assert!(err.lines().all(|l| l.contains("[ENOENT]")));
            assert_eq!(assert_well_formed(&out), 51);
        }
    }

    #[test]
    fn test_sink_failure_mid_run() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path(), 500);

        for workers in [1, 2, 6] {
            for budget in [0, 100, 5_000] {
                let snapshotter = SnapshotBuilder::new().parallelism(workers).build().unwrap();
                let result = snapshotter.snapshot(
                    &[temp_dir.path().to_path_buf()],
                    FailingWriter { budget },
                    io::sink(),
                );
                assert!(
                    matches!(result, Err(FileinfoError::Io(_))),
                    "workers {} budget {}: {:?}",
                    workers,
                    budget,
                    result.map(|s| s.files)
                );
            }
        }
    }

    #[test]
    fn test_tiny_queue_and_block_size() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path(), 120);

        let reference = crate::support::snapshot(temp_dir.path(), 1).0;
        let snapshotter = SnapshotBuilder::new()
            .parallelism(7)
            .queue_depth_per_worker(1)
            .block_size(3)
            .stat_provider(PinnedAtime)
            .build()
            .unwrap();
        let mut out = Vec::new();
        snapshotter
            .snapshot(&[temp_dir.path().to_path_buf()], &mut out, io::sink())
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), reference);
    }
}
