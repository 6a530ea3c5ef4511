//! Integration tests for fileinfo
//!
//! Takes a snapshot, changes the tree in a controlled way, takes another and
//! checks that exactly the expected field lines moved. This is the use the
//! manifest exists for: diffing two runs over the same tree.

use crate::support::{records, snapshot};
use ::fileinfo::*;
use filetime::{set_file_mtime, FileTime as FsTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Generates reproducible project-like trees
pub struct TreeGenerator {
    rng: StdRng,
}

impl TreeGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Create `dirs` directories holding `files` files in total; returns the
    /// file paths
    pub fn generate(&mut self, root: &Path, dirs: usize, files: usize) -> Vec<PathBuf> {
        let mut directories = vec![root.to_path_buf()];
        for i in 0..dirs {
            let parent = directories[self.rng.random_range(0..directories.len())].clone();
            let dir = parent.join(format!("dir{:03}", i));
            fs::create_dir(&dir).unwrap();
            directories.push(dir);
        }

        let mut paths = Vec::with_capacity(files);
        for i in 0..files {
            let dir = &directories[self.rng.random_range(0..directories.len())];
            let path = dir.join(format!("file{:04}.dat", i));
            let size = self.rng.random_range(0..20_000);
            let content: Vec<u8> = (0..size).map(|_| self.rng.random()).collect();
            fs::write(&path, content).unwrap();
            paths.push(path);
        }
        info!("Generated {} directories and {} files", dirs, files);
        paths
    }
}

fn record<'a>(all: &'a [(String, RawRecord)], name: &str) -> &'a RawRecord {
    &all.iter()
        .find(|(_, r)| r.name.to_string_lossy() == name)
        .unwrap_or_else(|| panic!("no record named {}", name))
        .1
}

#[test]
fn test_unchanged_tree_gives_identical_manifest() {
    let temp_dir = TempDir::new().unwrap();
    TreeGenerator::new(7).generate(temp_dir.path(), 12, 150);

    let (before, _, _) = snapshot(temp_dir.path(), 4);
    let (after, _, _) = snapshot(temp_dir.path(), 1);
    assert_eq!(before, after);
}

#[test]
fn test_content_change_moves_hash() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("a.txt"), "original").unwrap();
    fs::write(root.join("b.txt"), "untouched").unwrap();

    let (before, _, _) = snapshot(root, 2);
    // same length, so only the hash and timestamps may move
    fs::write(root.join("a.txt"), "modified").unwrap();
    let (after, _, _) = snapshot(root, 2);
    assert_ne!(before, after);

    let before = records(&before);
    let after = records(&after);
    let (old, new) = (record(&before, "a.txt"), record(&after, "a.txt"));
    assert_ne!(old.field(FieldTag::Hash), new.field(FieldTag::Hash));
    assert_eq!(new.field(FieldTag::Hash), Some(checksum::hash_data(b"modified").as_str()));
    assert_eq!(old.field(FieldTag::Size), new.field(FieldTag::Size));
    assert_eq!(
        record(&before, "b.txt").field(FieldTag::Hash),
        record(&after, "b.txt").field(FieldTag::Hash)
    );
}

#[test]
fn test_mtime_line_appears_when_mtime_set_back() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("restored.txt"), "from backup").unwrap();

    // a restore tool sets mtime to the original value; ctime stays "now"
    set_file_mtime(root.join("restored.txt"), FsTime::from_unix_time(1_380_837_442, 0)).unwrap();
    let (output, _, _) = snapshot(root, 1);

    let all = records(&output);
    let restored = record(&all, "restored.txt");
    assert_eq!(restored.field(FieldTag::ModifyTime), Some("20131003215722"));
    assert!(restored.field(FieldTag::ChangeTime).is_some());
}

#[test]
fn test_new_and_removed_files_show_up() {
    let temp_dir = TempDir::new().unwrap();
    let paths = TreeGenerator::new(99).generate(temp_dir.path(), 5, 30);

    let (before, _, before_summary) = snapshot(temp_dir.path(), 3);
    fs::remove_file(&paths[3]).unwrap();
    fs::write(temp_dir.path().join("zz-new.txt"), "fresh").unwrap();
    let (after, _, after_summary) = snapshot(temp_dir.path(), 3);

    assert_eq!(before_summary.files, after_summary.files);
    let removed = paths[3].file_name().unwrap().to_string_lossy().into_owned();
    assert!(before.contains(&format!(">{}\n", removed)));
    assert!(!after.contains(&format!(">{}\n", removed)));
    assert!(after.contains(">zz-new.txt\n"));
}

#[test]
fn test_worker_counts_agree_on_generated_trees() {
    for seed in [1, 2, 3] {
        let temp_dir = TempDir::new().unwrap();
        TreeGenerator::new(seed).generate(temp_dir.path(), 20, 300);

        let (reference, _, summary) = snapshot(temp_dir.path(), 1);
        assert_eq!(summary.directories, 20);
        assert_eq!(summary.files, 300);
        for workers in [2, 5, 12] {
            let (output, _, _) = snapshot(temp_dir.path(), workers);
            assert_eq!(output, reference, "seed {} workers {}", seed, workers);
        }
    }
}

#[test]
fn test_manifest_to_file_and_back() {
    let temp_dir = TempDir::new().unwrap();
    let tree = temp_dir.path().join("tree");
    fs::create_dir(&tree).unwrap();
    TreeGenerator::new(5).generate(&tree, 4, 25);

    let manifest_path = temp_dir.path().join("tree.fileinfo");
    let snapshotter = SnapshotBuilder::new().parallelism(2).build().unwrap();
    let summary = snapshotter
        .snapshot(
            &[tree.clone()],
            std::io::BufWriter::new(fs::File::create(&manifest_path).unwrap()),
            std::io::sink(),
        )
        .unwrap();
    assert_eq!(fs::metadata(&manifest_path).unwrap().len(), summary.bytes_written);

    let reader =
        ManifestReader::new(std::io::BufReader::new(fs::File::open(&manifest_path).unwrap()))
            .unwrap();
    let entries: Vec<ManifestEntry> = reader.map(|e| e.unwrap()).collect();
    let directories = entries
        .iter()
        .filter(|e| matches!(e, ManifestEntry::Directory { .. }))
        .count();
    assert_eq!(directories, summary.directory_markers);
    assert_eq!(
        entries.len(),
        summary.directory_markers + summary.directories + summary.files
    );
}
