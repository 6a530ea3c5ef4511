//! Set of inodes already written in full during this run
//!
//! Hard links share an inode, so once one of them has been described the
//! others only need the inode number and their name. The cache lives for one
//! run, never evicts, and is owned by the dispatcher alone.

use crate::collections::HashSet;

/// Inodes whose full metadata has been emitted
#[derive(Debug, Default)]
pub struct InodeCache {
    seen: HashSet<u64>,
}

impl InodeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the inode was already emitted
    pub fn contains(&self, ino: u64) -> bool {
        self.seen.contains(&ino)
    }

    /// Record an emitted inode; returns `false` if it was already present
    pub fn insert(&mut self, ino: u64) -> bool {
        self.seen.insert(ino)
    }

    /// Number of distinct inodes seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
