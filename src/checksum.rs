//! Content hashing for regular files
//!
//! Each regular file gets a SHA-224 digest of its content, base64-encoded.
//! Files are opened with `O_NOATIME` where the platform has it so that taking
//! a snapshot does not itself change the access times it records. Some file
//! systems (FAT among them) refuse that flag with `EPERM`, in which case the
//! open is retried without it.
//!
//! Failures are never fatal: they are stored on the record as a
//! [`HashingError`] and the record is written without a `#` line.

use crate::error::HashingError;
use crate::types::FileRecord;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha224};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, trace};

/// Read chunk size when the stat carries no block size
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Hash a record's content in place
///
/// Sets `record.hash` on success or `record.hash_error` on failure; nothing
/// is retried.
pub fn hash_record(record: &mut FileRecord, default_block_size: usize) {
    let chunk_size = record
        .stat
        .blksize
        .filter(|&b| b > 0)
        .map(|b| b as usize)
        .unwrap_or(default_block_size)
        .max(1);

    match hash_file(&record.path, chunk_size) {
        Ok(hash) => {
            trace!("Hashed {:?}", record.path);
            record.hash = Some(hash);
        }
        Err(e) => {
            debug!("Cannot hash {:?}: {}", record.path, e);
            record.hash_error = Some(HashingError::from(e));
        }
    }
}

/// SHA-224 of a file's content, base64-encoded
pub fn hash_file(path: &Path, chunk_size: usize) -> io::Result<String> {
    let mut file = open_no_atime(path)?;
    let mut hasher = Sha224::new();
    let mut buffer = vec![0u8; chunk_size];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(STANDARD.encode(hasher.finalize()))
}

/// SHA-224 of in-memory data, base64-encoded
pub fn hash_data(data: &[u8]) -> String {
    STANDARD.encode(Sha224::digest(data))
}

#[cfg(target_os = "linux")]
fn open_no_atime(path: &Path) -> io::Result<File> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    match OpenOptions::new().read(true).custom_flags(libc::O_NOATIME).open(path) {
        Err(e) if e.raw_os_error() == Some(libc::EPERM) => File::open(path),
        other => other,
    }
}

#[cfg(not(target_os = "linux"))]
fn open_no_atime(path: &Path) -> io::Result<File> {
    File::open(path)
}
