//! Delta encoding of manifest items
//!
//! Most metadata is identical for long runs of entries (same owner, same mode,
//! same timestamps after an unpack), so a field line is only written when the
//! value differs from the last record actually written, the *baseline*. The
//! encoder is a pure function: the caller owns the baseline and threads it
//! from one call to the next.
//!
//! Field order and rules:
//!
//! | line | written when |
//! |---|---|
//! | `m` `i` `n` `u` `g` `s` | no baseline, or value differs from the baseline |
//! | `C` | no baseline, or formatted ctime differs from the baseline's |
//! | `M` | formatted mtime differs from this record's own ctime |
//! | `A` | no baseline, or formatted atime differs from the baseline's |
//! | `r` `f` | value is nonzero |
//! | `#` | a hash is present |
//! | `>` | always, carrying the escaped name |
//!
//! Cached references skip all of that and write `i<inode>` then `@<name>`.

use crate::escape::{escape_os_str, escape_path};
use crate::format::{
    FieldTag, CACHED_MARKER, FAT_DIRECTORY_MARKER, RECORD_MARKER, UNIX_DIRECTORY_MARKER,
};
use crate::timestamp::format_file_time;
use crate::types::{FileRecord, FileStat, FsClass, ManifestItem};
use std::fmt::Display;

/// Output of one encode call
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// Manifest lines, each terminated by `\n`
    pub text: String,
    /// Line for the error channel, when hashing failed
    pub diagnostic: Option<String>,
    /// Baseline for the next call
    pub baseline: Option<FileStat>,
}

/// Encode one item against the previous baseline
///
/// # Example
///
/// ```rust
/// use fileinfo::encoder::encode;
/// use fileinfo::types::{CachedReference, FileStat, ManifestItem};
///
/// let stat = FileStat { ino: 42, ..Default::default() };
/// let item = ManifestItem::Cached(CachedReference { name: "foo".into(), stat });
/// let encoded = encode(item, None);
/// assert_eq!(encoded.text, "i42\n@foo\n");
/// assert_eq!(encoded.baseline, Some(stat));
/// ```
pub fn encode(item: ManifestItem, baseline: Option<FileStat>) -> Encoded {
    match item {
        ManifestItem::Directory(marker) => {
            let tag = match marker.fs_class {
                FsClass::Unix => UNIX_DIRECTORY_MARKER,
                FsClass::Fat => FAT_DIRECTORY_MARKER,
            };
            Encoded {
                text: format!("{}{}\n", tag, escape_path(&marker.path)),
                diagnostic: None,
                baseline,
            }
        }
        ManifestItem::Cached(cached) => {
            let mut text = String::new();
            push_field(&mut text, FieldTag::Inode, cached.stat.ino);
            push_terminal(&mut text, CACHED_MARKER, &escape_os_str(&cached.name));
            Encoded {
                text,
                diagnostic: None,
                baseline: Some(cached.stat),
            }
        }
        ManifestItem::File(record) => encode_record(record, baseline.as_ref()),
    }
}

fn encode_record(record: FileRecord, baseline: Option<&FileStat>) -> Encoded {
    let diagnostic = record.hash_error.as_ref().map(|err| {
        format!("Error with '{}': {}\n", record.name.to_string_lossy(), err)
    });

    let st = &record.stat;
    let mut text = String::with_capacity(96);

    let changed = |field: fn(&FileStat) -> u64| baseline.map_or(true, |b| field(b) != field(st));
    if changed(|s| s.mode as u64) {
        text.push(FieldTag::Mode.marker());
        text.push_str(&format!("{:o}\n", st.mode));
    }
    if changed(|s| s.ino) {
        push_field(&mut text, FieldTag::Inode, st.ino);
    }
    if changed(|s| s.nlink) {
        push_field(&mut text, FieldTag::Links, st.nlink);
    }
    if changed(|s| s.uid as u64) {
        push_field(&mut text, FieldTag::Uid, st.uid);
    }
    if changed(|s| s.gid as u64) {
        push_field(&mut text, FieldTag::Gid, st.gid);
    }
    if changed(|s| s.size) {
        push_field(&mut text, FieldTag::Size, st.size);
    }

    let ctime = format_file_time(&st.ctime);
    let mtime = format_file_time(&st.mtime);
    let atime = format_file_time(&st.atime);
    if baseline.map_or(true, |b| format_file_time(&b.ctime) != ctime) {
        push_field(&mut text, FieldTag::ChangeTime, &ctime);
    }
    // compared against this record's ctime, not the baseline's mtime
    if mtime != ctime {
        push_field(&mut text, FieldTag::ModifyTime, &mtime);
    }
    if baseline.map_or(true, |b| format_file_time(&b.atime) != atime) {
        push_field(&mut text, FieldTag::AccessTime, &atime);
    }

    if st.rdev != 0 {
        push_field(&mut text, FieldTag::Device, st.rdev);
    }
    if st.flags != 0 {
        push_field(&mut text, FieldTag::Flags, st.flags);
    }
    if let Some(hash) = &record.hash {
        push_field(&mut text, FieldTag::Hash, hash);
    }
    push_terminal(&mut text, RECORD_MARKER, &escape_os_str(&record.name));

    Encoded {
        text,
        diagnostic,
        baseline: Some(record.stat),
    }
}

fn push_field(text: &mut String, tag: FieldTag, value: impl Display) {
    text.push(tag.marker());
    text.push_str(&value.to_string());
    text.push('\n');
}

fn push_terminal(text: &mut String, marker: char, escaped_name: &str) {
    text.push(marker);
    text.push_str(escaped_name);
    text.push('\n');
}
