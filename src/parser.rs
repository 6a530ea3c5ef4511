//! Structural reader for manifests
//!
//! [`ManifestReader`] checks the header when it is created and then hands out
//! one [`ManifestEntry`] per directory line or terminal line. Field lines are
//! collected, in order and undecoded, onto the record they precede. Turning
//! field text back into typed metadata is left to callers.
//!
//! ```text
//! START --header ok--> BODY --'!' / ':'--> BODY (directory seen)
//!   |                    |                   |--field line--> collect
//!   |                    |                   |--'>' / '@'---> emit record
//!   |                    |--field / '>' / '@' before any directory--> NoStartDirectory
//!   |--bad magic--> NotFileInfo       any other marker --> SyntaxError
//!   |--bad version--> BadVersion      end of input --> None
//! ```
//!
//! ## Example
//!
//! ```rust
//! use fileinfo::parser::{ManifestEntry, ManifestReader};
//!
//! let manifest = "%fileinfo 0.3+n\n!.\nm100644\ni12\n>hello.c\n";
//! let mut reader = ManifestReader::new(manifest.as_bytes())?;
//! assert!(reader.nanosecond_times());
//!
//! assert!(matches!(reader.next_entry()?, Some(ManifestEntry::Directory { .. })));
//! match reader.next_entry()? {
//!     Some(ManifestEntry::Record(record)) => assert_eq!(record.fields.len(), 2),
//!     other => panic!("unexpected {:?}", other),
//! }
//! assert!(reader.next_entry()?.is_none());
//! # Ok::<(), fileinfo::FileinfoError>(())
//! ```

use crate::error::{FileinfoError, FormatError, Result};
use crate::escape::unescape_filename;
use crate::format::{
    FieldTag, CACHED_MARKER, FAT_DIRECTORY_MARKER, HEADER_MARKER, MAGIC, NANOSECOND_SUFFIX,
    RECORD_MARKER, UNIX_DIRECTORY_MARKER, VERSION,
};
use crate::types::FsClass;
use std::ffi::OsString;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::trace;

/// One undecoded field line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    /// Which field the line carries
    pub tag: FieldTag,
    /// Text after the marker
    pub value: String,
}

/// A terminal line together with the field lines before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Unescaped entry name
    pub name: OsString,
    /// Field lines in file order
    pub fields: Vec<RawField>,
    /// 1-based line number of the terminal line
    pub line: usize,
}

impl RawRecord {
    /// Value of the first field line with `tag`, if present
    pub fn field(&self, tag: FieldTag) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.tag == tag)
            .map(|field| field.value.as_str())
    }
}

/// A structural unit of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    /// Directory line
    Directory {
        /// Unescaped directory path
        path: PathBuf,
        /// File system class from the line marker
        fs_class: FsClass,
        /// 1-based line number
        line: usize,
    },
    /// Full record ending in `>`
    Record(RawRecord),
    /// Cached reference ending in `@`
    CachedReference(RawRecord),
}

/// Reads a manifest back one entry at a time
#[derive(Debug)]
pub struct ManifestReader<R: BufRead> {
    input: R,
    line: usize,
    nanosecond_times: bool,
    seen_directory: bool,
    pending: Vec<RawField>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> ManifestReader<R> {
    /// Read and validate the header line
    ///
    /// # Errors
    ///
    /// - [`FormatError::NotFileInfo`] if the first line is missing or is not
    ///   a `%fileinfo` header
    /// - [`FormatError::BadVersion`] if the version is not supported
    pub fn new(input: R) -> Result<Self> {
        let mut reader = Self {
            input,
            line: 0,
            nanosecond_times: false,
            seen_directory: false,
            pending: Vec::new(),
            buffer: Vec::new(),
            finished: false,
        };

        let header = match reader.read_line()? {
            Some(header) => header,
            None => return Err(FormatError::NotFileInfo.into()),
        };
        let version = header
            .strip_prefix(HEADER_MARKER)
            .and_then(|rest| rest.strip_prefix(MAGIC))
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or(FormatError::NotFileInfo)?;

        let (version, nanos) = match version.strip_suffix(NANOSECOND_SUFFIX) {
            Some(base) => (base, true),
            None => (version, false),
        };
        if version != VERSION {
            return Err(FormatError::BadVersion(version.to_string()).into());
        }
        reader.nanosecond_times = nanos;
        trace!("Manifest header ok (nanoseconds: {})", nanos);

        Ok(reader)
    }

    /// Whether the header advertised nanosecond timestamps
    pub fn nanosecond_times(&self) -> bool {
        self.nanosecond_times
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Next directory, record or cached reference; `None` at end of input
    pub fn next_entry(&mut self) -> Result<Option<ManifestEntry>> {
        loop {
            let line = match self.read_line()? {
                Some(line) => line,
                None if self.pending.is_empty() => return Ok(None),
                // fields with no terminal line
                None => return Err(self.syntax_error()),
            };

            let mut chars = line.chars();
            let marker = chars.next().ok_or_else(|| self.syntax_error())?;
            let payload = chars.as_str();

            match marker {
                UNIX_DIRECTORY_MARKER | FAT_DIRECTORY_MARKER => {
                    if !self.pending.is_empty() {
                        return Err(self.syntax_error());
                    }
                    let path = self.unescape(payload)?;
                    self.seen_directory = true;
                    let fs_class = if marker == FAT_DIRECTORY_MARKER {
                        FsClass::Fat
                    } else {
                        FsClass::Unix
                    };
                    return Ok(Some(ManifestEntry::Directory {
                        path: PathBuf::from(path),
                        fs_class,
                        line: self.line,
                    }));
                }
                RECORD_MARKER | CACHED_MARKER => {
                    self.require_directory()?;
                    let record = RawRecord {
                        name: self.unescape(payload)?,
                        fields: std::mem::take(&mut self.pending),
                        line: self.line,
                    };
                    return Ok(Some(if marker == RECORD_MARKER {
                        ManifestEntry::Record(record)
                    } else {
                        ManifestEntry::CachedReference(record)
                    }));
                }
                other => {
                    let tag = FieldTag::from_marker(other).ok_or_else(|| self.syntax_error())?;
                    self.require_directory()?;
                    self.pending.push(RawField {
                        tag,
                        value: payload.to_string(),
                    });
                }
            }
        }
    }

    /// Read one line without its newline; `None` at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        if self.input.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
        }
        String::from_utf8(std::mem::take(&mut self.buffer))
            .map(Some)
            .map_err(|_| self.syntax_error())
    }

    fn require_directory(&self) -> Result<()> {
        if self.seen_directory {
            Ok(())
        } else {
            Err(FormatError::NoStartDirectory { line: self.line }.into())
        }
    }

    fn unescape(&self, escaped: &str) -> Result<OsString> {
        unescape_filename(escaped).map_err(|e| {
            trace!("Line {}: {}", self.line, e);
            self.syntax_error()
        })
    }

    fn syntax_error(&self) -> FileinfoError {
        FormatError::SyntaxError { line: self.line }.into()
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = Result<ManifestEntry>;

    /// Stops for good after the first error
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
