//! Manifest line vocabulary
//!
//! A manifest is line-oriented text. The first character of every line says
//! what the rest of the line holds:
//!
//! ```text
//! %fileinfo 0.3+n        header, "+n" when timestamps carry nanoseconds
//! !some/dir              directory on a Unix-like file system
//! :some/dir              directory on a FAT file system
//! m100644                field lines (see FieldTag)
//! >hello.c               end of a full record
//! @hello-link.c          end of a cached reference (inode already described)
//! ```

/// Magic word in the header line
pub const MAGIC: &str = "fileinfo";

/// Format version written and accepted by this crate
pub const VERSION: &str = "0.3";

/// Header suffix advertising nanosecond timestamp resolution
pub const NANOSECOND_SUFFIX: &str = "+n";

/// Leading character of the header line
pub const HEADER_MARKER: char = '%';

/// Leading character of a Unix directory line
pub const UNIX_DIRECTORY_MARKER: char = '!';

/// Leading character of a FAT directory line
pub const FAT_DIRECTORY_MARKER: char = ':';

/// Leading character of the terminal line of a full record
pub const RECORD_MARKER: char = '>';

/// Leading character of the terminal line of a cached reference
pub const CACHED_MARKER: char = '@';

/// Build the header line (without trailing newline)
pub fn header_line(nanosecond_times: bool) -> String {
    if nanosecond_times {
        format!("{}{} {}{}", HEADER_MARKER, MAGIC, VERSION, NANOSECOND_SUFFIX)
    } else {
        format!("{}{} {}", HEADER_MARKER, MAGIC, VERSION)
    }
}

/// Field lines that may precede a terminal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTag {
    /// `m` - file mode, octal
    Mode,
    /// `i` - inode number
    Inode,
    /// `n` - hard link count
    Links,
    /// `u` - owner uid
    Uid,
    /// `g` - group gid
    Gid,
    /// `s` - size in bytes
    Size,
    /// `C` - status change time
    ChangeTime,
    /// `M` - modification time (only when it differs from `C`)
    ModifyTime,
    /// `A` - access time
    AccessTime,
    /// `r` - device id
    Device,
    /// `f` - file flags
    Flags,
    /// `#` - base64 SHA-224 of the content
    Hash,
}

impl FieldTag {
    /// All tags in the order the encoder writes them
    pub const ALL: [FieldTag; 12] = [
        FieldTag::Mode,
        FieldTag::Inode,
        FieldTag::Links,
        FieldTag::Uid,
        FieldTag::Gid,
        FieldTag::Size,
        FieldTag::ChangeTime,
        FieldTag::ModifyTime,
        FieldTag::AccessTime,
        FieldTag::Device,
        FieldTag::Flags,
        FieldTag::Hash,
    ];

    /// Line marker for this field
    pub fn marker(self) -> char {
        match self {
            FieldTag::Mode => 'm',
            FieldTag::Inode => 'i',
            FieldTag::Links => 'n',
            FieldTag::Uid => 'u',
            FieldTag::Gid => 'g',
            FieldTag::Size => 's',
            FieldTag::ChangeTime => 'C',
            FieldTag::ModifyTime => 'M',
            FieldTag::AccessTime => 'A',
            FieldTag::Device => 'r',
            FieldTag::Flags => 'f',
            FieldTag::Hash => '#',
        }
    }

    /// Look up the field for a line marker
    pub fn from_marker(marker: char) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.marker() == marker)
    }
}
