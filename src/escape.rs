//! Escaping of file names for the line-oriented manifest
//!
//! Names are written one per line, so anything that could break a line or
//! confuse a reader is escaped. Rules are applied per code point, first match
//! wins:
//!
//! 1. backslash and control codes 0-31 become `\xXX`
//! 2. codes 0x7f-0xa0 become `\xXX`
//! 3. anything else below 0x7f is written as-is
//! 4. printable code points are written as-is
//! 5. otherwise `\xXX`, `\uXXXX` or `\UXXXXXXXX` depending on magnitude
//!
//! "Printable" follows the usual definition: every general category except
//! controls, format characters, surrogates, private use, unassigned, and the
//! line/paragraph/space separators.
//!
//! Names that are not valid UTF-8 have each undecodable byte `b` written as
//! the lone surrogate `\udcXX` (U+DC00 + b), which [`unescape_filename`] maps
//! back to the raw byte.

use crate::error::EscapeError;
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::path::Path;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Base of the surrogate range used for undecodable bytes
const SURROGATE_ESCAPE_BASE: u32 = 0xdc00;

/// Escape a UTF-8 name
pub fn escape_filename(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        push_escaped_char(&mut escaped, c);
    }
    escaped
}

/// Escape a name straight from the file system
#[cfg(unix)]
pub fn escape_os_str(name: &OsStr) -> String {
    use std::os::unix::ffi::OsStrExt;

    let bytes = name.as_bytes();
    let mut escaped = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            push_escaped_char(&mut escaped, c);
        }
        for &b in chunk.invalid() {
            push_code_point(&mut escaped, SURROGATE_ESCAPE_BASE + b as u32);
        }
    }
    escaped
}

/// Escape a name straight from the file system
#[cfg(not(unix))]
pub fn escape_os_str(name: &OsStr) -> String {
    escape_filename(&name.to_string_lossy())
}

/// Sort key ordering names by code point
///
/// Undecodable bytes count as their surrogate escape U+DC00 + b, so a raw
/// `0xff` sorts before U+E000 even though its byte value is larger.
#[cfg(unix)]
pub fn code_point_key(name: &OsStr) -> Vec<u32> {
    use std::os::unix::ffi::OsStrExt;

    let mut key = Vec::with_capacity(name.len());
    for chunk in name.as_bytes().utf8_chunks() {
        key.extend(chunk.valid().chars().map(u32::from));
        key.extend(chunk.invalid().iter().map(|&b| SURROGATE_ESCAPE_BASE + b as u32));
    }
    key
}

/// Sort key ordering names by code point
#[cfg(not(unix))]
pub fn code_point_key(name: &OsStr) -> Vec<u32> {
    name.to_string_lossy().chars().map(u32::from).collect()
}

/// Escape a directory path
pub fn escape_path(path: &Path) -> String {
    escape_os_str(path.as_os_str())
}

fn push_escaped_char(out: &mut String, c: char) {
    let n = c as u32;
    if c == '\\' || n < 32 || (0x7f..=0xa0).contains(&n) {
        let _ = write!(out, "\\x{:02x}", n);
    } else if n < 0x7f || is_printable(c) {
        out.push(c);
    } else {
        push_code_point(out, n);
    }
}

/// Numeric escape sized to the value
fn push_code_point(out: &mut String, n: u32) {
    let _ = if n <= 0xff {
        write!(out, "\\x{:02x}", n)
    } else if n <= 0xffff {
        write!(out, "\\u{:04x}", n)
    } else {
        write!(out, "\\U{:08x}", n)
    };
}

/// Whether a code point can be shown as-is
pub fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Surrogate
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
            | GeneralCategory::LineSeparator
            | GeneralCategory::ParagraphSeparator
            | GeneralCategory::SpaceSeparator
    )
}

/// Reverse [`escape_filename`] / [`escape_os_str`]
///
/// Any text without backslashes is returned unchanged. `\udcXX` escapes with
/// `XX >= 0x80` decode to the raw byte `XX`; that is only representable on
/// Unix, elsewhere it yields [`EscapeError::InvalidCodePoint`].
pub fn unescape_filename(escaped: &str) -> Result<OsString, EscapeError> {
    let mut bytes = Vec::with_capacity(escaped.len());
    let mut rest = escaped;
    let mut offset = 0;

    while let Some(pos) = rest.find('\\') {
        bytes.extend_from_slice(rest[..pos].as_bytes());
        let at = offset + pos;
        let after = &rest[pos + 1..];

        let width = match after.chars().next() {
            Some('x') => 2,
            Some('u') => 4,
            Some('U') => 8,
            _ => return Err(EscapeError::UnknownEscape { offset: at }),
        };
        let digits = after
            .get(1..1 + width)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or(EscapeError::BadDigits { offset: at })?;
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| EscapeError::BadDigits { offset: at })?;

        match char::from_u32(value) {
            Some(c) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            None if (SURROGATE_ESCAPE_BASE + 0x80..=SURROGATE_ESCAPE_BASE + 0xff)
                .contains(&value) =>
            {
                bytes.push((value - SURROGATE_ESCAPE_BASE) as u8);
            }
            None => return Err(EscapeError::InvalidCodePoint { offset: at, value }),
        }

        let consumed = pos + 2 + width;
        rest = &rest[consumed..];
        offset += consumed;
    }
    bytes.extend_from_slice(rest.as_bytes());

    bytes_to_os_string(bytes, offset)
}

#[cfg(unix)]
fn bytes_to_os_string(bytes: Vec<u8>, _offset: usize) -> Result<OsString, EscapeError> {
    use std::os::unix::ffi::OsStringExt;
    Ok(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn bytes_to_os_string(bytes: Vec<u8>, offset: usize) -> Result<OsString, EscapeError> {
    String::from_utf8(bytes)
        .map(OsString::from)
        .map_err(|_| EscapeError::InvalidCodePoint { offset, value: SURROGATE_ESCAPE_BASE })
}
