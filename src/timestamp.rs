//! Compact ISO-8601 timestamps
//!
//! Times are written as `YYYYMMDDHHMMSS[.fraction]` in UTC. The fraction uses
//! as many digits as the source resolution provides, with trailing zeros
//! removed, and is left out entirely when zero. File systems that only keep
//! whole seconds therefore produce short lines.

use crate::types::FileTime;
use chrono::DateTime;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Format a file time as a compact ISO-8601 string
///
/// # Example
///
/// ```rust
/// use fileinfo::timestamp::format_file_time;
/// use fileinfo::types::FileTime;
///
/// assert_eq!(format_file_time(&FileTime::precise(0, 0)), "19700101000000");
/// assert_eq!(format_file_time(&FileTime::precise(0, 100_000_000)), "19700101000000.1");
/// ```
pub fn format_file_time(time: &FileTime) -> String {
    let (secs, nanos) = split_seconds(time);
    format_parts(secs, nanos)
}

/// Whole seconds and nanoseconds for a file time
///
/// Floating-point times only hold about 16 significant digits, so their
/// fraction is rounded to microseconds first.
pub fn split_seconds(time: &FileTime) -> (i64, u32) {
    match *time {
        FileTime::Precise { secs, nanos } => (secs, nanos % NANOS_PER_SEC),
        FileTime::Approximate(value) => {
            let whole = value.floor();
            let micros = ((value - whole) * 1_000_000.0).round() as u32;
            if micros >= 1_000_000 {
                (whole as i64 + 1, 0)
            } else {
                (whole as i64, micros * 1000)
            }
        }
    }
}

fn format_parts(secs: i64, nanos: u32) -> String {
    let mut text = match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y%m%d%H%M%S").to_string(),
        None => secs.to_string(),
    };
    if nanos > 0 {
        let digits = format!("{:09}", nanos);
        text.push('.');
        text.push_str(digits.trim_end_matches('0'));
    }
    text
}
