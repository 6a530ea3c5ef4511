//! Ordered manifest output
//!
//! [`ManifestWriter`] is the only place that writes manifest bytes. It owns the
//! encoder baseline, the byte-counting output sink and the diagnostics
//! channel.
//!
//! [`Serializer`] sits in front of it in parallel mode: items arrive in
//! whatever order hashing finishes, get parked in a reorder buffer keyed by
//! sequence number, and are released strictly in sequence order. The output is
//! therefore a function of the sequence numbers alone, not of timing.

use crate::collections::HashMap;
use crate::encoder::encode;
use crate::error::Result;
use crate::format::header_line;
use crate::types::{FileStat, ManifestItem, Sequenced};
use crate::utils::CountingWriter;
use std::io::Write;
use tracing::{debug, trace};

/// Totals reported by a finished [`ManifestWriter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    /// Manifest bytes written, header included
    pub bytes_written: u64,
    /// Items written
    pub items_written: u64,
    /// Diagnostics emitted for hashing failures
    pub hashing_errors: u64,
}

/// Encodes items in the order given and writes them out
pub struct ManifestWriter<W: Write, E: Write> {
    out: CountingWriter<W>,
    diagnostics: E,
    baseline: Option<FileStat>,
    items_written: u64,
    hashing_errors: u64,
}

impl<W: Write, E: Write> ManifestWriter<W, E> {
    /// Wrap a manifest sink and a diagnostics sink
    pub fn new(out: W, diagnostics: E) -> Self {
        Self {
            out: CountingWriter::new(out),
            diagnostics,
            baseline: None,
            items_written: 0,
            hashing_errors: 0,
        }
    }

    /// Write the `%fileinfo` header line
    pub fn write_header(&mut self, nanosecond_times: bool) -> Result<()> {
        writeln!(self.out, "{}", header_line(nanosecond_times))?;
        Ok(())
    }

    /// Encode one item against the current baseline and write it
    pub fn emit(&mut self, item: ManifestItem) -> Result<()> {
        let encoded = encode(item, self.baseline.take());
        if let Some(diagnostic) = &encoded.diagnostic {
            self.diagnostics.write_all(diagnostic.as_bytes())?;
            self.hashing_errors += 1;
        }
        self.out.write_all(encoded.text.as_bytes())?;
        self.baseline = encoded.baseline;
        self.items_written += 1;
        Ok(())
    }

    /// Flush both sinks and report totals
    pub fn finish(mut self) -> Result<WriterReport> {
        self.out.flush()?;
        self.diagnostics.flush()?;
        Ok(WriterReport {
            bytes_written: self.out.bytes_written(),
            items_written: self.items_written,
            hashing_errors: self.hashing_errors,
        })
    }
}

/// Restores sequence order in front of a [`ManifestWriter`]
pub struct Serializer<W: Write, E: Write> {
    writer: ManifestWriter<W, E>,
    pending: HashMap<u64, ManifestItem>,
    next_expected: u64,
}

impl<W: Write, E: Write> Serializer<W, E> {
    /// Start at sequence number 0
    pub fn new(writer: ManifestWriter<W, E>) -> Self {
        Self {
            writer,
            pending: HashMap::default(),
            next_expected: 0,
        }
    }

    /// Accept one item and write every item that is now in order
    pub fn accept(&mut self, item: Sequenced<ManifestItem>) -> Result<()> {
        trace!("Serializer received #{} (expecting #{})", item.seq, self.next_expected);
        self.pending.insert(item.seq, item.item);
        while let Some(ready) = self.pending.remove(&self.next_expected) {
            self.writer.emit(ready)?;
            self.next_expected += 1;
        }
        Ok(())
    }

    /// Next sequence number the serializer is waiting for
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// Items received but not yet writable
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Finish the underlying writer
    ///
    /// Items still parked in the reorder buffer mean a sequence number was
    /// never delivered; they are dropped and logged.
    pub fn finish(self) -> Result<WriterReport> {
        if !self.pending.is_empty() {
            debug!(
                "Serializer finished with {} undelivered items after #{}",
                self.pending.len(),
                self.next_expected
            );
        }
        self.writer.finish()
    }
}
