//! Record sinks: where the dispatcher sends what it finds
//!
//! The dispatcher classifies every entry and hands it to a [`RecordSink`]. Two
//! sinks exist and one is chosen per run:
//!
//! - [`DirectSink`] hashes on the calling thread and writes immediately. No
//!   queues, no threads; used when parallelism is 1.
//! - [`ParallelSink`] runs N hashing workers and one serializer thread, all
//!   connected by channels only:
//!
//! ```text
//!                 hash candidates (bounded, 4N)
//!   dispatcher ─────────────────────────────────▶ worker 1..N
//!       │                                            │
//!       │ directories, cached refs, plain records    │ hashed records, then
//!       ▼                                            ▼ one sentinel each
//!   ┌──────────────────── serializer queue (unbounded) ─────────┐
//!   └──────────────────────────▶ serializer ─▶ manifest ────────┘
//! ```
//!
//! The bounded hashing queue blocks the dispatcher when workers fall behind;
//! the serializer queue is unbounded so finished records are never held back.
//! The serializer stops after it has seen one sentinel per worker.

use crate::checksum::hash_record;
use crate::error::{FileinfoError, Result};
use crate::serializer::{ManifestWriter, Serializer, WriterReport};
use crate::types::{CachedReference, DirectoryMarker, FileRecord, ManifestItem, Sequenced};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::io::Write;
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{debug, trace, warn};

/// Destination for dispatched items
///
/// Sequence numbers are assigned by the dispatcher in traversal order; every
/// submission carries a fresh one.
pub trait RecordSink {
    /// A directory is about to be listed
    fn submit_directory(&mut self, seq: u64, marker: DirectoryMarker) -> Result<()>;

    /// An entry whose inode was already described
    fn submit_cached_reference(&mut self, seq: u64, cached: CachedReference) -> Result<()>;

    /// A regular file that needs its content hashed
    fn submit_hash_candidate(&mut self, seq: u64, record: FileRecord) -> Result<()>;

    /// Any other entry; ready to write as-is
    fn submit_plain_record(&mut self, seq: u64, record: FileRecord) -> Result<()>;
}

/// Hashes and writes on the calling thread
pub struct DirectSink<W: Write, E: Write> {
    writer: ManifestWriter<W, E>,
    block_size: usize,
    next_seq: u64,
}

impl<W: Write, E: Write> DirectSink<W, E> {
    /// Wrap a writer whose header is already out
    pub fn new(writer: ManifestWriter<W, E>, block_size: usize) -> Self {
        Self {
            writer,
            block_size,
            next_seq: 0,
        }
    }

    fn emit(&mut self, seq: u64, item: ManifestItem) -> Result<()> {
        debug_assert_eq!(seq, self.next_seq, "direct sink received out-of-order item");
        self.next_seq = seq + 1;
        self.writer.emit(item)
    }

    /// Flush and report
    pub fn finish(self) -> Result<WriterReport> {
        self.writer.finish()
    }
}

impl<W: Write, E: Write> RecordSink for DirectSink<W, E> {
    fn submit_directory(&mut self, seq: u64, marker: DirectoryMarker) -> Result<()> {
        self.emit(seq, ManifestItem::Directory(marker))
    }

    fn submit_cached_reference(&mut self, seq: u64, cached: CachedReference) -> Result<()> {
        self.emit(seq, ManifestItem::Cached(cached))
    }

    fn submit_hash_candidate(&mut self, seq: u64, mut record: FileRecord) -> Result<()> {
        hash_record(&mut record, self.block_size);
        self.emit(seq, ManifestItem::File(record))
    }

    fn submit_plain_record(&mut self, seq: u64, record: FileRecord) -> Result<()> {
        self.emit(seq, ManifestItem::File(record))
    }
}

/// Work for a hashing worker
enum HashJob {
    Hash(Sequenced<FileRecord>),
    Shutdown,
}

/// Input of the serializer thread
enum SerializerMsg {
    Item(Sequenced<ManifestItem>),
    WorkerDone,
}

/// Worker pool plus serializer, running on scoped threads
pub struct ParallelSink<'scope> {
    hash_tx: Sender<HashJob>,
    serial_tx: Sender<SerializerMsg>,
    workers: Vec<ScopedJoinHandle<'scope, ()>>,
    serializer: ScopedJoinHandle<'scope, Result<WriterReport>>,
}

impl<'scope> ParallelSink<'scope> {
    /// Spawn `workers` hashing threads and the serializer inside `scope`
    ///
    /// `queue_depth` is the capacity of the hashing queue.
    pub fn start<'env, W, E>(
        scope: &'scope Scope<'scope, 'env>,
        writer: ManifestWriter<W, E>,
        workers: usize,
        queue_depth: usize,
        block_size: usize,
    ) -> Result<Self>
    where
        W: Write + Send + 'scope,
        E: Write + Send + 'scope,
    {
        let workers = workers.max(1);
        let (hash_tx, hash_rx) = bounded::<HashJob>(queue_depth.max(1));
        let (serial_tx, serial_rx) = unbounded::<SerializerMsg>();

        let serializer = thread::Builder::new()
            .name("fileinfo-serializer".to_string())
            .spawn_scoped(scope, move || run_serializer(serial_rx, Serializer::new(writer), workers))?;

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let jobs = hash_rx.clone();
            let results = serial_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("fileinfo-hash-{}", worker_id))
                .spawn_scoped(scope, move || run_worker(worker_id, jobs, results, block_size))?;
            handles.push(handle);
        }
        debug!("Started {} hashing workers (queue depth {})", workers, queue_depth);

        Ok(Self {
            hash_tx,
            serial_tx,
            workers: handles,
            serializer,
        })
    }

    fn forward(&self, seq: u64, item: ManifestItem) -> Result<()> {
        self.serial_tx
            .send(SerializerMsg::Item(Sequenced::new(seq, item)))
            .map_err(|_| FileinfoError::ChannelClosed)
    }

    /// Signal shutdown, wait for every thread and report
    ///
    /// A serializer error (for example a failed write) takes precedence over
    /// anything the workers report, since it is usually the root cause.
    pub fn finish(self) -> Result<WriterReport> {
        let Self {
            hash_tx,
            serial_tx,
            workers,
            serializer,
        } = self;

        for _ in 0..workers.len() {
            if hash_tx.send(HashJob::Shutdown).is_err() {
                // every worker already exited
                break;
            }
        }
        drop(hash_tx);
        drop(serial_tx);

        let mut worker_panicked = false;
        for handle in workers {
            worker_panicked |= handle.join().is_err();
        }

        let report = serializer
            .join()
            .map_err(|_| FileinfoError::thread_pool("serializer thread panicked"))??;
        if worker_panicked {
            return Err(FileinfoError::thread_pool("hashing worker panicked"));
        }
        Ok(report)
    }
}

impl RecordSink for ParallelSink<'_> {
    fn submit_directory(&mut self, seq: u64, marker: DirectoryMarker) -> Result<()> {
        self.forward(seq, ManifestItem::Directory(marker))
    }

    fn submit_cached_reference(&mut self, seq: u64, cached: CachedReference) -> Result<()> {
        self.forward(seq, ManifestItem::Cached(cached))
    }

    fn submit_hash_candidate(&mut self, seq: u64, record: FileRecord) -> Result<()> {
        // blocks while the queue is full
        self.hash_tx
            .send(HashJob::Hash(Sequenced::new(seq, record)))
            .map_err(|_| FileinfoError::ChannelClosed)
    }

    fn submit_plain_record(&mut self, seq: u64, record: FileRecord) -> Result<()> {
        self.forward(seq, ManifestItem::File(record))
    }
}

fn run_worker(
    worker_id: usize,
    jobs: Receiver<HashJob>,
    results: Sender<SerializerMsg>,
    block_size: usize,
) {
    let mut hashed = 0u64;
    while let Ok(job) = jobs.recv() {
        match job {
            HashJob::Hash(Sequenced { seq, item: mut record }) => {
                hash_record(&mut record, block_size);
                hashed += 1;
                let msg = SerializerMsg::Item(Sequenced::new(seq, ManifestItem::File(record)));
                if results.send(msg).is_err() {
                    warn!("Worker {} stopping: serializer is gone", worker_id);
                    return;
                }
            }
            HashJob::Shutdown => {
                trace!("Worker {} done after {} files", worker_id, hashed);
                let _ = results.send(SerializerMsg::WorkerDone);
                return;
            }
        }
    }
}

fn run_serializer<W: Write, E: Write>(
    inbox: Receiver<SerializerMsg>,
    mut serializer: Serializer<W, E>,
    workers: usize,
) -> Result<WriterReport> {
    let mut finished_workers = 0;
    while finished_workers < workers {
        match inbox.recv() {
            Ok(SerializerMsg::Item(item)) => serializer.accept(item)?,
            Ok(SerializerMsg::WorkerDone) => finished_workers += 1,
            Err(_) => {
                return Err(FileinfoError::internal(format!(
                    "serializer input closed after {} of {} workers finished",
                    finished_workers, workers
                )))
            }
        }
    }
    if serializer.pending() > 0 {
        return Err(FileinfoError::internal(format!(
            "{} items never became writable (missing #{})",
            serializer.pending(),
            serializer.next_expected()
        )));
    }
    serializer.finish()
}
