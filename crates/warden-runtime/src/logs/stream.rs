//! Per-path tail state and the polling step.

use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warden_core::LogChunk;

pub(super) struct Subscriber {
    tx: mpsc::UnboundedSender<LogChunk>,
    /// Set once the backfill has been delivered; live chunks are only sent
    /// to ready subscribers so nothing overtakes the backfill.
    ready: bool,
}

/// Cursor state, only touched by the poller and by backfills.
#[derive(Debug, Default)]
pub(super) struct Cursor {
    /// Bytes of the file delivered so far.
    pub(super) position: u64,
    /// The first subscriber has done the initial read.
    pub(super) initialized: bool,
    /// Last error delivered, for suppressing repeats.
    pub(super) last_error: Option<String>,
}

/// One tailed file shared by all its subscribers.
pub(super) struct LogStream {
    pub(super) cursor: tokio::sync::Mutex<Cursor>,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    pub(super) cancel: CancellationToken,
}

impl LogStream {
    pub(super) fn new() -> Self {
        Self {
            cursor: tokio::sync::Mutex::new(Cursor::default()),
            subscribers: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn add_pending(&self, id: u64, tx: mpsc::UnboundedSender<LogChunk>) {
        self.subscribers().insert(id, Subscriber { tx, ready: false });
    }

    /// Remove a subscriber. Returns true when none are left.
    pub(super) fn remove(&self, id: u64) -> bool {
        let mut subs = self.subscribers();
        subs.remove(&id);
        subs.is_empty()
    }

    pub(super) fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Deliver backfill chunks to one pending subscriber and mark it ready.
    pub(super) fn deliver_backfill(&self, id: u64, chunks: Vec<LogChunk>) {
        let mut subs = self.subscribers();
        if let Some(sub) = subs.get_mut(&id) {
            for chunk in chunks {
                let _ = sub.tx.send(chunk);
            }
            sub.ready = true;
        }
    }

    fn broadcast(&self, chunk: &LogChunk) {
        for sub in self.subscribers().values().filter(|s| s.ready) {
            let _ = sub.tx.send(chunk.clone());
        }
    }
}

/// Read `[start, start + len)` of a file, opening it only for this read.
pub(super) async fn read_range(path: &Path, start: u64, len: u64) -> io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.take(len).read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Chunks that bring a new subscriber up to `cursor`.
///
/// The first subscriber reads the whole file and initializes the cursor.
pub(super) async fn backfill(path: &Path, cursor: &mut Cursor) -> Vec<LogChunk> {
    if !cursor.initialized {
        cursor.initialized = true;
        return match tokio::fs::read(path).await {
            Ok(bytes) => {
                cursor.position = bytes.len() as u64;
                if bytes.is_empty() {
                    Vec::new()
                } else {
                    vec![LogChunk::Data(bytes)]
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => vec![LogChunk::Waiting],
            Err(e) => {
                let message = e.to_string();
                cursor.last_error = Some(message.clone());
                vec![LogChunk::Error(message)]
            }
        };
    }

    if cursor.position == 0 {
        return match tokio::fs::metadata(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => vec![LogChunk::Waiting],
            _ => Vec::new(),
        };
    }

    match read_range(path, 0, cursor.position).await {
        Ok(bytes) if bytes.is_empty() => Vec::new(),
        Ok(bytes) => vec![LogChunk::Data(bytes)],
        Err(e) => vec![LogChunk::Error(e.to_string())],
    }
}

/// One polling step: deliver whatever changed since the last one.
pub(super) async fn poll_once(path: &Path, stream: &LogStream) {
    let mut cursor = stream.cursor.lock().await;
    if !cursor.initialized {
        return;
    }

    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Absent: retry silently on the next tick.
            cursor.last_error = None;
            return;
        }
        Err(e) => {
            report_error(path, stream, &mut cursor, &e);
            return;
        }
    };

    if size < cursor.position {
        debug!(path = %path.display(), size, cursor = cursor.position, "Log file shrank, replaying");
        stream.broadcast(&LogChunk::Reset);
        cursor.position = 0;
    }

    if size > cursor.position {
        match read_range(path, cursor.position, size - cursor.position).await {
            Ok(bytes) => {
                cursor.last_error = None;
                if !bytes.is_empty() {
                    cursor.position += bytes.len() as u64;
                    stream.broadcast(&LogChunk::Data(bytes));
                }
            }
            Err(e) => report_error(path, stream, &mut cursor, &e),
        }
    } else {
        cursor.last_error = None;
    }
}

fn report_error(path: &Path, stream: &LogStream, cursor: &mut Cursor, error: &io::Error) {
    let message = error.to_string();
    if cursor.last_error.as_deref() == Some(message.as_str()) {
        return;
    }
    warn!(path = %path.display(), error = %message, "Failed to read log file");
    stream.broadcast(&LogChunk::Error(message.clone()));
    cursor.last_error = Some(message);
}
