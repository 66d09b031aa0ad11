//! Live log tailing.
//!
//! A [`LogTailer`] polls each subscribed file on its own task and pushes new
//! bytes to every subscriber of that path. Truncation or rotation is
//! detected by the file shrinking below the cursor, in which case
//! subscribers get a [`LogChunk::Reset`] followed by a replay from the
//! start. No file handle is held between polls.

mod stream;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;
use warden_core::LogChunk;

use stream::{LogStream, backfill, poll_once};

struct Shared {
    poll_interval: Duration,
    streams: Mutex<HashMap<PathBuf, Arc<LogStream>>>,
    next_id: AtomicU64,
}

impl Shared {
    fn streams(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<LogStream>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, path: &Path, id: u64) {
        let mut streams = self.streams();
        let Some(stream) = streams.get(path) else {
            return;
        };
        if stream.remove(id) {
            stream.cancel.cancel();
            streams.remove(path);
            debug!(path = %path.display(), "Stopped tailing log file");
        }
    }
}

/// Tails log files for any number of subscribers.
///
/// Paths are compared as given; subscribe with the same spelling of a path
/// to share one stream.
#[derive(Clone)]
pub struct LogTailer {
    shared: Arc<Shared>,
}

impl LogTailer {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                poll_interval,
                streams: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Start receiving a file's content.
    ///
    /// The first subscriber to a path gets the whole current file (or
    /// `Waiting` if it does not exist yet). A later subscriber gets
    /// everything delivered so far, so every subscriber sees the same
    /// gap-free, duplicate-free view. Must be called from within a tokio
    /// runtime.
    pub async fn subscribe(&self, path: impl Into<PathBuf>) -> LogSubscription {
        let path = path.into();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let (stream, created) = {
            let mut streams = self.shared.streams();
            let (stream, created) = match streams.get(&path) {
                Some(stream) => (Arc::clone(stream), false),
                None => {
                    let stream = Arc::new(LogStream::new());
                    streams.insert(path.clone(), Arc::clone(&stream));
                    (stream, true)
                }
            };
            // Registered under the map lock so the stream cannot be torn
            // down between lookup and registration.
            stream.add_pending(id, tx);
            (stream, created)
        };

        if created {
            debug!(path = %path.display(), "Started tailing log file");
            tokio::spawn(run_poller(
                path.clone(),
                Arc::clone(&stream),
                self.shared.poll_interval,
            ));
        }

        {
            let mut cursor = stream.cursor.lock().await;
            let chunks = backfill(&path, &mut cursor).await;
            stream.deliver_backfill(id, chunks);
        }

        LogSubscription {
            path,
            id,
            rx,
            shared: Arc::clone(&self.shared),
            closed: false,
        }
    }

    /// Whether a polling task is running for `path`.
    pub fn is_tailing(&self, path: &Path) -> bool {
        self.shared.streams().contains_key(path)
    }

    pub fn subscriber_count(&self, path: &Path) -> usize {
        self.shared
            .streams()
            .get(path)
            .map_or(0, |stream| stream.subscriber_count())
    }
}

async fn run_poller(path: PathBuf, stream: Arc<LogStream>, poll_interval: Duration) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the backfill covers it.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = stream.cancel.cancelled() => break,
            _ = ticker.tick() => poll_once(&path, &stream).await,
        }
    }

    debug!(path = %path.display(), "Log poller exiting");
}

/// A live subscription to one log file.
///
/// Dropping the subscription unsubscribes.
pub struct LogSubscription {
    path: PathBuf,
    id: u64,
    rx: mpsc::UnboundedReceiver<LogChunk>,
    shared: Arc<Shared>,
    closed: bool,
}

impl LogSubscription {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next chunk, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<LogChunk> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Next chunk if one is already queued.
    pub fn try_recv(&mut self) -> Option<LogChunk> {
        if self.closed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop receiving. Idempotent; no chunk is delivered after this returns.
    pub fn unsubscribe(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.unsubscribe(&self.path, self.id);
        self.rx.close();
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSubscription")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
