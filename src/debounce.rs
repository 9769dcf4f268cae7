//! Quiet-window debouncing for a folder's change stream.
//!
//! Every push bumps a generation counter and schedules a flush for that
//! generation. A flush only goes through if no newer push happened while it
//! slept, so a burst of events yields one batch once the folder goes quiet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::event::FileChange;

/// Pending buffer plus its generation counter.
#[derive(Debug, Default)]
pub struct PendingChanges {
    buffer: Mutex<Vec<FileChange>>,
    generation: AtomicU64,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<FileChange>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a change and returns the new generation.
    pub fn push(&self, change: FileChange) -> u64 {
        let mut buffer = self.buffer();
        buffer.push(change);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Puts changes back, e.g. when the folder was busy. Returns the new generation.
    pub fn requeue(&self, mut changes: Vec<FileChange>) -> u64 {
        let mut buffer = self.buffer();
        changes.append(&mut *buffer);
        *buffer = changes;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drains the buffer if `generation` is still the latest one.
    pub fn take_if_current(&self, generation: u64) -> Option<Vec<FileChange>> {
        let mut buffer = self.buffer();
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        Some(coalesce(std::mem::take(&mut *buffer)))
    }

    /// Discards pending changes and makes every scheduled flush stale.
    pub fn invalidate(&self) {
        let mut buffer = self.buffer();
        buffer.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps one entry per path, with the latest kind, in first-seen order.
pub fn coalesce(changes: Vec<FileChange>) -> Vec<FileChange> {
    let mut out: Vec<FileChange> = Vec::with_capacity(changes.len());
    for change in changes {
        match out.iter_mut().find(|c| c.path == change.path) {
            Some(existing) => *existing = change,
            None => out.push(change),
        }
    }
    out
}

/// Schedules flushes of a [`PendingChanges`] buffer into a channel.
#[derive(Debug, Clone)]
pub struct Debouncer {
    pending: Arc<PendingChanges>,
    window: Duration,
    flush_tx: mpsc::UnboundedSender<Vec<FileChange>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<FileChange>>) {
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            pending: Arc::new(PendingChanges::new()),
            window,
            flush_tx,
        };
        (debouncer, flush_rx)
    }

    pub fn pending(&self) -> &Arc<PendingChanges> {
        &self.pending
    }

    /// Buffers a change and schedules a flush after the quiet window.
    pub fn push(&self, change: FileChange) {
        let generation = self.pending.push(change);
        self.schedule(generation);
    }

    /// Puts a batch back and schedules another flush.
    pub fn requeue(&self, changes: Vec<FileChange>) {
        let generation = self.pending.requeue(changes);
        self.schedule(generation);
    }

    pub fn invalidate(&self) {
        self.pending.invalidate();
    }

    fn schedule(&self, generation: u64) {
        let pending = self.pending.clone();
        let flush_tx = self.flush_tx.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            match pending.take_if_current(generation) {
                Some(batch) if !batch.is_empty() => {
                    debug!(generation, changes = batch.len(), "flushing debounced batch");
                    if flush_tx.send(batch).is_err() {
                        trace!("debounce consumer is gone");
                    }
                }
                Some(_) => {}
                None => trace!(generation, "superseded flush"),
            }
        });
    }
}
