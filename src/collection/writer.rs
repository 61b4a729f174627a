//! Background persistence for a single collection.
//!
//! Each collection owns one writer thread fed through an unbounded channel.
//! Changes are persisted in the order they were queued; whatever is already
//! waiting in the channel is drained and handed to the backend as one batch.
//! The changes of a failed write are kept and handed to the backend again,
//! ahead of newer ones, with the next write.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;

use crate::backend::{Change, DocumentView, PersistenceBackend};
use crate::error::{Result, TesseraError};

/// Upper bound on messages drained into one backend call.
const MAX_DRAIN: usize = 1024;

/// Counters describing the asynchronous writes of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistenceStats {
    /// Backend calls that succeeded.
    pub writes_completed: u64,

    /// Backend calls that failed.
    pub writes_failed: u64,

    /// Changes covered by successful writes.
    pub changes_persisted: u64,

    /// Changes from failed writes, kept to be retried with the next write.
    pub changes_pending: u64,

    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

enum WriterMessage {
    Persist(Change),
    /// Wait for earlier writes and take the failure not yet reported.
    Flush(Sender<Option<String>>),
    /// Wait for earlier writes, then drop the changes kept for retry.
    /// The failure, if any, stays unreported.
    Reset(Sender<Option<String>>),
}

pub(crate) struct SnapshotWriter {
    sender: Option<Sender<WriterMessage>>,
    handle: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<PersistenceStats>>,
}

impl SnapshotWriter {
    pub(crate) fn spawn<V>(
        collection: String,
        backend: Arc<dyn PersistenceBackend>,
        view: V,
    ) -> Result<Self>
    where
        V: DocumentView + Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let stats = Arc::new(Mutex::new(PersistenceStats::default()));
        let worker_stats = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("tessera-writer-{collection}"))
            .spawn(move || {
                Worker {
                    collection: &collection,
                    backend: backend.as_ref(),
                    view: &view,
                    stats: &worker_stats,
                    retry: Vec::new(),
                    unreported: None,
                }
                .run(receiver)
            })
            .map_err(|e| TesseraError::other(format!("Failed to spawn writer thread: {e}")))?;

        Ok(SnapshotWriter {
            sender: Some(sender),
            handle: Some(handle),
            stats,
        })
    }

    /// Queue a change. Never blocks.
    pub(crate) fn submit(&self, change: Change) {
        let sent = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(WriterMessage::Persist(change)).is_ok());

        if !sent {
            let message = "writer thread is not running".to_string();
            log::error!("dropping snapshot write: {message}");
            let mut stats = self.stats.lock();
            stats.writes_failed += 1;
            stats.last_error = Some(message);
        }
    }

    /// Wait until every change queued so far has been handed to the backend.
    ///
    /// Reports, once, the last failure seen since the previous flush.
    pub(crate) fn flush(&self) -> Result<()> {
        match self.wait(WriterMessage::Flush)? {
            None => Ok(()),
            Some(error) => Err(TesseraError::save_failed(error)),
        }
    }

    /// Wait for queued writes and forget the changes kept for retry, ahead of
    /// replacing the in-memory state with the persisted one.
    ///
    /// Returns the unreported failure without consuming it.
    pub(crate) fn reset(&self) -> Result<Option<String>> {
        self.wait(WriterMessage::Reset)
    }

    fn wait(
        &self,
        message: fn(Sender<Option<String>>) -> WriterMessage,
    ) -> Result<Option<String>> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| TesseraError::save_failed("writer thread is not running"))?;

        let (ack_sender, ack_receiver) = bounded(1);
        sender
            .send(message(ack_sender))
            .map_err(|_| TesseraError::save_failed("writer thread is not running"))?;

        ack_receiver
            .recv()
            .map_err(|_| TesseraError::save_failed("writer thread stopped"))
    }

    pub(crate) fn stats(&self) -> PersistenceStats {
        self.stats.lock().clone()
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        // Disconnecting lets the worker drain the queue and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("snapshot writer thread panicked");
        }
    }
}

struct Worker<'a> {
    collection: &'a str,
    backend: &'a dyn PersistenceBackend,
    view: &'a dyn DocumentView,
    stats: &'a Mutex<PersistenceStats>,
    /// Changes of failed writes, oldest first.
    retry: Vec<Change>,
    unreported: Option<String>,
}

impl Worker<'_> {
    fn run(mut self, receiver: Receiver<WriterMessage>) {
        while let Ok(first) = receiver.recv() {
            let mut changes = std::mem::take(&mut self.retry);
            let mut flushes = Vec::new();
            let mut resets = Vec::new();

            let mut accept = |message: WriterMessage| match message {
                WriterMessage::Persist(change) => changes.push(change),
                WriterMessage::Flush(ack) => flushes.push(ack),
                WriterMessage::Reset(ack) => resets.push(ack),
            };
            accept(first);
            for message in receiver.try_iter().take(MAX_DRAIN) {
                accept(message);
            }

            self.persist(changes);

            if !resets.is_empty() {
                self.retry.clear();
                self.stats.lock().changes_pending = 0;
                for ack in resets {
                    let _ = ack.send(self.unreported.clone());
                }
            }

            if !flushes.is_empty() {
                let report = self.unreported.take();
                for ack in flushes {
                    let _ = ack.send(report.clone());
                }
            }
        }

        if !self.retry.is_empty() {
            let retry = std::mem::take(&mut self.retry);
            self.persist(retry);
        }
        if !self.retry.is_empty() {
            log::error!(
                "collection {:?}: {} changes were never persisted",
                self.collection,
                self.retry.len()
            );
        }

        log::debug!("snapshot writer for {:?} stopped", self.collection);
    }

    fn persist(&mut self, mut changes: Vec<Change>) {
        // Nothing before the last clear can affect the result.
        if let Some(last_clear) = changes.iter().rposition(|c| matches!(c, Change::Clear)) {
            changes.drain(..last_clear);
        }
        if changes.is_empty() {
            return;
        }

        match self.backend.persist(self.collection, &changes, self.view) {
            Ok(()) => {
                let mut stats = self.stats.lock();
                stats.writes_completed += 1;
                stats.changes_persisted += changes.len() as u64;
                stats.changes_pending = 0;
            }
            Err(e) => {
                let message = e.to_string();
                log::error!(
                    "failed to persist collection {:?} via {} backend: {message}",
                    self.collection,
                    self.backend.kind()
                );
                let mut stats = self.stats.lock();
                stats.writes_failed += 1;
                stats.changes_pending = changes.len() as u64;
                stats.last_error = Some(message.clone());
                self.unreported = Some(message);
                self.retry = changes;
            }
        }
    }
}
