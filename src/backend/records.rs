//! Record-store persistence.
//!
//! [`RecordStore`] is the contract of an external per-document storage engine
//! (an embedded database, an object store, ...). [`RecordBackend`] adapts it
//! to [`PersistenceBackend`]: each queued change becomes an `upsert`,
//! `delete` or `delete_all`, followed by a single `commit`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::backend::{Change, DocumentView, PersistenceBackend};
use crate::document::{Document, DocumentId};
use crate::error::{Result, TesseraError};

/// External per-document storage engine.
pub trait RecordStore: Send + Sync + fmt::Debug {
    /// All committed documents of `collection`.
    fn fetch_all(&self, collection: &str) -> anyhow::Result<Vec<Document>>;

    /// Stage an insert-or-replace.
    fn upsert(&self, collection: &str, document: &Document) -> anyhow::Result<()>;

    /// Stage the removal of one document.
    fn delete(&self, collection: &str, id: &DocumentId) -> anyhow::Result<()>;

    /// Stage the removal of every document of `collection`.
    fn delete_all(&self, collection: &str) -> anyhow::Result<()>;

    /// Make staged operations durable.
    fn commit(&self) -> anyhow::Result<()>;
}

fn backend_error(op: &str, collection: &str, e: anyhow::Error) -> TesseraError {
    TesseraError::backend(format!("{op} on {collection:?}: {e:#}"))
}

#[derive(Debug)]
pub struct RecordBackend {
    store: Arc<dyn RecordStore>,
}

impl RecordBackend {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        RecordBackend { store }
    }
}

impl PersistenceBackend for RecordBackend {
    fn kind(&self) -> &'static str {
        "records"
    }

    fn load(&self, collection: &str) -> Result<Option<Vec<Document>>> {
        // A record store has no notion of a missing collection, only an empty one.
        let documents = self
            .store
            .fetch_all(collection)
            .map_err(|e| backend_error("fetch_all", collection, e))?;
        Ok(Some(documents))
    }

    fn persist(
        &self,
        collection: &str,
        changes: &[Change],
        view: &dyn DocumentView,
    ) -> Result<()> {
        for change in changes {
            match change {
                Change::Upsert(ids) => {
                    for id in ids {
                        // Absent means a later queued change removed it.
                        if let Some(document) = view.get(id) {
                            self.store
                                .upsert(collection, &document)
                                .map_err(|e| backend_error("upsert", collection, e))?;
                        }
                    }
                }
                Change::Remove(id) => self
                    .store
                    .delete(collection, id)
                    .map_err(|e| backend_error("delete", collection, e))?,
                Change::Clear => self
                    .store
                    .delete_all(collection)
                    .map_err(|e| backend_error("delete_all", collection, e))?,
            }
        }

        self.store
            .commit()
            .map_err(|e| backend_error("commit", collection, e))
    }
}

#[derive(Debug)]
enum StagedOp {
    Upsert(String, Document),
    Delete(String, DocumentId),
    DeleteAll(String),
}

/// In-memory [`RecordStore`] with staged writes, for tests and prototyping.
///
/// Staged operations are invisible to `fetch_all` until `commit`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    committed: Mutex<HashMap<String, Vec<Document>>>,
    staged: Mutex<Vec<StagedOp>>,
    commits: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of operations staged but not yet committed.
    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }
}

impl RecordStore for MemoryRecordStore {
    fn fetch_all(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self
            .committed
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    fn upsert(&self, collection: &str, document: &Document) -> anyhow::Result<()> {
        self.staged
            .lock()
            .push(StagedOp::Upsert(collection.to_string(), document.clone()));
        Ok(())
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> anyhow::Result<()> {
        self.staged
            .lock()
            .push(StagedOp::Delete(collection.to_string(), *id));
        Ok(())
    }

    fn delete_all(&self, collection: &str) -> anyhow::Result<()> {
        self.staged
            .lock()
            .push(StagedOp::DeleteAll(collection.to_string()));
        Ok(())
    }

    fn commit(&self) -> anyhow::Result<()> {
        let staged = std::mem::take(&mut *self.staged.lock());
        let mut committed = self.committed.lock();

        for op in staged {
            match op {
                StagedOp::Upsert(collection, document) => {
                    let rows = committed.entry(collection).or_default();
                    match rows.iter_mut().find(|row| row.id == document.id) {
                        Some(row) => *row = document,
                        None => rows.push(document),
                    }
                }
                StagedOp::Delete(collection, id) => {
                    if let Some(rows) = committed.get_mut(&collection) {
                        rows.retain(|row| row.id != id);
                    }
                }
                StagedOp::DeleteAll(collection) => {
                    committed.remove(&collection);
                }
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
