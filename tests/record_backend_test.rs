use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use tessera::backend::{
    BackendConfig, BackendFactory, MemoryRecordStore, PersistenceBackend, RecordBackend,
    RecordStore,
};
use tessera::collection::Collection;
use tessera::document::{Document, DocumentId};
use tessera::error::{Result, TesseraError};

/// Record store whose commits fail while `failing` is set.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryRecordStore,
    failing: AtomicBool,
}

impl RecordStore for FlakyStore {
    fn fetch_all(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        self.inner.fetch_all(collection)
    }

    fn upsert(&self, collection: &str, document: &Document) -> anyhow::Result<()> {
        self.inner.upsert(collection, document)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> anyhow::Result<()> {
        self.inner.delete(collection, id)
    }

    fn delete_all(&self, collection: &str) -> anyhow::Result<()> {
        self.inner.delete_all(collection)
    }

    fn commit(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("disk quota exceeded");
        }
        self.inner.commit()
    }
}

#[derive(Debug)]
enum Staged {
    Upsert(Document),
    Delete(DocumentId),
    DeleteAll,
}

/// Transactional single-collection store: a failed commit rolls back every
/// staged operation.
#[derive(Debug, Default)]
struct RollbackStore {
    committed: Mutex<HashMap<DocumentId, Document>>,
    staged: Mutex<Vec<Staged>>,
    failing: AtomicBool,
    delete_alls: Mutex<usize>,
}

impl RollbackStore {
    fn committed_texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = self
            .committed
            .lock()
            .values()
            .map(|d| d.text.clone())
            .collect();
        texts.sort();
        texts
    }
}

impl RecordStore for RollbackStore {
    fn fetch_all(&self, _collection: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self.committed.lock().values().cloned().collect())
    }

    fn upsert(&self, _collection: &str, document: &Document) -> anyhow::Result<()> {
        self.staged.lock().push(Staged::Upsert(document.clone()));
        Ok(())
    }

    fn delete(&self, _collection: &str, id: &DocumentId) -> anyhow::Result<()> {
        self.staged.lock().push(Staged::Delete(*id));
        Ok(())
    }

    fn delete_all(&self, _collection: &str) -> anyhow::Result<()> {
        self.staged.lock().push(Staged::DeleteAll);
        Ok(())
    }

    fn commit(&self) -> anyhow::Result<()> {
        let staged = std::mem::take(&mut *self.staged.lock());
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("transaction aborted");
        }

        let mut committed = self.committed.lock();
        for op in staged {
            match op {
                Staged::Upsert(document) => {
                    committed.insert(document.id, document);
                }
                Staged::Delete(id) => {
                    committed.remove(&id);
                }
                Staged::DeleteAll => {
                    committed.clear();
                    *self.delete_alls.lock() += 1;
                }
            }
        }
        Ok(())
    }
}

#[test]
fn record_backend_round_trip() -> Result<()> {
    let store = Arc::new(MemoryRecordStore::new());
    let backend = BackendFactory::create(BackendConfig::Records(store.clone()))?;
    assert_eq!(backend.kind(), "records");

    let (kept, dropped) = {
        let collection = Collection::new("records", Arc::clone(&backend))?;
        collection.load()?;
        let kept = collection.insert(None, "kept", vec![1.0, 0.0]);
        let dropped = collection.insert(None, "dropped", vec![0.0, 1.0]);
        collection.insert(Some(kept), "kept v2", vec![0.8, 0.6]);
        collection.remove(&dropped);
        collection.flush()?;
        (kept, dropped)
    };

    let reopened = Collection::new("records", backend)?;
    reopened.load()?;
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(&kept).map(|d| d.text), Some("kept v2".to_string()));
    assert!(!reopened.contains(&dropped));
    Ok(())
}

#[test]
fn empty_record_store_loads_empty() -> Result<()> {
    let backend = Arc::new(RecordBackend::new(Arc::new(MemoryRecordStore::new())));
    let collection = Collection::new("nothing", backend)?;
    collection.load()?;
    assert!(collection.is_empty());
    Ok(())
}

#[test]
fn batch_insert_commits_once() -> Result<()> {
    let store = Arc::new(MemoryRecordStore::new());
    let collection = Collection::new("batch", Arc::new(RecordBackend::new(store.clone())))?;

    collection.insert_batch((0..25).map(|i| Document::new(format!("{i}"), vec![i as f32])));
    collection.flush()?;

    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.fetch_all("batch").map_err(TesseraError::from)?.len(), 25);
    Ok(())
}

#[test]
fn failed_writes_surface_on_flush_and_keep_memory_state() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    store.failing.store(true, Ordering::SeqCst);
    let collection = Collection::new("flaky", Arc::new(RecordBackend::new(store.clone())))?;

    let id = collection.insert(None, "survives in memory", vec![0.5, 0.5]);
    let err = collection.flush().unwrap_err();
    assert!(matches!(err, TesseraError::SaveFailed(_)));
    assert!(err.to_string().contains("disk quota exceeded"));
    assert!(collection.contains(&id));

    let stats = collection.persistence_stats();
    assert!(stats.writes_failed >= 1);
    assert_eq!(stats.writes_completed, 0);
    assert!(stats.last_error.is_some());

    // The failure is reported once; later writes succeed again.
    store.failing.store(false, Ordering::SeqCst);
    collection.insert(None, "second", vec![0.1, 0.9]);
    collection.flush()?;
    assert_eq!(collection.persistence_stats().writes_completed, 1);
    Ok(())
}

#[test]
fn rolled_back_writes_are_retried() -> Result<()> {
    let store = Arc::new(RollbackStore::default());
    let collection = Collection::new("retry", Arc::new(RecordBackend::new(store.clone())))?;

    store.failing.store(true, Ordering::SeqCst);
    collection.insert(None, "first", vec![1.0, 0.0]);
    assert!(matches!(
        collection.flush(),
        Err(TesseraError::SaveFailed(_))
    ));
    assert!(store.committed_texts().is_empty());
    assert_eq!(collection.persistence_stats().changes_pending, 1);

    store.failing.store(false, Ordering::SeqCst);
    collection.insert(None, "second", vec![0.0, 1.0]);
    collection.flush()?;

    assert_eq!(store.committed_texts(), vec!["first", "second"]);
    assert_eq!(collection.persistence_stats().changes_pending, 0);
    Ok(())
}

#[test]
fn retry_after_flush_alone_catches_up() -> Result<()> {
    let store = Arc::new(RollbackStore::default());
    let collection = Collection::new("catch_up", Arc::new(RecordBackend::new(store.clone())))?;

    store.failing.store(true, Ordering::SeqCst);
    collection.insert(None, "a", vec![1.0]);
    collection.insert(None, "b", vec![2.0]);
    collection.clear();
    collection.insert(None, "c", vec![3.0]);
    assert!(collection.flush().is_err());

    store.failing.store(false, Ordering::SeqCst);
    collection.flush()?;

    assert_eq!(store.committed_texts(), vec!["c"]);
    assert_eq!(*store.delete_alls.lock(), 1);
    Ok(())
}

#[test]
fn pending_changes_are_retried_on_drop() -> Result<()> {
    let store = Arc::new(RollbackStore::default());
    {
        let collection = Collection::new("dropped", Arc::new(RecordBackend::new(store.clone())))?;
        store.failing.store(true, Ordering::SeqCst);
        collection.insert(None, "late", vec![1.0]);
        assert!(collection.flush().is_err());
        store.failing.store(false, Ordering::SeqCst);
    }

    assert_eq!(store.committed_texts(), vec!["late"]);
    Ok(())
}

#[test]
fn load_leaves_write_failure_for_flush() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    store.failing.store(true, Ordering::SeqCst);
    let collection = Collection::new("unreported", Arc::new(RecordBackend::new(store.clone())))?;

    collection.insert(None, "never committed", vec![1.0]);
    collection.load()?;
    assert!(collection.is_empty());

    let err = collection.flush().unwrap_err();
    assert!(matches!(err, TesseraError::SaveFailed(_)));
    assert!(err.to_string().contains("disk quota exceeded"));

    // Reported once; the dropped change is not retried after the load.
    store.failing.store(false, Ordering::SeqCst);
    collection.flush()?;
    assert_eq!(collection.persistence_stats().changes_pending, 0);
    Ok(())
}
