//! Named, independently persisted sets of documents.
//!
//! A [`Collection`] keeps its documents in an in-memory table that is always
//! the authoritative state. Mutations take the table's write lock, searches
//! take its read lock. After every mutation the change is queued on the
//! collection's background writer, which persists it through the configured
//! [`PersistenceBackend`] without blocking the caller.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera::backend::SnapshotBackend;
//! use tessera::collection::Collection;
//! use tessera::storage::memory::MemoryStorage;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let backend = Arc::new(SnapshotBackend::new(Arc::new(MemoryStorage::new_default())));
//! let collection = Collection::new("notes", backend)?;
//! collection.load()?;
//!
//! collection.insert(None, "north", vec![1.0, 0.0]);
//! collection.insert(None, "east", vec![0.0, 1.0]);
//!
//! let hits = collection.search(&[0.9, 0.1], 1, None);
//! assert_eq!(hits[0].text, "north");
//! collection.flush()?;
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::backend::{Change, DocumentView, PersistenceBackend};
use crate::document::{Document, DocumentId, SearchResult};
use crate::error::{Result, TesseraError};
use crate::vector::{cosine_similarity, magnitude};

pub mod writer;

pub use writer::PersistenceStats;
use writer::SnapshotWriter;

/// Lifecycle state of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// Constructed; neither loaded nor mutated yet.
    Uninitialized,
    /// Holding an authoritative (possibly empty) document table.
    Ready,
}

#[derive(Debug)]
struct StoredDocument {
    /// Insertion sequence, used as the tie-break between equal scores.
    seq: u64,
    magnitude: f32,
    document: Document,
}

#[derive(Debug, Default)]
struct DocumentTable {
    entries: HashMap<DocumentId, StoredDocument>,
    next_seq: u64,
}

impl DocumentTable {
    fn from_documents(documents: Vec<Document>) -> Self {
        let mut table = DocumentTable::default();
        for document in documents {
            table.upsert(document);
        }
        table
    }

    /// Insert or replace. A replaced document keeps its original sequence.
    fn upsert(&mut self, document: Document) {
        let magnitude = magnitude(&document.embedding);
        match self.entries.entry(document.id) {
            MapEntry::Occupied(mut occupied) => {
                let stored = occupied.get_mut();
                stored.magnitude = magnitude;
                stored.document = document;
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(StoredDocument {
                    seq: self.next_seq,
                    magnitude,
                    document,
                });
                self.next_seq += 1;
            }
        }
    }

    fn remove(&mut self, id: &DocumentId) -> bool {
        self.entries.remove(id).is_some()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }

    fn ordered(&self) -> Vec<&StoredDocument> {
        let mut stored: Vec<&StoredDocument> = self.entries.values().collect();
        stored.sort_by_key(|entry| entry.seq);
        stored
    }
}

/// Best score first, then insertion order.
fn rank(a: &(f32, &StoredDocument), b: &(f32, &StoredDocument)) -> CmpOrdering {
    b.0.total_cmp(&a.0).then(a.1.seq.cmp(&b.1.seq))
}

/// Shared handle on a document table, given to the background writer.
#[derive(Clone)]
struct SharedDocuments(Arc<RwLock<DocumentTable>>);

impl DocumentView for SharedDocuments {
    fn documents(&self) -> Vec<Document> {
        let table = self.0.read();
        table
            .ordered()
            .into_iter()
            .map(|entry| entry.document.clone())
            .collect()
    }

    fn get(&self, id: &DocumentId) -> Option<Document> {
        self.0.read().entries.get(id).map(|entry| entry.document.clone())
    }
}

/// A named set of documents supporting upserts, removals and cosine search.
pub struct Collection {
    name: String,
    documents: SharedDocuments,
    backend: Arc<dyn PersistenceBackend>,
    writer: SnapshotWriter,
    ready: AtomicBool,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("backend", &self.backend.kind())
            .field("len", &self.len())
            .field("state", &self.state())
            .finish()
    }
}

/// Check that `name` can safely key a snapshot file.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TesseraError::invalid_argument("collection name is empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(TesseraError::invalid_argument(format!(
            "collection name {name:?} is not a valid file name"
        )));
    }
    Ok(())
}

impl Collection {
    /// Create an empty collection persisted through `backend`.
    ///
    /// Nothing is read from the backend until [`Collection::load`].
    pub fn new(name: impl Into<String>, backend: Arc<dyn PersistenceBackend>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        let documents = SharedDocuments(Arc::new(RwLock::new(DocumentTable::default())));
        let writer = SnapshotWriter::spawn(name.clone(), Arc::clone(&backend), documents.clone())?;

        Ok(Collection {
            name,
            documents,
            backend,
            writer,
            ready: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn PersistenceBackend> {
        &self.backend
    }

    pub fn state(&self) -> CollectionState {
        if self.ready.load(Ordering::Acquire) {
            CollectionState::Ready
        } else {
            CollectionState::Uninitialized
        }
    }

    fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Insert or replace a document, generating an identifier if none is given.
    ///
    /// Returns the identifier. The snapshot write happens in the background.
    pub fn insert(
        &self,
        id: Option<DocumentId>,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> DocumentId {
        let document = Document::with_id(id.unwrap_or_else(Uuid::new_v4), text, embedding);
        let id = document.id;

        let mut table = self.documents.0.write();
        table.upsert(document);
        self.writer.submit(Change::Upsert(vec![id]));
        drop(table);

        self.mark_ready();
        id
    }

    /// Insert or replace many documents with a single snapshot write.
    ///
    /// On duplicate identifiers within the batch the last one wins.
    pub fn insert_batch(&self, documents: impl IntoIterator<Item = Document>) {
        let mut table = self.documents.0.write();
        let mut ids = Vec::new();
        for document in documents {
            ids.push(document.id);
            table.upsert(document);
        }

        if !ids.is_empty() {
            ids.dedup();
            self.writer.submit(Change::Upsert(ids));
        }
        drop(table);

        self.mark_ready();
    }

    /// Remove a document. Returns whether it was present.
    pub fn remove(&self, id: &DocumentId) -> bool {
        let mut table = self.documents.0.write();
        let removed = table.remove(id);
        self.writer.submit(Change::Remove(*id));
        drop(table);

        self.mark_ready();
        removed
    }

    /// Remove every document and persist the empty state.
    pub fn clear(&self) {
        let mut table = self.documents.0.write();
        table.clear();
        self.writer.submit(Change::Clear);
        drop(table);

        self.mark_ready();
    }

    /// Rank every document by cosine similarity to `query`.
    ///
    /// Results scoring strictly below `threshold` are dropped. At most `k`
    /// results are returned, best first; equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize, threshold: Option<f32>) -> Vec<SearchResult> {
        if k == 0 {
            return Vec::new();
        }

        let query_magnitude = magnitude(query);
        let table = self.documents.0.read();

        let mut hits: Vec<(f32, &StoredDocument)> = table
            .entries
            .values()
            .map(|entry| {
                let score = cosine_similarity(
                    query,
                    &entry.document.embedding,
                    query_magnitude,
                    entry.magnitude,
                );
                (score, entry)
            })
            .filter(|(score, _)| threshold.is_none_or(|t| *score >= t))
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k, rank);
            hits.truncate(k);
        }
        hits.sort_by(rank);

        hits.into_iter()
            .map(|(score, entry)| SearchResult {
                id: entry.document.id,
                text: entry.document.text.clone(),
                score,
            })
            .collect()
    }

    /// Replace the in-memory table with the persisted state.
    ///
    /// Pending writes are drained first and changes still waiting for a retry
    /// are dropped, since the persisted state replaces them. A write failure
    /// seen before the load is still returned by the next [`Collection::flush`].
    /// A collection that was never persisted loads as empty. On error the
    /// in-memory table is left untouched.
    pub fn load(&self) -> Result<()> {
        match self.writer.reset() {
            Ok(Some(error)) => log::warn!(
                "collection {:?}: discarding unpersisted changes before load: {error}",
                self.name
            ),
            Ok(None) => {}
            Err(e) => log::warn!("collection {:?}: {e}", self.name),
        }

        let table = match self.backend.load(&self.name)? {
            Some(documents) => {
                log::info!(
                    "loaded collection {:?} ({} documents)",
                    self.name,
                    documents.len()
                );
                DocumentTable::from_documents(documents)
            }
            None => {
                log::info!(
                    "no persisted state for collection {:?}, starting empty",
                    self.name
                );
                DocumentTable::default()
            }
        };

        *self.documents.0.write() = table;
        self.mark_ready();
        Ok(())
    }

    /// Block until every write queued before this call has finished.
    ///
    /// Returns [`TesseraError::SaveFailed`] if any of them failed.
    pub fn flush(&self) -> Result<()> {
        self.writer.flush()
    }

    /// Counters of the background writes.
    pub fn persistence_stats(&self) -> PersistenceStats {
        self.writer.stats()
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.0.read().entries.contains_key(id)
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.documents()
    }

    pub fn len(&self) -> usize {
        self.documents.0.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
