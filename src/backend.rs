//! Persistence backends for collections.
//!
//! A [`crate::collection::Collection`] keeps its documents in memory and hands
//! every committed mutation to a [`PersistenceBackend`] on its background
//! writer. Two strategies are provided:
//!
//! - [`snapshot::SnapshotBackend`] rewrites one compressed snapshot per
//!   collection through a [`crate::storage::Storage`].
//! - [`records::RecordBackend`] forwards per-document changes to an external
//!   [`records::RecordStore`] and commits them.
//!
//! The collection behaves the same whichever backend is plugged in.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentId};
use crate::error::Result;
use crate::snapshot::DEFAULT_COMPRESSION_LEVEL;
use crate::storage::{StorageConfig, StorageFactory};

pub mod records;
pub mod snapshot;

pub use records::{MemoryRecordStore, RecordBackend, RecordStore};
pub use snapshot::SnapshotBackend;

/// A committed in-memory mutation waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Documents inserted or replaced.
    Upsert(Vec<DocumentId>),
    /// A document removed (whether or not it existed).
    Remove(DocumentId),
    /// Every document removed.
    Clear,
}

/// Read access to the current in-memory state of a collection.
pub trait DocumentView {
    /// All documents in insertion order.
    fn documents(&self) -> Vec<Document>;

    /// A single document, if present.
    fn get(&self, id: &DocumentId) -> Option<Document>;
}

/// Durable storage for collections, keyed by collection name.
pub trait PersistenceBackend: Send + Sync + fmt::Debug {
    /// Short name used in log messages.
    fn kind(&self) -> &'static str;

    /// Load the persisted documents of `collection`.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet. Persisted data
    /// that cannot be decoded is an error, never an empty result.
    fn load(&self, collection: &str) -> Result<Option<Vec<Document>>>;

    /// Persist `changes`, which were committed in this order, given the
    /// current in-memory state.
    fn persist(&self, collection: &str, changes: &[Change], view: &dyn DocumentView)
    -> Result<()>;
}

fn default_extension() -> String {
    "snapshot".to_string()
}

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

/// Configuration of the snapshot-file backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Where snapshot files live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Snapshot file extension; files are named `<collection>.<extension>`.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// zlib compression level (0-9).
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            storage: StorageConfig::default(),
            extension: default_extension(),
            compression_level: default_compression_level(),
        }
    }
}

impl SnapshotConfig {
    pub fn new(storage: StorageConfig) -> Self {
        SnapshotConfig {
            storage,
            ..Default::default()
        }
    }
}

/// Selects the persistence strategy of a collection.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// One compressed snapshot file per collection.
    Snapshot(SnapshotConfig),

    /// Per-document records in an external store.
    Records(Arc<dyn RecordStore>),
}

/// Factory for creating persistence backends from configuration.
pub struct BackendFactory;

impl BackendFactory {
    pub fn create(config: BackendConfig) -> Result<Arc<dyn PersistenceBackend>> {
        match config {
            BackendConfig::Snapshot(snapshot_config) => {
                let storage = StorageFactory::create(snapshot_config.storage.clone())?;
                Ok(Arc::new(SnapshotBackend::with_config(
                    storage,
                    &snapshot_config,
                )))
            }
            BackendConfig::Records(store) => Ok(Arc::new(RecordBackend::new(store))),
        }
    }
}
