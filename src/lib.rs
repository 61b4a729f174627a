//! # Tessera
//!
//! An embedded vector store for Rust.
//!
//! ## Features
//!
//! - Named collections of text + embedding documents held in memory
//! - Exact cosine-similarity top-K search with optional score threshold
//! - Asynchronous, ordered persistence on a per-collection writer thread
//! - Compressed, checksummed snapshot files or a pluggable record store
//! - Explicit collection registry with create-on-demand, release and reset

pub mod backend;
pub mod cli;
pub mod collection;
pub mod document;
pub mod error;
pub mod registry;
pub mod snapshot;
pub mod storage;
pub mod vector;

pub mod prelude {
    pub use crate::backend::{BackendConfig, BackendFactory, PersistenceBackend, SnapshotConfig};
    pub use crate::collection::Collection;
    pub use crate::document::{Document, DocumentId, SearchResult};
    pub use crate::error::{Result, TesseraError};
    pub use crate::registry::CollectionRegistry;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
