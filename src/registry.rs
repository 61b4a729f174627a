//! Process-wide directory of live collections.
//!
//! [`CollectionRegistry`] is an ordinary value: create one at startup, share
//! it (typically behind an `Arc`) with the code that needs it, and call
//! [`CollectionRegistry::reset_all`] to tear everything down. At most one
//! live [`Collection`] exists per name within a registry.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::PersistenceBackend;
use crate::collection::Collection;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live collection without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Return the live collection called `name`, creating it on first use.
    ///
    /// `backend` is only used when the collection is created. A new
    /// collection starts empty; call [`Collection::load`] to read its
    /// persisted state.
    pub fn get_or_create(
        &self,
        name: &str,
        backend: Arc<dyn PersistenceBackend>,
    ) -> Result<Arc<Collection>> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let mut collections = self.collections.write();
        match collections.entry(name.to_string()) {
            Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let collection = Arc::new(Collection::new(name, backend)?);
                log::debug!("registered collection {name:?}");
                Ok(Arc::clone(vacant.insert(collection)))
            }
        }
    }

    /// Drop the registry's handle on `name`.
    ///
    /// The in-memory state is discarded once the last handle goes away; the
    /// persisted state is kept. Returns whether the collection was registered.
    ///
    /// Handles obtained before the release stay live. A later
    /// [`get_or_create`](Self::get_or_create) of the same name then builds a
    /// second instance, and both persist to the same place: the snapshot
    /// ends up holding whichever wrote last. Drop old handles before
    /// recreating a released name.
    pub fn release(&self, name: &str) -> bool {
        let released = self.collections.write().remove(name);
        released.is_some()
    }

    /// Clear every registered collection, in memory and in its backend, then
    /// empty the registry.
    ///
    /// All collections are cleared even if some flushes fail; the first
    /// failure is returned.
    pub fn reset_all(&self) -> Result<()> {
        let collections: Vec<Arc<Collection>> = self
            .collections
            .write()
            .drain()
            .map(|(_, collection)| collection)
            .collect();

        for collection in &collections {
            collection.clear();
        }

        let mut first_error = None;
        for collection in &collections {
            if let Err(e) = collection.flush() {
                log::error!("failed to reset collection {:?}: {e}", collection.name());
                first_error.get_or_insert(e);
            }
        }

        log::info!("reset {} collections", collections.len());
        first_error.map_or(Ok(()), Err)
    }

    /// Wait for the pending writes of every registered collection.
    pub fn flush_all(&self) -> Result<()> {
        let collections: Vec<Arc<Collection>> = self.collections.read().values().cloned().collect();
        let mut first_error = None;
        for collection in &collections {
            if let Err(e) = collection.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Names of the registered collections, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.collections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SnapshotBackend;
    use crate::storage::memory::MemoryStorage;

    fn backend() -> Arc<dyn PersistenceBackend> {
        Arc::new(SnapshotBackend::new(Arc::new(MemoryStorage::new_default())))
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = CollectionRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = CollectionRegistry::new();
        let first = registry.get_or_create("docs", backend()).unwrap();
        let second = registry.get_or_create("docs", backend()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &registry.get("docs").unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_removes_entry() {
        let registry = CollectionRegistry::new();
        registry.get_or_create("docs", backend()).unwrap();
        assert!(registry.release("docs"));
        assert!(!registry.release("docs"));
        assert!(registry.get("docs").is_none());
    }

    #[test]
    fn test_invalid_name_is_not_registered() {
        let registry = CollectionRegistry::new();
        assert!(registry.get_or_create("../etc", backend()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_sorted() {
        let registry = CollectionRegistry::new();
        for name in ["b", "a", "c"] {
            registry.get_or_create(name, backend()).unwrap();
        }
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
        registry.flush_all().unwrap();
    }
}
