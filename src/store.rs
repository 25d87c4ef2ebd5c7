//! The cache-store collaborator contract.
//!
//! The engine treats storage as an opaque, external concern: a
//! [`CacheStore`] only needs to hold byte blobs keyed by string and
//! report how many it holds. [`InMemoryStore`] is the reference
//! implementation used by the crate's own tests and suitable as a
//! process-local cache; persistent backends are expected to be supplied
//! by the embedding application.

use dashmap::DashMap;

use crate::error::Result;

/// Storage collaborator for cached entries.
///
/// Implementations receive and return the already-encoded bytes of a
/// [`crate::codec::CachedResponse`]; they never need to understand the
/// HTTP semantics layered on top.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Looks up the entry stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores (overwriting) the entry at `key`.
    async fn set(&self, key: String, value: Vec<u8>) -> Result<()>;

    /// Removes the entry at `key`, if present. Not an error if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// The number of entries currently held.
    async fn size(&self) -> Result<usize>;
}

/// A concurrent, process-local [`CacheStore`] backed by [`DashMap`].
///
/// Entries are never evicted on a schedule; callers that want bounded
/// memory use should wrap or replace this with their own backend, e.g.
/// one backed by an LRU policy or disk persistence.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: String, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}
