//! Per-store cache of parsed collection metadata.
//!
//! Upserts need `vector_size` and the quantization geometry on every call.
//! The cache keeps parsed metadata per collection name so the JSON file is
//! read once per cache lifetime; every rewrite of the file goes through
//! [`MetadataCache::insert`] so the cached copy never lags behind disk.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StoreResult;
use crate::storage::metadata::CollectionMeta;

#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<String, Arc<CollectionMeta>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached metadata for `name`, running `load` on a miss.
    ///
    /// The lock is held across the load so concurrent first accesses read
    /// the file only once.
    pub fn get_or_load<F>(&self, name: &str, load: F) -> StoreResult<Arc<CollectionMeta>>
    where
        F: FnOnce() -> StoreResult<CollectionMeta>,
    {
        let mut entries = self.entries.lock();
        if let Some(meta) = entries.get(name) {
            return Ok(Arc::clone(meta));
        }
        let meta = Arc::new(load()?);
        entries.insert(name.to_string(), Arc::clone(&meta));
        Ok(meta)
    }

    /// Replace the cached entry after metadata was written.
    pub fn insert(&self, meta: CollectionMeta) -> Arc<CollectionMeta> {
        let meta = Arc::new(meta);
        self.entries
            .lock()
            .insert(meta.name.clone(), Arc::clone(&meta));
        meta
    }

    pub fn invalidate(&self, name: &str) {
        self.entries.lock().remove(name);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
