//! Point id to file location map for one collection.
//!
//! A point's shard directory depends on its vector, so an overwrite with a
//! new vector or a delete cannot compute the old location. The map is keyed
//! by the point's file name (a pure function of the id) and built once by
//! walking the collection tree, which avoids opening any point file.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::storage::fsops;
use crate::types::PointId;

#[derive(Debug, Default)]
pub struct IdMap {
    entries: DashMap<String, PathBuf>,
}

impl IdMap {
    /// Walk `collection_path` and record every point file found.
    pub fn build(collection_path: &Path) -> Self {
        let entries = DashMap::new();
        for path in fsops::collect_point_files(collection_path) {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(previous) = entries.insert(file_name.to_string(), path.clone()) {
                tracing::warn!(
                    "Point file {} duplicated at {} and {}",
                    file_name,
                    previous.display(),
                    path.display()
                );
            }
        }
        tracing::debug!(
            "Built id map for {} with {} points",
            collection_path.display(),
            entries.len()
        );
        Self { entries }
    }

    pub fn get(&self, id: &PointId) -> Option<PathBuf> {
        self.entries.get(&id.file_name()).map(|p| p.value().clone())
    }

    /// Record the new location, returning the previous one if any.
    pub fn insert(&self, id: &PointId, path: PathBuf) -> Option<PathBuf> {
        self.entries.insert(id.file_name(), path)
    }

    pub fn remove(&self, id: &PointId) -> Option<PathBuf> {
        self.entries.remove(&id.file_name()).map(|(_, path)| path)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
