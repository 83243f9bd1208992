//! Counters for the expensive things a store does.
//!
//! They exist so callers and tests can observe how often indexes are rebuilt
//! and how often metadata is parsed from disk.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct StoreEvents {
    binary_rebuilds: AtomicU64,
    hnsw_rebuilds: AtomicU64,
    hnsw_stale_marks: AtomicU64,
    metadata_reads: AtomicU64,
}

/// Point-in-time copy of [`StoreEvents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub binary_rebuilds: u64,
    pub hnsw_rebuilds: u64,
    pub hnsw_stale_marks: u64,
    pub metadata_reads: u64,
}

impl EventCounts {
    /// Index rebuilds of either kind
    pub fn rebuilds(&self) -> u64 {
        self.binary_rebuilds + self.hnsw_rebuilds
    }
}

impl StoreEvents {
    pub(crate) fn binary_rebuilt(&self) {
        self.binary_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hnsw_rebuilt(&self) {
        self.hnsw_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hnsw_marked_stale(&self) {
        self.hnsw_stale_marks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn metadata_read(&self) {
        self.metadata_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EventCounts {
        EventCounts {
            binary_rebuilds: self.binary_rebuilds.load(Ordering::Relaxed),
            hnsw_rebuilds: self.hnsw_rebuilds.load(Ordering::Relaxed),
            hnsw_stale_marks: self.hnsw_stale_marks.load(Ordering::Relaxed),
            metadata_reads: self.metadata_reads.load(Ordering::Relaxed),
        }
    }
}
