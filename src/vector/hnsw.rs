//! HNSW graph over cosine distance, backed by `hnsw_rs`.
//!
//! The persisted form is a [`GraphSnapshot`]: construction parameters plus
//! the points the graph was built from, in insertion order. Loading replays
//! the snapshot into a fresh `hnsw_rs` graph, so the file format does not
//! depend on the graph library's internal layout.

use std::fmt;

use anndists::dist::distances::DistCosine;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::PointId;

/// Upper bound on graph height accepted by `hnsw_rs`.
const MAX_LAYERS: usize = 16;

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Links per node on upper layers; layer 0 allows twice as many
    pub m: usize,
    pub ef_construction: usize,
}

impl GraphConfig {
    pub fn new(m: usize, ef_construction: usize) -> Self {
        let m = m.max(2);
        Self {
            m,
            ef_construction: ef_construction.max(m),
        }
    }
}

/// A neighbour found by [`HnswGraph::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct GraphHit {
    pub id: PointId,
    /// Cosine distance, `1 - similarity`
    pub distance: f32,
}

/// Everything needed to rebuild a graph, in the order it was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub config: GraphConfig,
    pub dimension: usize,
    pub ids: Vec<PointId>,
    /// Row-major, `ids.len() * dimension` values
    pub vectors: Vec<f32>,
}

impl GraphSnapshot {
    pub fn new<I>(dimension: usize, config: GraphConfig, items: I) -> Self
    where
        I: IntoIterator<Item = (PointId, Vec<f32>)>,
    {
        let mut ids = Vec::new();
        let mut vectors = Vec::new();
        for (id, vector) in items {
            debug_assert_eq!(vector.len(), dimension);
            ids.push(id);
            vectors.extend_from_slice(&vector);
        }
        Self {
            config,
            dimension,
            ids,
            vectors,
        }
    }

    /// Structural sanity check after deserialization.
    pub fn is_consistent(&self) -> bool {
        self.dimension > 0
            && self.vectors.len() == self.ids.len() * self.dimension
            && self.vectors.iter().all(|x| x.is_finite())
    }
}

pub struct HnswGraph {
    config: GraphConfig,
    dimension: usize,
    ids: Vec<PointId>,
    index: Hnsw<'static, f32, DistCosine>,
}

impl fmt::Debug for HnswGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswGraph")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .field("len", &self.ids.len())
            .finish()
    }
}

impl HnswGraph {
    /// Inserts every snapshot point into a new graph.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let config = snapshot.config;
        let index = Hnsw::<f32, DistCosine>::new(
            config.m,
            snapshot.ids.len().max(1),
            MAX_LAYERS,
            config.ef_construction,
            DistCosine {},
        );
        if snapshot.dimension > 0 {
            for (data_id, vector) in snapshot.vectors.chunks_exact(snapshot.dimension).enumerate() {
                index.insert((vector, data_id));
            }
        }

        Self {
            config,
            dimension: snapshot.dimension,
            ids: snapshot.ids.clone(),
            index,
        }
    }

    pub fn build<I>(dimension: usize, config: GraphConfig, items: I) -> Self
    where
        I: IntoIterator<Item = (PointId, Vec<f32>)>,
    {
        Self::from_snapshot(&GraphSnapshot::new(dimension, config, items))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Approximate `k` nearest neighbours of `query`, closest first.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Vec<GraphHit> {
        if self.is_empty() || k == 0 || query.len() != self.dimension {
            return Vec::new();
        }

        let mut hits: Vec<GraphHit> = self
            .index
            .search(query, k, ef.max(k))
            .into_iter()
            .filter_map(|neighbour| {
                Some(GraphHit {
                    id: self.ids.get(neighbour.d_id)?.clone(),
                    distance: neighbour.distance,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        hits
    }
}
