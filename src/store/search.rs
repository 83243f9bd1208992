//! Search results and the timing report that names the strategy used.

use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{Payload, PointId};
use crate::vector::types::Score;

/// Strategy that produced a result set, in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    HnswIndex,
    BinaryIndex,
    QuantizedLookup,
    FullScan,
}

impl SearchPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPath::HnswIndex => "hnsw_index",
            SearchPath::BinaryIndex => "binary_index",
            SearchPath::QuantizedLookup => "quantized_lookup",
            SearchPath::FullScan => "full_scan",
        }
    }

    /// True for the correctness fallbacks used when no fresh index exists
    pub fn is_fallback(&self) -> bool {
        matches!(self, SearchPath::QuantizedLookup | SearchPath::FullScan)
    }
}

impl std::fmt::Display for SearchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the active index was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No artifact on disk
    IndexAbsent,
    /// HNSW graph flagged stale and not yet rebuilt
    IndexStale,
    /// Artifact exists but could not be read
    IndexUnreadable,
    /// Writes landed inside an open indexing bracket
    PendingWrites,
    /// Point files changed after the last rebuild, seen through the
    /// persisted dirty flag or an entry count that disagrees with storage
    IndexBehind,
}

/// Whether a result came from a fresh index or a fallback scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Staleness {
    Fresh,
    Fallback,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: PointId,
    pub score: Score,
    pub payload: Payload,
    pub staleness: Staleness,
}

/// Per-stage costs keyed `<stage>_ms`, plus `search_path`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchTiming {
    pub search_path: SearchPath,
    #[serde(flatten)]
    stages: Map<String, Value>,
}

impl SearchTiming {
    pub(crate) fn new(search_path: SearchPath) -> Self {
        Self {
            search_path,
            stages: Map::new(),
        }
    }

    pub(crate) fn record(&mut self, stage: &str, started: Instant) {
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        let key = format!("{stage}_ms");
        let total = self.stages.get(&key).and_then(Value::as_f64).unwrap_or(0.0) + ms;
        self.stages.insert(key, Value::from(total));
    }

    /// Milliseconds spent in `stage`, e.g. `stage_ms("rerank")`
    pub fn stage_ms(&self, stage: &str) -> Option<f64> {
        self.stages.get(&format!("{stage}_ms")).and_then(Value::as_f64)
    }

    pub fn stages(&self) -> impl Iterator<Item = (&str, f64)> {
        self.stages
            .iter()
            .filter_map(|(k, v)| Some((k.as_str(), v.as_f64()?)))
    }

    /// Flat map form: `search_path` first, then each stage
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("search_path".to_string(), self.search_path.as_str().into());
        map.extend(self.stages.clone());
        map
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub search_path: SearchPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<SearchTiming>,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.id.as_str()).collect()
    }
}
