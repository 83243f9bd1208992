//! Filesystem vector store.
//!
//! Owns collection lifecycle, the `begin_indexing` / `end_indexing` bracket,
//! per-point upserts and the search dispatcher.
//!
//! # Indexing Bracket
//!
//! Outside a bracket every upsert rebuilds the active index, so N upserts
//! cost N full rebuilds. Inside a bracket upserts only write point files;
//! `end_indexing` rebuilds once. While a bracket has unindexed writes the
//! index on disk is behind, and search falls back to scanning point files.
//!
//! The collection metadata carries an `index_dirty` flag that is persisted
//! before any point file changes and cleared by the next completed rebuild.
//! A store reopened after a crash or in the middle of another process's
//! bracket sees the flag and does not trust the index.
//!
//! # Search Dispatch
//!
//! `hnsw_index` (fresh graph) → `binary_index` (readable Hamming index) →
//! `quantized_lookup` (shard directories around the query's own code) →
//! `full_scan`. Every strategy only shortlists; the final ranking is exact
//! cosine similarity on the stored full-precision vectors.

mod events;
mod search;

pub use events::{EventCounts, StoreEvents};
pub use search::{
    FallbackReason, SearchPath, SearchResponse, SearchResult, SearchTiming, Staleness,
};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{ConfigurationError, CorruptionError, CorruptionKind, IoContext, StoreError, StoreResult};
use crate::storage::metadata::timestamp_now;
use crate::storage::{CollectionMeta, IdMap, META_FILE, MetadataCache, PointRecord, fsops};
use crate::types::{IndexType, Point, PointId};
use crate::vector::binary_index::{self, BinaryIndex};
use crate::vector::distance::cosine_similarity;
use crate::vector::hnsw::{GraphConfig, HnswGraph};
use crate::vector::hnsw_manager::{HnswIndexManager, HnswStatus};
use crate::vector::projection::{ProjectionMatrix, create_projection_matrix, load_matrix, save_matrix};
use crate::vector::quantizer::{QuantizedCode, VectorQuantizer};
use crate::vector::types::{QuantizationRange, Score, VectorDimension};

/// Longest accepted collection name
const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Open indexing bracket of one collection.
#[derive(Debug, Default)]
struct Bracket {
    pending_writes: AtomicUsize,
}

/// Returned by [`FilesystemVectorStore::end_indexing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndIndexingReport {
    pub status: &'static str,
    pub vectors_indexed: usize,
    pub collection: String,
    pub hnsw_skipped: bool,
}

/// Summary of a collection for display.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    #[serde(flatten)]
    pub meta: CollectionMeta,
    pub point_count: usize,
    /// `built`, `behind`, `stale`, `absent` or `unreadable`
    pub index_status: &'static str,
    pub indexing_open: bool,
    pub pending_writes: usize,
}

fn validate_collection_name(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() {
        Some("name cannot be empty")
    } else if name.len() > MAX_COLLECTION_NAME_LEN {
        Some("name is longer than 128 bytes")
    } else if name.starts_with('.') {
        Some("name cannot start with '.'")
    } else if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        Some("only ASCII letters, digits, '_', '-' and '.' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigurationError::InvalidCollectionName {
            name: name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}

fn quantizer_for(meta: &CollectionMeta) -> StoreResult<VectorQuantizer> {
    VectorQuantizer::new(
        meta.bits_per_dimension,
        meta.depth_factor,
        meta.quantization_range,
    )
}

/// Embedded vector database rooted at one directory.
///
/// All operations take `&self`; the store is `Send + Sync` and meant to be
/// shared across ingestion worker threads.
#[derive(Debug)]
pub struct FilesystemVectorStore {
    base_path: PathBuf,
    settings: Settings,
    metadata: MetadataCache,
    matrices: DashMap<String, Arc<ProjectionMatrix>>,
    id_maps: DashMap<String, Arc<IdMap>>,
    graphs: DashMap<String, Arc<HnswGraph>>,
    brackets: DashMap<String, Bracket>,
    rebuild_locks: DashMap<String, Arc<Mutex<()>>>,
    events: StoreEvents,
}

impl FilesystemVectorStore {
    /// Opens (creating if needed) a store at `base_path` with default settings.
    pub fn new(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let mut settings = Settings::default();
        settings.store.base_path = base_path.into();
        Self::with_settings(settings)
    }

    /// Opens a store at `settings.store.base_path`.
    pub fn with_settings(settings: Settings) -> StoreResult<Self> {
        let base_path = settings.store.base_path.clone();
        fs::create_dir_all(&base_path).with_path(&base_path)?;
        debug!("Opened vector store at {}", base_path.display());

        Ok(Self {
            base_path,
            settings,
            metadata: MetadataCache::new(),
            matrices: DashMap::new(),
            id_maps: DashMap::new(),
            graphs: DashMap::new(),
            brackets: DashMap::new(),
            rebuild_locks: DashMap::new(),
            events: StoreEvents::default(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot of rebuild and metadata-read counters.
    pub fn events(&self) -> EventCounts {
        self.events.snapshot()
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn meta(&self, name: &str) -> StoreResult<Arc<CollectionMeta>> {
        validate_collection_name(name)?;
        let path = self.collection_path(name);
        self.metadata.get_or_load(name, || {
            if !path.is_dir() {
                return Err(StoreError::collection_not_found(name));
            }
            self.events.metadata_read();
            debug!("Reading metadata for collection '{name}'");
            CollectionMeta::load(&path)
        })
    }

    fn save_meta(&self, collection_path: &Path, meta: CollectionMeta) -> StoreResult<Arc<CollectionMeta>> {
        meta.save(collection_path)?;
        Ok(self.metadata.insert(meta))
    }

    fn matrix(&self, meta: &CollectionMeta, collection_path: &Path) -> StoreResult<Arc<ProjectionMatrix>> {
        if let Some(matrix) = self.matrices.get(&meta.name) {
            return Ok(Arc::clone(matrix.value()));
        }
        let matrix = load_matrix(collection_path)?;
        if matrix.input_dim() != meta.vector_size || matrix.output_dim() != meta.reduced_dimensions {
            return Err(CorruptionError::unparsable(
                collection_path.join(crate::vector::projection::MATRIX_FILE),
                format!(
                    "matrix is {}x{}, collection expects {}x{}",
                    matrix.input_dim(),
                    matrix.output_dim(),
                    meta.vector_size,
                    meta.reduced_dimensions
                ),
            )
            .into());
        }
        let matrix = Arc::new(matrix);
        self.matrices.insert(meta.name.clone(), Arc::clone(&matrix));
        Ok(matrix)
    }

    fn id_map(&self, name: &str, collection_path: &Path) -> Arc<IdMap> {
        Arc::clone(
            self.id_maps
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(IdMap::build(collection_path)))
                .value(),
        )
    }

    fn rebuild_lock(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.rebuild_locks.entry(name.to_string()).or_default().value())
    }

    fn query_code(
        &self,
        meta: &CollectionMeta,
        collection_path: &Path,
        query: &[f32],
    ) -> StoreResult<QuantizedCode> {
        let matrix = self.matrix(meta, collection_path)?;
        Ok(quantizer_for(meta)?.quantize(&matrix, query))
    }

    /// Creates an empty collection using the binary index.
    ///
    /// The directory is assembled under a hidden staging name and renamed
    /// into place, so a collection never exists half-written.
    pub fn create_collection(&self, name: &str, vector_size: usize) -> StoreResult<()> {
        validate_collection_name(name)?;
        let dimension = VectorDimension::new(vector_size)?;
        let path = self.collection_path(name);
        let exists = || -> StoreError {
            ConfigurationError::CollectionExists {
                name: name.to_string(),
            }
            .into()
        };
        if path.exists() {
            return Err(exists());
        }

        let q = &self.settings.quantization;
        let range = QuantizationRange::new(q.range_min, q.range_max)?;
        let reduced = q.reduced_dimensions.clamp(1, dimension.get());
        let quantizer = VectorQuantizer::new(q.bits_per_dimension, q.depth_factor, range)?;
        let meta = CollectionMeta::new(
            name,
            vector_size,
            range,
            reduced,
            q.bits_per_dimension,
            q.depth_factor,
        );
        let matrix = create_projection_matrix(vector_size, reduced);

        let staging = self.base_path.join(fsops::temp_name(name));
        let populate = || -> StoreResult<()> {
            fs::create_dir_all(&staging).with_path(&staging)?;
            save_matrix(&matrix, &staging)?;
            binary_index::write_index(
                &staging.join(IndexType::Binary.artifact_name()),
                quantizer.code_len(reduced),
                &[],
            )?;
            meta.save(&staging)
        };
        if let Err(e) = populate() {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_dir_all(&staging);
            if path.exists() {
                return Err(exists());
            }
            return Err(StoreError::io(&path, e));
        }

        self.matrices.insert(name.to_string(), Arc::new(matrix));
        self.id_maps.insert(name.to_string(), Arc::new(IdMap::default()));
        self.metadata.insert(meta);
        info!("Created collection '{name}' ({vector_size} dimensions, {reduced} reduced)");
        Ok(())
    }

    /// Switches the active index type.
    ///
    /// The new artifact is built from the stored vectors and the other one is
    /// deleted, so exactly one artifact exists afterwards.
    pub fn set_index_type(&self, name: &str, index_type: IndexType) -> StoreResult<()> {
        self.meta(name)?;
        let lock = self.rebuild_lock(name);
        let _guard = lock.lock();

        let path = self.collection_path(name);
        let mut meta = (*self.meta(name)?).clone();
        if meta.index_type == index_type && path.join(index_type.artifact_name()).exists() {
            self.remove_inactive_artifact(&path, index_type)?;
            return Ok(());
        }

        let previous = meta.index_type;
        meta.set_index_type(
            index_type,
            self.settings.hnsw.m,
            self.settings.hnsw.ef_construction,
        );
        self.graphs.remove(name);
        let count = self.rebuild_locked(name, &path, meta)?;
        info!("Collection '{name}' switched from {previous} to {index_type} ({count} vectors)");
        Ok(())
    }

    /// Writes or overwrites points.
    ///
    /// Every vector is validated before anything is written. Outside an
    /// indexing bracket the active index is rebuilt afterwards.
    pub fn upsert_points(&self, name: &str, points: Vec<Point>) -> StoreResult<usize> {
        let meta = self.meta(name)?;
        let dimension = VectorDimension::new(meta.vector_size)?;
        for point in &points {
            dimension.validate_point(point.id.as_str(), &point.vector)?;
        }
        if points.is_empty() {
            return Ok(0);
        }

        let path = self.collection_path(name);
        let matrix = self.matrix(&meta, &path)?;
        let quantizer = quantizer_for(&meta)?;
        let id_map = self.id_map(name, &path);
        self.mark_index_dirty(name, &path)?;

        let written = points.len();
        for point in points {
            let code = quantizer.quantize(&matrix, &point.vector);
            let file_path = quantizer.shard_dir(&path, &code).join(point.id.file_name());
            let id = point.id.clone();
            PointRecord::new(point, code.to_hex()).write(&file_path)?;

            // Same id with a new vector may land in another shard
            if let Some(previous) = id_map.insert(&id, file_path.clone()) {
                if previous != file_path {
                    fsops::remove_file_if_exists(&previous)?;
                    if let Some(dir) = previous.parent() {
                        fsops::prune_empty_dirs(dir, &path);
                    }
                }
            }
        }

        self.after_write(name, written)?;
        Ok(written)
    }

    /// Removes points by id and returns how many existed.
    pub fn delete_points(&self, name: &str, ids: &[PointId]) -> StoreResult<usize> {
        self.meta(name)?;
        let path = self.collection_path(name);
        let id_map = self.id_map(name, &path);
        if ids.iter().any(|id| id_map.get(id).is_some()) {
            self.mark_index_dirty(name, &path)?;
        }

        let mut removed = 0;
        for id in ids {
            let Some(file) = id_map.remove(id) else {
                continue;
            };
            if fsops::remove_file_if_exists(&file)? {
                removed += 1;
            }
            if let Some(dir) = file.parent() {
                fsops::prune_empty_dirs(dir, &path);
            }
        }

        if removed > 0 {
            self.after_write(name, removed)?;
        }
        Ok(removed)
    }

    /// Persists `index_dirty` unless it is already set.
    fn mark_index_dirty(&self, name: &str, path: &Path) -> StoreResult<()> {
        if self.meta(name)?.index_dirty {
            return Ok(());
        }
        let lock = self.rebuild_lock(name);
        let _guard = lock.lock();

        let mut meta = (*self.meta(name)?).clone();
        if !meta.index_dirty {
            meta.index_dirty = true;
            self.save_meta(path, meta)?;
            debug!("Marked index of '{name}' dirty");
        }
        Ok(())
    }

    fn after_write(&self, name: &str, changed: usize) -> StoreResult<()> {
        if let Some(bracket) = self.brackets.get(name) {
            bracket.pending_writes.fetch_add(changed, Ordering::Relaxed);
            return Ok(());
        }
        self.rebuild_index(name).map(|_| ())
    }

    /// Opens a bulk-write bracket. Opening an already open bracket is a no-op.
    pub fn begin_indexing(&self, name: &str) -> StoreResult<()> {
        self.meta(name)?;
        self.brackets.entry(name.to_string()).or_default();
        debug!("Indexing bracket opened for '{name}'");
        Ok(())
    }

    /// True while a bracket is open for `name`.
    pub fn is_indexing(&self, name: &str) -> bool {
        self.brackets.contains_key(name)
    }

    /// Closes the bracket and brings the active index up to date once.
    ///
    /// With `skip_hnsw_rebuild` an HNSW collection only has its graph marked
    /// stale; the rebuild is left to a later [`rebuild_index`] call.
    ///
    /// [`rebuild_index`]: Self::rebuild_index
    pub fn end_indexing(&self, name: &str, skip_hnsw_rebuild: bool) -> StoreResult<EndIndexingReport> {
        self.meta(name)?;
        let lock = self.rebuild_lock(name);
        let _guard = lock.lock();

        let pending = self
            .brackets
            .remove(name)
            .map_or(0, |(_, bracket)| bracket.pending_writes.into_inner());
        let path = self.collection_path(name);
        let mut meta = (*self.meta(name)?).clone();
        let hnsw_skipped = meta.index_type == IndexType::Hnsw && skip_hnsw_rebuild;

        let vectors_indexed = if hnsw_skipped {
            let manager = HnswIndexManager::new(&path);
            if !manager.mark_stale()? {
                warn!("Collection '{name}' has no HNSW graph to mark stale");
            }
            self.events.hnsw_marked_stale();

            let count = self.id_map(name, &path).len();
            meta.vector_count = count;
            meta.updated_at = timestamp_now();
            self.save_meta(&path, meta)?;
            count
        } else {
            self.rebuild_locked(name, &path, meta)?
        };

        info!(
            "Indexing bracket closed for '{name}': {pending} pending writes, {vectors_indexed} vectors, hnsw_skipped={hnsw_skipped}"
        );
        Ok(EndIndexingReport {
            status: "ok",
            vectors_indexed,
            collection: name.to_string(),
            hnsw_skipped,
        })
    }

    /// Rebuilds the active index from every stored vector.
    ///
    /// This is the call that clears HNSW staleness after watch-mode batches.
    pub fn rebuild_index(&self, name: &str) -> StoreResult<usize> {
        self.meta(name)?;
        let lock = self.rebuild_lock(name);
        let _guard = lock.lock();

        let path = self.collection_path(name);
        let meta = (*self.meta(name)?).clone();
        self.rebuild_locked(name, &path, meta)
    }

    /// Caller holds the collection's rebuild lock.
    fn rebuild_locked(&self, name: &str, path: &Path, mut meta: CollectionMeta) -> StoreResult<usize> {
        if let Some(bracket) = self.brackets.get(name) {
            bracket.pending_writes.store(0, Ordering::Relaxed);
        }

        let records = self.load_all_records(name, path)?;
        let count = records.len();

        match meta.index_type {
            IndexType::Binary => {
                let matrix = self.matrix(&meta, path)?;
                let quantizer = quantizer_for(&meta)?;
                let code_len = quantizer.code_len(meta.reduced_dimensions);
                let entries: Vec<(PointId, Vec<u8>)> = records
                    .into_par_iter()
                    .map(|record| {
                        let code = record
                            .code_bytes()
                            .filter(|code| code.len() == code_len)
                            .unwrap_or_else(|| quantizer.quantize(&matrix, &record.vector).into_bytes());
                        (record.id, code)
                    })
                    .collect();
                binary_index::write_index(&path.join(binary_index::INDEX_FILE), code_len, &entries)?;
                self.events.binary_rebuilt();
            }
            IndexType::Hnsw => {
                let (m, ef_construction) = meta.hnsw.map_or(
                    (self.settings.hnsw.m, self.settings.hnsw.ef_construction),
                    |params| (params.m, params.ef_construction),
                );
                let config = GraphConfig::new(m, ef_construction);
                let graph = HnswIndexManager::new(path).rebuild_from_vectors(
                    meta.vector_size,
                    config,
                    records.into_iter().map(|record| (record.id, record.vector)),
                )?;
                self.graphs.insert(name.to_string(), Arc::new(graph));
                self.events.hnsw_rebuilt();
            }
        }

        let index_type = meta.index_type;
        meta.record_rebuild(count);
        self.save_meta(path, meta)?;
        self.remove_inactive_artifact(path, index_type)?;
        debug!("Rebuilt {index_type} index for '{name}' with {count} vectors");
        Ok(count)
    }

    fn remove_inactive_artifact(&self, path: &Path, active: IndexType) -> StoreResult<()> {
        let inactive = active.other();
        if fsops::remove_file_if_exists(&path.join(inactive.artifact_name()))? {
            debug!("Removed inactive {inactive} artifact under {}", path.display());
        }
        Ok(())
    }

    /// Every stored point, sorted by id.
    fn load_all_records(&self, name: &str, path: &Path) -> StoreResult<Vec<PointRecord>> {
        let id_map = self.id_map(name, path);
        let mut records = id_map
            .paths()
            .par_iter()
            .map(|file| PointRecord::read(file))
            .collect::<StoreResult<Vec<_>>>()?;
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Ranked nearest neighbours of `query`.
    ///
    /// Missing, stale or unreadable indexes are not errors; the response's
    /// `search_path`, `fallback_reason` and per-result `staleness` say what
    /// happened instead.
    pub fn search(
        &self,
        query: &[f32],
        name: &str,
        limit: usize,
        return_timing: bool,
    ) -> StoreResult<SearchResponse> {
        let total = Instant::now();
        let mut timing = SearchTiming::new(SearchPath::FullScan);

        let started = Instant::now();
        let meta = self.meta(name)?;
        VectorDimension::new(meta.vector_size)?.validate_query(query)?;
        let path = self.collection_path(name);
        timing.record("metadata", started);

        let search = &self.settings.search;
        let shortlist = limit
            .saturating_mul(search.oversample_factor)
            .max(search.min_candidates)
            .max(limit);
        let pending = self
            .brackets
            .get(name)
            .is_some_and(|bracket| bracket.pending_writes.load(Ordering::Relaxed) > 0);

        let started = Instant::now();
        let id_map = self.id_map(name, &path);
        let indexed = if pending {
            Err(FallbackReason::PendingWrites)
        } else {
            match meta.index_type {
                IndexType::Hnsw => self.hnsw_shortlist(&meta, &path, id_map.len(), query, shortlist),
                IndexType::Binary => {
                    self.binary_shortlist(&meta, &path, id_map.len(), query, shortlist)?
                }
            }
        };

        let (search_path, candidates, fallback_reason) = match indexed {
            Ok((search_path, ids)) => {
                let files: Vec<PathBuf> = ids.iter().filter_map(|id| id_map.get(id)).collect();
                (search_path, files, None)
            }
            Err(reason) => {
                debug!("Search on '{name}' falling back: {reason:?}");
                let (search_path, files) = self.fallback_candidates(&meta, &path, &id_map, query, limit)?;
                (search_path, files, Some(reason))
            }
        };
        timing.search_path = search_path;
        timing.record("candidates", started);

        let started = Instant::now();
        let records = self.read_candidates(&candidates)?;
        timing.record("load", started);

        let started = Instant::now();
        let staleness = if search_path.is_fallback() {
            Staleness::Fallback
        } else {
            Staleness::Fresh
        };
        let mut results: Vec<SearchResult> = records
            .into_iter()
            .filter(|record| record.vector.len() == query.len())
            .map(|record| SearchResult {
                score: Score::new(cosine_similarity(query, &record.vector)),
                id: record.id,
                payload: record.payload,
                staleness,
            })
            .collect();
        results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(limit);
        timing.record("rerank", started);
        timing.record("total", total);

        Ok(SearchResponse {
            results,
            search_path,
            fallback_reason,
            timing: return_timing.then_some(timing),
        })
    }

    fn hnsw_shortlist(
        &self,
        meta: &CollectionMeta,
        path: &Path,
        stored: usize,
        query: &[f32],
        shortlist: usize,
    ) -> Result<(SearchPath, Vec<PointId>), FallbackReason> {
        let name = meta.name.as_str();
        let manager = HnswIndexManager::new(path);
        match manager.status() {
            Ok(HnswStatus::Built) => {}
            Ok(HnswStatus::Stale) => return Err(FallbackReason::IndexStale),
            Ok(HnswStatus::Absent) => return Err(FallbackReason::IndexAbsent),
            Err(e) => {
                warn!("Ignoring unreadable HNSW graph for '{name}': {e}");
                return Err(FallbackReason::IndexUnreadable);
            }
        }
        if meta.index_dirty {
            return Err(FallbackReason::IndexBehind);
        }

        let cached = self.graphs.get(name).map(|graph| Arc::clone(graph.value()));
        let graph = match cached {
            Some(graph) => graph,
            None => match manager.load() {
                Ok(graph) => {
                    let graph = Arc::new(graph);
                    self.graphs.insert(name.to_string(), Arc::clone(&graph));
                    graph
                }
                Err(e) => {
                    warn!("Ignoring unreadable HNSW graph for '{name}': {e}");
                    return Err(FallbackReason::IndexUnreadable);
                }
            },
        };

        if graph.len() != stored {
            debug!("HNSW graph of '{name}' has {} points, {stored} stored", graph.len());
            return Err(FallbackReason::IndexBehind);
        }

        let ef = self.settings.hnsw.ef_search.max(shortlist);
        let ids = graph
            .search(query, shortlist, ef)
            .into_iter()
            .map(|hit| hit.id)
            .collect();
        Ok((SearchPath::HnswIndex, ids))
    }

    /// Inner `Err` is a fallback; outer `Err` is a fatal matrix problem.
    fn binary_shortlist(
        &self,
        meta: &CollectionMeta,
        path: &Path,
        stored: usize,
        query: &[f32],
        shortlist: usize,
    ) -> StoreResult<Result<(SearchPath, Vec<PointId>), FallbackReason>> {
        let index = match BinaryIndex::open(&path.join(binary_index::INDEX_FILE)) {
            Ok(index) => index,
            Err(StoreError::Corruption(e)) if e.kind == CorruptionKind::Missing => {
                return Ok(Err(FallbackReason::IndexAbsent));
            }
            Err(e) => {
                warn!("Ignoring unreadable binary index for '{}': {e}", meta.name);
                return Ok(Err(FallbackReason::IndexUnreadable));
            }
        };
        if meta.index_dirty || index.len() != stored {
            debug!(
                "Binary index of '{}' is behind: {} entries, {stored} stored, dirty={}",
                meta.name,
                index.len(),
                meta.index_dirty
            );
            return Ok(Err(FallbackReason::IndexBehind));
        }

        let code = self.query_code(meta, path, query)?;
        match index.search(code.as_bytes(), shortlist) {
            Ok(hits) => Ok(Ok((
                SearchPath::BinaryIndex,
                hits.into_iter().map(|hit| hit.id).collect(),
            ))),
            Err(e) => {
                warn!("Ignoring unreadable binary index for '{}': {e}", meta.name);
                Ok(Err(FallbackReason::IndexUnreadable))
            }
        }
    }

    /// Scans the query's own shard, widening one level at a time until at
    /// least `limit` points are in range. Widening to the collection root is
    /// a full scan.
    fn fallback_candidates(
        &self,
        meta: &CollectionMeta,
        path: &Path,
        id_map: &IdMap,
        query: &[f32],
        limit: usize,
    ) -> StoreResult<(SearchPath, Vec<PathBuf>)> {
        let code = self.query_code(meta, path, query)?;
        let segments = quantizer_for(meta)?.shard_segments(&code);

        for depth in (1..=segments.len()).rev() {
            let dir = segments[..depth]
                .iter()
                .fold(path.to_path_buf(), |dir, segment| dir.join(segment));
            let files = fsops::collect_point_files(&dir);
            if !files.is_empty() && files.len() >= limit {
                return Ok((SearchPath::QuantizedLookup, files));
            }
        }
        Ok((SearchPath::FullScan, id_map.paths()))
    }

    /// Reads shortlisted point files in parallel. Files deleted since they
    /// were listed are skipped.
    fn read_candidates(&self, files: &[PathBuf]) -> StoreResult<Vec<PointRecord>> {
        files
            .par_iter()
            .filter_map(|file| match PointRecord::read(file) {
                Err(StoreError::Corruption(e)) if e.kind == CorruptionKind::Missing => None,
                other => Some(other),
            })
            .collect()
    }

    /// Stored point by id.
    pub fn get_point(&self, name: &str, id: &PointId) -> StoreResult<Option<Point>> {
        self.meta(name)?;
        let path = self.collection_path(name);
        match self.id_map(name, &path).get(id) {
            Some(file) => Ok(Some(PointRecord::read(&file)?.into_point())),
            None => Ok(None),
        }
    }

    pub fn count_points(&self, name: &str) -> StoreResult<usize> {
        self.meta(name)?;
        let path = self.collection_path(name);
        Ok(self.id_map(name, &path).len())
    }

    /// Embedding size of a collection, served from the metadata cache.
    pub fn vector_size(&self, name: &str) -> StoreResult<usize> {
        Ok(self.meta(name)?.vector_size)
    }

    /// Removes every point but keeps the collection, its matrix and its
    /// index type. The active artifact is rewritten empty.
    pub fn clear_collection(&self, name: &str) -> StoreResult<usize> {
        self.meta(name)?;
        let lock = self.rebuild_lock(name);
        let _guard = lock.lock();

        let path = self.collection_path(name);
        let id_map = self.id_map(name, &path);
        let removed = id_map.len();
        let mut meta = (*self.meta(name)?).clone();
        meta.index_dirty = true;
        self.save_meta(&path, meta)?;

        for entry in fs::read_dir(&path).with_path(&path)? {
            let entry = entry.with_path(&path)?;
            if entry.file_type().with_path(&entry.path())?.is_dir() {
                fs::remove_dir_all(entry.path()).with_path(&entry.path())?;
            }
        }
        id_map.clear();

        let meta = (*self.meta(name)?).clone();
        self.rebuild_locked(name, &path, meta)?;
        info!("Cleared {removed} points from '{name}'");
        Ok(removed)
    }

    /// Deletes the collection directory and forgets everything cached about it.
    pub fn delete_collection(&self, name: &str) -> StoreResult<()> {
        validate_collection_name(name)?;
        let path = self.collection_path(name);
        if !path.is_dir() {
            return Err(StoreError::collection_not_found(name));
        }

        {
            let lock = self.rebuild_lock(name);
            let _guard = lock.lock();
            match fs::remove_dir_all(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
            self.metadata.invalidate(name);
            self.matrices.remove(name);
            self.id_maps.remove(name);
            self.graphs.remove(name);
            self.brackets.remove(name);
        }
        self.rebuild_locks.remove(name);
        info!("Deleted collection '{name}'");
        Ok(())
    }

    /// Names of all collections, sorted.
    pub fn list_collections(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.base_path, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join(META_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        validate_collection_name(name).is_ok()
            && self.collection_path(name).join(META_FILE).is_file()
    }

    pub fn collection_info(&self, name: &str) -> StoreResult<CollectionInfo> {
        let meta = self.meta(name)?;
        let path = self.collection_path(name);
        let point_count = self.id_map(name, &path).len();

        let index_status = match meta.index_type {
            IndexType::Binary => match BinaryIndex::open(&path.join(binary_index::INDEX_FILE)) {
                Ok(_) => "built",
                Err(StoreError::Corruption(e)) if e.kind == CorruptionKind::Missing => "absent",
                Err(_) => "unreadable",
            },
            IndexType::Hnsw => HnswIndexManager::new(&path)
                .status()
                .map_or("unreadable", |status| status.as_str()),
        };
        let index_status = if index_status == "built" && meta.index_dirty {
            "behind"
        } else {
            index_status
        };
        let pending_writes = self
            .brackets
            .get(name)
            .map_or(0, |bracket| bracket.pending_writes.load(Ordering::Relaxed));

        Ok(CollectionInfo {
            meta: (*meta).clone(),
            point_count,
            index_status,
            indexing_open: self.is_indexing(name),
            pending_writes,
        })
    }
}
