//! Collection metadata persisted as `collection_meta.json`.
//!
//! The file is the source of truth for a collection's shape and which index
//! it maintains. Parsing goes through an all-optional raw form first so a
//! damaged file is reported with the exact field that is missing instead of
//! a generic deserialization message.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CorruptionError, StoreError, StoreResult};
use crate::storage::fsops;
use crate::types::IndexType;
use crate::vector::types::QuantizationRange;

/// File name of the metadata inside a collection directory
pub const META_FILE: &str = "collection_meta.json";

/// Current on-disk index format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// HNSW parameters recorded while a collection uses the graph index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub vector_count: usize,
}

/// Metadata describing one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionMeta {
    pub name: String,
    pub vector_size: usize,
    pub quantization_range: QuantizationRange,
    pub reduced_dimensions: usize,
    pub bits_per_dimension: u8,
    pub depth_factor: usize,
    pub index_type: IndexType,
    pub index_format: u32,
    /// RFC 3339 creation time
    pub created_at: String,
    pub updated_at: String,
    pub vector_count: usize,
    /// Set before point files change, cleared by a completed rebuild. While
    /// set the index on disk may not describe the stored points.
    pub index_dirty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hnsw: Option<HnswParams>,
}

#[derive(Deserialize)]
struct RawRange {
    min: Option<f32>,
    max: Option<f32>,
}

#[derive(Deserialize)]
struct RawMeta {
    name: Option<String>,
    vector_size: Option<usize>,
    quantization_range: Option<RawRange>,
    reduced_dimensions: Option<usize>,
    bits_per_dimension: Option<u8>,
    depth_factor: Option<usize>,
    index_type: Option<String>,
    index_format: Option<u32>,
    created_at: Option<String>,
    updated_at: Option<String>,
    vector_count: Option<usize>,
    index_dirty: Option<bool>,
    hnsw: Option<HnswParams>,
}

/// Path of the metadata file for a collection directory
pub fn meta_path(collection_path: &Path) -> PathBuf {
    collection_path.join(META_FILE)
}

/// Current time as an RFC 3339 string
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

impl CollectionMeta {
    /// Metadata for a freshly created collection using the binary index
    pub fn new(
        name: impl Into<String>,
        vector_size: usize,
        quantization_range: QuantizationRange,
        reduced_dimensions: usize,
        bits_per_dimension: u8,
        depth_factor: usize,
    ) -> Self {
        let now = timestamp_now();
        Self {
            name: name.into(),
            vector_size,
            quantization_range,
            reduced_dimensions,
            bits_per_dimension,
            depth_factor,
            index_type: IndexType::Binary,
            index_format: INDEX_FORMAT_VERSION,
            created_at: now.clone(),
            updated_at: now,
            vector_count: 0,
            index_dirty: false,
            hnsw: None,
        }
    }

    /// Record a completed rebuild
    pub fn record_rebuild(&mut self, vector_count: usize) {
        self.vector_count = vector_count;
        self.index_dirty = false;
        if let Some(hnsw) = self.hnsw.as_mut() {
            hnsw.vector_count = vector_count;
        }
        self.updated_at = timestamp_now();
    }

    /// Switch the active index type, adding or dropping the HNSW block
    pub fn set_index_type(&mut self, index_type: IndexType, m: usize, ef_construction: usize) {
        self.index_type = index_type;
        self.hnsw = match index_type {
            IndexType::Hnsw => Some(HnswParams {
                m,
                ef_construction,
                vector_count: self.vector_count,
            }),
            IndexType::Binary => None,
        };
        self.updated_at = timestamp_now();
    }

    /// Write atomically into `collection_path`
    pub fn save(&self, collection_path: &Path) -> StoreResult<()> {
        let path = meta_path(collection_path);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| CorruptionError::unparsable(&path, e))?;
        fsops::write_atomic(&path, &json)
    }

    /// Load and validate the metadata of `collection_path`
    pub fn load(collection_path: &Path) -> StoreResult<Self> {
        let path = meta_path(collection_path);
        let bytes = fsops::read_required(&path)?;
        Self::parse(&path, &bytes)
    }

    fn parse(path: &Path, bytes: &[u8]) -> StoreResult<Self> {
        let raw: RawMeta =
            serde_json::from_slice(bytes).map_err(|e| CorruptionError::unparsable(path, e))?;

        fn required<T>(value: Option<T>, path: &Path, field: &'static str) -> StoreResult<T> {
            value.ok_or_else(|| CorruptionError::missing_field(path, field).into())
        }

        let index_format = required(raw.index_format, path, "index_format")?;
        if index_format > INDEX_FORMAT_VERSION {
            return Err(CorruptionError::unparsable(
                path,
                format!(
                    "index format {index_format} is newer than supported version {INDEX_FORMAT_VERSION}"
                ),
            )
            .into());
        }

        let range = required(raw.quantization_range, path, "quantization_range")?;
        let min = required(range.min, path, "quantization_range.min")?;
        let max = required(range.max, path, "quantization_range.max")?;
        let quantization_range = QuantizationRange::new(min, max)
            .map_err(|e| CorruptionError::unparsable(path, e))?;

        let index_type_raw = required(raw.index_type, path, "index_type")?;
        let index_type: IndexType = index_type_raw
            .parse()
            .map_err(|e: StoreError| CorruptionError::unparsable(path, e))?;

        let hnsw = match (index_type, raw.hnsw) {
            (IndexType::Hnsw, None) => {
                return Err(CorruptionError::missing_field(path, "hnsw").into());
            }
            (IndexType::Hnsw, hnsw) => hnsw,
            (IndexType::Binary, _) => None,
        };

        let vector_size = required(raw.vector_size, path, "vector_size")?;
        if vector_size == 0 {
            return Err(CorruptionError::unparsable(path, "vector_size is zero").into());
        }

        let created_at = required(raw.created_at, path, "created_at")?;
        Ok(Self {
            name: required(raw.name, path, "name")?,
            vector_size,
            quantization_range,
            reduced_dimensions: required(raw.reduced_dimensions, path, "reduced_dimensions")?,
            bits_per_dimension: required(raw.bits_per_dimension, path, "bits_per_dimension")?,
            depth_factor: required(raw.depth_factor, path, "depth_factor")?,
            index_type,
            index_format,
            updated_at: raw.updated_at.unwrap_or_else(|| created_at.clone()),
            created_at,
            vector_count: raw.vector_count.unwrap_or(0),
            // Files written before the flag existed carry no such promise
            index_dirty: raw.index_dirty.unwrap_or(true),
            hnsw,
        })
    }

    /// Check if a metadata file exists
    pub fn exists(collection_path: &Path) -> bool {
        meta_path(collection_path).exists()
    }
}
