//! Configuration module for the vector store.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CODEVEC_` and use double underscores
//! to separate nested levels:
//! - `CODEVEC_STORE__BASE_PATH=/data/vectors` sets `store.base_path`
//! - `CODEVEC_HNSW__EF_CONSTRUCTION=400` sets `hnsw.ef_construction`
//! - `CODEVEC_QUANTIZATION__DEPTH_FACTOR=3` sets `quantization.depth_factor`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory holding the workspace settings file
const CONFIG_DIR: &str = ".codevec";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Quantization geometry applied to newly created collections
    #[serde(default)]
    pub quantization: QuantizationConfig,

    /// HNSW graph parameters
    #[serde(default)]
    pub hnsw: HnswConfig,

    /// Search tuning
    #[serde(default)]
    pub search: SearchConfig,

    /// Ingestion settings used by the CLI
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Root directory holding one sub-directory per collection
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuantizationConfig {
    /// Working dimensionality after projection (capped at the vector size)
    #[serde(default = "default_reduced_dimensions")]
    pub reduced_dimensions: usize,

    /// Bits per reduced component (1, 2 or 4)
    #[serde(default = "default_bits_per_dimension")]
    pub bits_per_dimension: u8,

    /// Number of two-hex-character directory levels in a shard path
    #[serde(default = "default_depth_factor")]
    pub depth_factor: usize,

    /// Lower bound of the quantization range
    #[serde(default = "default_range_min")]
    pub range_min: f32,

    /// Upper bound of the quantization range
    #[serde(default = "default_range_max")]
    pub range_max: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HnswConfig {
    /// Neighbour fan-out per node on upper layers (layer 0 uses 2 * m)
    #[serde(default = "default_hnsw_m")]
    pub m: usize,

    /// Candidate list size during construction
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Candidate list size during search (raised to the limit when smaller)
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Shortlist size multiplier for approximate strategies
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    /// Lower bound on the shortlist size for approximate strategies
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexingConfig {
    /// Number of parallel threads for ingestion
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Points per upsert call when streaming a file
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_base_path() -> PathBuf {
    PathBuf::from(".codevec/vectors")
}
fn default_reduced_dimensions() -> usize {
    64
}
fn default_bits_per_dimension() -> u8 {
    2
}
fn default_depth_factor() -> usize {
    4
}
fn default_range_min() -> f32 {
    -0.75
}
fn default_range_max() -> f32 {
    0.75
}
fn default_hnsw_m() -> usize {
    16
}
fn default_ef_construction() -> usize {
    200
}
fn default_ef_search() -> usize {
    64
}
fn default_oversample_factor() -> usize {
    4
}
fn default_min_candidates() -> usize {
    512
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_batch_size() -> usize {
    64
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            store: StoreConfig::default(),
            quantization: QuantizationConfig::default(),
            hnsw: HnswConfig::default(),
            search: SearchConfig::default(),
            indexing: IndexingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            reduced_dimensions: default_reduced_dimensions(),
            bits_per_dimension: default_bits_per_dimension(),
            depth_factor: default_depth_factor(),
            range_min: default_range_min(),
            range_max: default_range_max(),
        }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: default_hnsw_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            oversample_factor: default_oversample_factor(),
            min_candidates: default_min_candidates(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores stay in field names
            .merge(Env::prefixed("CODEVEC_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a .codevec directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
