//! Persistence and lifecycle of a collection's HNSW graph.
//!
//! State machine: `Absent -> Built -> Stale -> Built`. A stale graph stays on
//! disk untouched; only its header flag changes, so marking is O(1) no
//! matter how large the graph is.
//!
//! # Storage Format
//!
//! - Header (9 bytes): magic bytes, version, stale flag (`0` fresh, `1` stale)
//! - Body: bincode-encoded [`GraphSnapshot`], replayed into a graph on load

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{CorruptionError, StoreError, StoreResult};
use crate::storage::fsops;
use crate::types::PointId;
use crate::vector::hnsw::{GraphConfig, GraphSnapshot, HnswGraph};

/// File name of the graph inside a collection directory.
pub const HNSW_FILE: &str = "hnsw_index.bin";

/// Magic bytes to identify graph files.
const MAGIC_BYTES: &[u8; 4] = b"CVHN";

/// Current graph format version.
const GRAPH_VERSION: u32 = 1;

/// Byte offset of the stale flag.
const STALE_FLAG_OFFSET: u64 = 8;

/// Size of the header in bytes.
const HEADER_SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HnswStatus {
    Absent,
    Built,
    Stale,
}

impl HnswStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HnswStatus::Absent => "absent",
            HnswStatus::Built => "built",
            HnswStatus::Stale => "stale",
        }
    }
}

/// Handle on the graph file of one collection.
#[derive(Debug, Clone)]
pub struct HnswIndexManager {
    path: PathBuf,
}

impl HnswIndexManager {
    pub fn new(collection_path: &Path) -> Self {
        Self {
            path: collection_path.join(HNSW_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Builds a fresh graph and replaces the file, clearing any stale flag.
    pub fn rebuild_from_vectors<I>(
        &self,
        dimension: usize,
        config: GraphConfig,
        vectors_with_ids: I,
    ) -> StoreResult<HnswGraph>
    where
        I: IntoIterator<Item = (PointId, Vec<f32>)>,
    {
        let snapshot = GraphSnapshot::new(dimension, config, vectors_with_ids);
        let body = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| CorruptionError::unparsable(&self.path, e))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&GRAPH_VERSION.to_le_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&body);
        fsops::write_atomic(&self.path, &bytes)?;

        let graph = HnswGraph::from_snapshot(&snapshot);
        tracing::debug!("Wrote HNSW graph with {} nodes to {}", graph.len(), self.path.display());
        Ok(graph)
    }

    fn read_header(&self) -> StoreResult<Option<[u8; HEADER_SIZE]>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)
            .map_err(|e| CorruptionError::unparsable(&self.path, format!("short header: {e}")))?;
        if &header[0..4] != MAGIC_BYTES {
            return Err(CorruptionError::unparsable(&self.path, "invalid graph header").into());
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != GRAPH_VERSION {
            return Err(CorruptionError::unparsable(
                &self.path,
                format!("unsupported graph version {version}, expected {GRAPH_VERSION}"),
            )
            .into());
        }
        Ok(Some(header))
    }

    /// Current state read from the header only.
    pub fn status(&self) -> StoreResult<HnswStatus> {
        Ok(match self.read_header()? {
            None => HnswStatus::Absent,
            Some(header) if header[8] != 0 => HnswStatus::Stale,
            Some(_) => HnswStatus::Built,
        })
    }

    /// Flags the persisted graph as out of date without touching the graph.
    ///
    /// Returns `false` when there is no graph to mark.
    pub fn mark_stale(&self) -> StoreResult<bool> {
        if self.read_header()?.is_none() {
            return Ok(false);
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        let flip = |file: &mut File| -> io::Result<()> {
            file.seek(SeekFrom::Start(STALE_FLAG_OFFSET))?;
            file.write_all(&[1])?;
            file.flush()
        };
        flip(&mut file).map_err(|e| StoreError::io(&self.path, e))?;

        tracing::debug!("Marked HNSW graph stale at {}", self.path.display());
        Ok(true)
    }

    /// Loads the graph regardless of the stale flag.
    pub fn load(&self) -> StoreResult<HnswGraph> {
        let bytes = fsops::read_required(&self.path)?;
        if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC_BYTES {
            return Err(CorruptionError::unparsable(&self.path, "invalid graph header").into());
        }
        let (snapshot, _): (GraphSnapshot, usize) =
            bincode::serde::decode_from_slice(&bytes[HEADER_SIZE..], bincode::config::standard())
                .map_err(|e| CorruptionError::unparsable(&self.path, e))?;
        if !snapshot.is_consistent() {
            return Err(
                CorruptionError::unparsable(&self.path, "graph vectors do not match their ids").into(),
            );
        }
        Ok(HnswGraph::from_snapshot(&snapshot))
    }

    /// Deletes the graph file; `false` if it was already gone.
    pub fn remove(&self) -> StoreResult<bool> {
        fsops::remove_file_if_exists(&self.path)
    }
}
