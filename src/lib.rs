//! Filesystem-backed vector store for semantic code search.
//!
//! Embeddings live in a plain directory tree, one JSON file per point,
//! sharded by a quantized code of the vector. Each collection maintains
//! either a flat Hamming index or an HNSW graph, never both, and bulk
//! ingestion is bracketed by [`FilesystemVectorStore::begin_indexing`] and
//! [`FilesystemVectorStore::end_indexing`] so the index is rebuilt once per
//! batch instead of once per write.
//!
//! ```no_run
//! use codevec::{FilesystemVectorStore, IndexType, Payload, Point, PointId};
//!
//! # fn main() -> codevec::StoreResult<()> {
//! let store = FilesystemVectorStore::new(".codevec/vectors")?;
//! store.create_collection("chunks", 384)?;
//! store.set_index_type("chunks", IndexType::Hnsw)?;
//!
//! store.begin_indexing("chunks")?;
//! let payload = Payload::new().with("path", "src/lib.rs").with("line", 1);
//! store.upsert_points("chunks", vec![Point::new(PointId::new("lib-1")?, vec![0.1; 384], payload)])?;
//! let report = store.end_indexing("chunks", false)?;
//! assert_eq!(report.vectors_indexed, 1);
//!
//! let response = store.search(&vec![0.1; 384], "chunks", 5, true)?;
//! println!("{} via {}", response.len(), response.search_path);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod storage;
pub mod store;
pub mod types;
pub mod vector;

pub use config::Settings;
pub use error::{
    ConfigurationError, CorruptionError, CorruptionKind, NotFoundError, StoreError, StoreResult,
};
pub use store::{
    CollectionInfo, EndIndexingReport, EventCounts, FallbackReason, FilesystemVectorStore,
    SearchPath, SearchResponse, SearchResult, SearchTiming, Staleness,
};
pub use types::{IndexType, Payload, Point, PointId, ScalarValue};
pub use vector::Score;
