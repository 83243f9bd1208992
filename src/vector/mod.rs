//! Vector math, quantization and the two on-disk index strategies.
//!
//! # Architecture
//! Every collection reduces its vectors with a fixed random projection, then
//! quantizes the result into a short code. The code shards point files on
//! disk and feeds the flat Hamming index. The HNSW graph works on the
//! original vectors instead and is the higher-recall alternative.

pub mod binary_index;
pub mod distance;
pub mod hnsw;
pub mod hnsw_manager;
pub mod projection;
pub mod quantizer;
pub mod types;

pub use binary_index::{BinaryIndex, HammingCandidate};
pub use distance::{cosine_distance, cosine_similarity, hamming_distance};
pub use hnsw::{GraphConfig, GraphHit, GraphSnapshot, HnswGraph};
pub use hnsw_manager::{HnswIndexManager, HnswStatus};
pub use projection::{
    ProjectionMatrix, create_projection_matrix, create_projection_matrix_seeded, load_matrix,
    save_matrix,
};
pub use quantizer::{QuantizedCode, VectorQuantizer, bits_to_hex, quantize_to_2bit, split_hex_path};
pub use types::{QuantizationRange, Score, VectorDimension};
