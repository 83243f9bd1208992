//! Random projection matrices for dimensionality reduction.
//!
//! Each collection owns one matrix, generated once at creation and persisted
//! next to its metadata. Quantization codes and therefore shard paths depend
//! on it, so it must round-trip bit for bit.
//!
//! # Storage Format
//!
//! - Header (8 bytes): magic bytes, format version
//! - Body: bincode-encoded [`ProjectionMatrix`] (little-endian `f32`s)

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{CorruptionError, StoreResult};
use crate::storage::fsops;

/// File name of the persisted matrix inside a collection directory.
pub const MATRIX_FILE: &str = "projection_matrix.bin";

/// Magic bytes to identify projection matrix files.
const MAGIC_BYTES: &[u8; 4] = b"CVPM";

/// Current matrix format version.
const MATRIX_VERSION: u32 = 1;

/// Size of the header in bytes.
const HEADER_SIZE: usize = 8;

/// Dense row-major `input_dim x output_dim` projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMatrix {
    input_dim: usize,
    output_dim: usize,
    data: Vec<f32>,
}

impl ProjectionMatrix {
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Projects a full-size vector down to `output_dim` components.
    pub fn project(&self, vector: &[f32]) -> Vec<f32> {
        debug_assert_eq!(vector.len(), self.input_dim);
        let mut reduced = vec![0.0f32; self.output_dim];
        for (row, &value) in self.data.chunks_exact(self.output_dim).zip(vector) {
            if value == 0.0 {
                continue;
            }
            for (out, &weight) in reduced.iter_mut().zip(row) {
                *out += value * weight;
            }
        }
        reduced
    }
}

/// Creates a Gaussian random projection using fresh entropy.
pub fn create_projection_matrix(input_dim: usize, output_dim: usize) -> ProjectionMatrix {
    create_projection_matrix_seeded(input_dim, output_dim, rand::rng().random())
}

/// Creates a Gaussian random projection from a fixed seed.
///
/// Entries are drawn from N(0, 1) and scaled by `1/sqrt(output_dim)` so
/// projected norms stay close to the originals.
pub fn create_projection_matrix_seeded(
    input_dim: usize,
    output_dim: usize,
    seed: u64,
) -> ProjectionMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = 1.0 / (output_dim as f32).sqrt();
    let data: Vec<f32> = (0..input_dim * output_dim)
        .map(|_| rng.sample::<f32, _>(StandardNormal) * scale)
        .collect();

    ProjectionMatrix {
        input_dim,
        output_dim,
        data,
    }
}

fn matrix_path(collection_path: &Path) -> PathBuf {
    collection_path.join(MATRIX_FILE)
}

/// Persists the matrix into the collection directory.
pub fn save_matrix(matrix: &ProjectionMatrix, collection_path: &Path) -> StoreResult<()> {
    let path = matrix_path(collection_path);
    let body = bincode::serde::encode_to_vec(matrix, bincode::config::standard())
        .map_err(|e| CorruptionError::unparsable(&path, e))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(MAGIC_BYTES);
    bytes.extend_from_slice(&MATRIX_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);

    fsops::write_atomic(&path, &bytes)
}

/// Loads the matrix of an existing collection.
///
/// A missing or malformed file is fatal: without the exact matrix no code
/// can be reproduced.
pub fn load_matrix(collection_path: &Path) -> StoreResult<ProjectionMatrix> {
    let path = matrix_path(collection_path);
    let bytes = fsops::read_required(&path)?;

    if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC_BYTES {
        return Err(CorruptionError::unparsable(&path, "invalid projection matrix header").into());
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != MATRIX_VERSION {
        return Err(CorruptionError::unparsable(
            &path,
            format!("unsupported matrix version {version}, expected {MATRIX_VERSION}"),
        )
        .into());
    }

    let (matrix, _): (ProjectionMatrix, usize) =
        bincode::serde::decode_from_slice(&bytes[HEADER_SIZE..], bincode::config::standard())
            .map_err(|e| CorruptionError::unparsable(&path, e))?;

    if matrix.data.len() != matrix.input_dim * matrix.output_dim || matrix.output_dim == 0 {
        return Err(CorruptionError::unparsable(&path, "matrix shape does not match its data").into());
    }
    Ok(matrix)
}
