//! Low-bit quantization and content-addressable shard paths.
//!
//! A full-size vector is projected to the collection's working dimension,
//! each component is bucketed into `2^bits` equal-width levels over the
//! collection's global range, and the resulting bit string is packed into
//! bytes. The packed code is the Hamming fingerprint; its hex form names the
//! shard directory the point file lives in.
//!
//! # Shard Layout
//! With the default 2 bits per component and a depth factor of 4 the first
//! eight hex characters become four directory levels (`ab/cd/ef/01`), giving
//! 256-way branching per level. Similar vectors tend to share a prefix.

use std::path::{Path, PathBuf};

use crate::error::{ConfigurationError, StoreResult};
use crate::vector::projection::ProjectionMatrix;
use crate::vector::types::QuantizationRange;

/// Hex characters per shard directory level.
pub const HEX_CHARS_PER_LEVEL: usize = 2;

/// Quantized form of one vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuantizedCode {
    bytes: Vec<u8>,
}

impl QuantizedCode {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        bits_to_hex(&self.bytes)
    }
}

/// Stateless quantizer configured per collection.
#[derive(Debug, Clone)]
pub struct VectorQuantizer {
    bits_per_dimension: u8,
    depth_factor: usize,
    range: QuantizationRange,
}

impl VectorQuantizer {
    pub fn new(
        bits_per_dimension: u8,
        depth_factor: usize,
        range: QuantizationRange,
    ) -> StoreResult<Self> {
        if !matches!(bits_per_dimension, 1 | 2 | 4) {
            return Err(ConfigurationError::InvalidParameter {
                name: "bits_per_dimension",
                reason: format!("expected 1, 2 or 4, got {bits_per_dimension}"),
            }
            .into());
        }
        if depth_factor == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "depth_factor",
                reason: "depth factor must be at least 1".to_string(),
            }
            .into());
        }
        Ok(Self {
            bits_per_dimension,
            depth_factor,
            range,
        })
    }

    #[must_use]
    pub fn depth_factor(&self) -> usize {
        self.depth_factor
    }

    /// Width in bytes of a code for `reduced_dim` components.
    #[must_use]
    pub fn code_len(&self, reduced_dim: usize) -> usize {
        (reduced_dim * self.bits_per_dimension as usize).div_ceil(8)
    }

    /// Projects and quantizes a full-size vector.
    pub fn quantize(&self, matrix: &ProjectionMatrix, vector: &[f32]) -> QuantizedCode {
        let reduced = matrix.project(vector);
        QuantizedCode {
            bytes: quantize_to_bits(&reduced, self.range, self.bits_per_dimension),
        }
    }

    /// Directory segments for a code.
    pub fn shard_segments(&self, code: &QuantizedCode) -> Vec<String> {
        split_hex_path(&code.to_hex(), self.depth_factor)
    }

    /// Absolute shard directory for a code under `collection_path`.
    pub fn shard_dir(&self, collection_path: &Path, code: &QuantizedCode) -> PathBuf {
        let mut dir = collection_path.to_path_buf();
        for segment in self.shard_segments(code) {
            dir.push(segment);
        }
        dir
    }
}

/// Bucket each component into one of `2^bits` levels and pack the result.
///
/// Components outside the range are clipped to the first or last bucket.
/// Levels are Gray-coded, so neighbouring buckets differ in exactly one bit
/// and Hamming distance grows with bucket distance. Bits are packed
/// most-significant first so the hex form reads in component order.
pub fn quantize_to_bits(reduced: &[f32], range: QuantizationRange, bits: u8) -> Vec<u8> {
    let levels = 1u32 << bits;
    let width = range.width();
    let total_bits = reduced.len() * bits as usize;
    let mut packed = vec![0u8; total_bits.div_ceil(8)];

    for (i, &value) in reduced.iter().enumerate() {
        let clipped = if value.is_nan() {
            range.min
        } else {
            value.clamp(range.min, range.max)
        };
        let normalized = (clipped - range.min) / width;
        let level = ((normalized * levels as f32) as u32).min(levels - 1);
        let level = level ^ (level >> 1);

        for b in 0..bits as usize {
            let bit = (level >> (bits as usize - 1 - b)) & 1;
            if bit == 1 {
                let position = i * bits as usize + b;
                packed[position / 8] |= 0x80 >> (position % 8);
            }
        }
    }
    packed
}

/// Default 2-bit quantization.
pub fn quantize_to_2bit(reduced: &[f32], range: QuantizationRange) -> Vec<u8> {
    quantize_to_bits(reduced, range, 2)
}

/// Packed bytes to a lower-case hex string.
pub fn bits_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Hex string back to packed bytes; `None` for malformed input.
pub fn hex_to_bits(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Leading `depth_factor` two-character segments of a hex code.
///
/// Codes shorter than the requested depth yield as many segments as they
/// can fill.
pub fn split_hex_path(hex: &str, depth_factor: usize) -> Vec<String> {
    hex.as_bytes()
        .chunks_exact(HEX_CHARS_PER_LEVEL)
        .take(depth_factor)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}
