//! Type-safe wrappers for vector search values.
//!
//! Newtypes keep dimensions, scores and quantization ranges from being mixed
//! up with plain numbers.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, StoreError};

/// Type-safe wrapper for similarity scores.
///
/// Scores are cosine similarities in the range [-1.0, 1.0] where 1.0 means
/// the vectors point the same way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f32);

impl Score {
    /// Creates a new `Score`, clamping rounding drift into [-1.0, 1.0].
    ///
    /// NaN collapses to -1.0 so it always ranks last.
    #[must_use]
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self(-1.0)
        } else {
            Self(value.clamp(-1.0, 1.0))
        }
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Type-safe wrapper for vector dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension`; zero is rejected.
    pub fn new(dim: usize) -> Result<Self, StoreError> {
        if dim == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "vector_size",
                reason: "vector dimension cannot be zero".to_string(),
            }
            .into());
        }
        Ok(Self(dim))
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a point's vector has the expected dimension and only
    /// finite components.
    pub fn validate_point(&self, point_id: &str, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.0 {
            return Err(ConfigurationError::DimensionMismatch {
                point_id: point_id.to_string(),
                expected: self.0,
                actual: vector.len(),
            }
            .into());
        }
        reject_non_finite(point_id, vector)
    }

    /// Validates a query vector.
    pub fn validate_query(&self, query: &[f32]) -> Result<(), StoreError> {
        if query.len() != self.0 {
            return Err(ConfigurationError::QueryDimensionMismatch {
                expected: self.0,
                actual: query.len(),
            }
            .into());
        }
        reject_non_finite("<query>", query)
    }
}

fn reject_non_finite(point_id: &str, vector: &[f32]) -> Result<(), StoreError> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(ConfigurationError::NonFiniteVector {
            point_id: point_id.to_string(),
            index,
        }
        .into()),
        None => Ok(()),
    }
}

/// Global value range used to bucket reduced vector components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationRange {
    pub min: f32,
    pub max: f32,
}

impl QuantizationRange {
    pub fn new(min: f32, max: f32) -> Result<Self, StoreError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ConfigurationError::InvalidParameter {
                name: "quantization_range",
                reason: format!("expected finite min < max, got [{min}, {max}]"),
            }
            .into());
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.max - self.min
    }
}
