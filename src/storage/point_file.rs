//! One JSON file per point.
//!
//! The file carries the id, the original full-precision vector, the payload
//! and the hex code it was sharded by. Rebuilds and reranking read vectors
//! from here, so the file is the authoritative copy of a point.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CorruptionError, StoreResult};
use crate::storage::fsops;
use crate::types::{Payload, Point, PointId};
use crate::vector::quantizer::hex_to_bits;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: PointId,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Payload,
    /// Quantized code as lower-case hex
    pub code: String,
}

impl PointRecord {
    pub fn new(point: Point, code: String) -> Self {
        Self {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
            code,
        }
    }

    /// Packed code bytes, `None` when the stored hex is malformed
    pub fn code_bytes(&self) -> Option<Vec<u8>> {
        hex_to_bits(&self.code)
    }

    pub fn into_point(self) -> Point {
        Point::new(self.id, self.vector, self.payload)
    }

    pub fn write(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_vec(self).map_err(|e| CorruptionError::unparsable(path, e))?;
        fsops::write_atomic(path, &json)
    }

    pub fn read(path: &Path) -> StoreResult<Self> {
        let bytes = fsops::read_required(path)?;
        serde_json::from_slice(&bytes).map_err(|e| CorruptionError::unparsable(path, e).into())
    }
}
