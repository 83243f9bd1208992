//! Domain types shared by the store and its indexes.

mod payload;

pub use payload::{Payload, ScalarValue};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

use crate::error::{ConfigurationError, StoreError};

/// Longest id stored verbatim in a file name
const MAX_PLAIN_ID_LEN: usize = 128;

/// Marks a hashed file name; never produced by a plain id
const HASHED_NAME_MARKER: char = '~';

/// Caller-assigned point identifier, unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PointId(String);

impl PointId {
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ConfigurationError::InvalidPointId {
                id,
                reason: "point id cannot be empty",
            }
            .into());
        }
        if id.chars().any(char::is_control) {
            return Err(ConfigurationError::InvalidPointId {
                id,
                reason: "point id cannot contain control characters",
            }
            .into());
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this point inside its shard directory.
    ///
    /// Ids that are not safe as file names are stored under their SHA-256,
    /// behind a marker character plain ids cannot contain.
    pub fn file_name(&self) -> String {
        let plain = self.0.len() <= MAX_PLAIN_ID_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
            && !self.0.starts_with('.');
        if plain {
            format!("vector_{}.json", self.0)
        } else {
            let mut hasher = Sha256::new();
            hasher.update(self.0.as_bytes());
            format!("vector_{HASHED_NAME_MARKER}{:x}.json", hasher.finalize())
        }
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PointId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PointId {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PointId> for String {
    fn from(id: PointId) -> Self {
        id.0
    }
}

/// A single embedding with its caller-defined payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Payload,
}

impl Point {
    pub fn new(id: PointId, vector: Vec<f32>, payload: Payload) -> Self {
        Self {
            id,
            vector,
            payload,
        }
    }
}

/// Which on-disk index a collection maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Binary,
    Hnsw,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Binary => "binary",
            IndexType::Hnsw => "hnsw",
        }
    }

    /// File name of the artifact this index type owns
    pub fn artifact_name(&self) -> &'static str {
        match self {
            IndexType::Binary => "vector_index.bin",
            IndexType::Hnsw => "hnsw_index.bin",
        }
    }

    /// The index type whose artifact must not exist alongside this one
    pub fn other(&self) -> Self {
        match self {
            IndexType::Binary => IndexType::Hnsw,
            IndexType::Hnsw => IndexType::Binary,
        }
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(IndexType::Binary),
            "hnsw" => Ok(IndexType::Hnsw),
            _ => Err(ConfigurationError::InvalidIndexType {
                value: s.to_string(),
            }
            .into()),
        }
    }
}
