//! Error types for the vector store
//!
//! Errors fall into a small closed set of kinds. Configuration and corruption
//! errors always propagate to the caller. Degraded index conditions are never
//! errors; `search` absorbs them and reports the fallback it took.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller supplied something the collection cannot accept
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Named collection does not exist
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// On-disk state is missing or unreadable where it must be valid
    #[error(transparent)]
    Corruption(#[from] CorruptionError),

    /// Filesystem failure while touching a specific path
    #[error("I/O error on '{path}': {source}\nSuggestion: Check disk space and file permissions")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors caused by invalid input or a request the collection's shape rejects
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid index type '{value}'\nSuggestion: Use one of: binary, hnsw")]
    InvalidIndexType { value: String },

    #[error(
        "Vector dimension mismatch for point '{point_id}': expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch {
        point_id: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Query dimension mismatch: expected {expected}, got {actual}\nSuggestion: Embed the query with the collection's model"
    )]
    QueryDimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Vector for '{point_id}' has a non-finite component at index {index}\nSuggestion: Check the embedding model output for NaN or infinity"
    )]
    NonFiniteVector { point_id: String, index: usize },

    #[error("Collection '{name}' already exists\nSuggestion: Pick another name or delete it first")]
    CollectionExists { name: String },

    #[error("Invalid collection name '{name}': {reason}")]
    InvalidCollectionName { name: String, reason: &'static str },

    #[error("Invalid point id '{id}': {reason}")]
    InvalidPointId { id: String, reason: &'static str },

    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Unknown collection names
#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("Collection '{name}' not found\nSuggestion: Create it with create_collection first")]
    Collection { name: String },
}

/// What exactly is wrong with a corrupted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionKind {
    Missing,
    Unparsable(String),
    MissingField(&'static str),
}

impl std::fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "file is missing"),
            Self::Unparsable(reason) => write!(f, "content cannot be parsed: {reason}"),
            Self::MissingField(field) => write!(f, "required field '{field}' is missing"),
        }
    }
}

/// Fatal on-disk corruption, naming the offending file
#[derive(Error, Debug)]
#[error("Collection data is corrupted at '{path}': {kind}")]
pub struct CorruptionError {
    pub path: PathBuf,
    pub kind: CorruptionKind,
}

impl CorruptionError {
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: CorruptionKind::Missing,
        }
    }

    pub fn unparsable(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            kind: CorruptionKind::Unparsable(reason.to_string()),
        }
    }

    pub fn missing_field(path: impl Into<PathBuf>, field: &'static str) -> Self {
        Self {
            path: path.into(),
            kind: CorruptionKind::MissingField(field),
        }
    }
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn collection_not_found(name: &str) -> Self {
        NotFoundError::Collection {
            name: name.to_string(),
        }
        .into()
    }

    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Configuration(ConfigurationError::InvalidIndexType { .. }) => {
                "INVALID_INDEX_TYPE"
            }
            Self::Configuration(
                ConfigurationError::DimensionMismatch { .. }
                | ConfigurationError::QueryDimensionMismatch { .. },
            ) => "DIMENSION_MISMATCH",
            Self::Configuration(ConfigurationError::NonFiniteVector { .. }) => "NON_FINITE_VECTOR",
            Self::Configuration(ConfigurationError::CollectionExists { .. }) => {
                "COLLECTION_EXISTS"
            }
            Self::Configuration(_) => "CONFIG_ERROR",
            Self::NotFound(_) => "COLLECTION_NOT_FOUND",
            Self::Corruption(_) => "COLLECTION_CORRUPTED",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Corruption(err) if err.kind == CorruptionKind::Missing => vec![
                "The collection directory is incomplete; recreate the collection",
                "Check whether another process removed files under the store path",
            ],
            Self::Corruption(_) => vec![
                "Delete and recreate the collection, then re-index",
                "Check for disk errors or filesystem corruption",
            ],
            Self::NotFound(_) => vec!["Run 'codevec list' to see existing collections"],
            Self::Io { .. } => vec![
                "Check that the store directory is writable",
                "Ensure the disk is not full",
            ],
            Self::Configuration(_) => vec![],
        }
    }

    /// True for errors that mean on-disk state can no longer be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Helper trait for attaching a path to I/O errors
pub trait IoContext<T> {
    fn with_path(self, path: &Path) -> StoreResult<T>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &Path) -> StoreResult<T> {
        self.map_err(|e| StoreError::io(path, e))
    }
}
