//! On-disk layout of a collection: metadata, point files and helpers.

pub mod fsops;
pub mod id_map;
pub mod metadata;
pub mod metadata_cache;
pub mod point_file;

pub use id_map::IdMap;
pub use metadata::{CollectionMeta, HnswParams, INDEX_FORMAT_VERSION, META_FILE};
pub use metadata_cache::MetadataCache;
pub use point_file::PointRecord;
