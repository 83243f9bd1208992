//! Damaged collection files surface as corruption errors naming the file.

use std::path::{Path, PathBuf};

use codevec::{CorruptionKind, FilesystemVectorStore, StoreError};
use walkdir::WalkDir;

use crate::common::{chunk_points, create_test_store, random_vectors, reopen};

fn seeded_store() -> (FilesystemVectorStore, tempfile::TempDir, Vec<Vec<f32>>) {
    let (store, dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();
    let vectors = random_vectors(6, 8, 21);
    store.upsert_points("chunks", chunk_points(&vectors)).unwrap();
    (store, dir, vectors)
}

fn corruption(result: Result<impl std::fmt::Debug, StoreError>) -> (PathBuf, CorruptionKind) {
    match result {
        Err(StoreError::Corruption(err)) => (err.path, err.kind),
        other => panic!("expected corruption, got {other:?}"),
    }
}

fn find_point_file(collection: &Path, file_name: &str) -> PathBuf {
    WalkDir::new(collection)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_name() == file_name)
        .map(|entry| entry.into_path())
        .expect("point file exists")
}

#[test]
fn test_missing_metadata() {
    let (store, _dir, _) = seeded_store();
    let meta = store.base_path().join("chunks/collection_meta.json");
    std::fs::remove_file(&meta).unwrap();

    let (path, kind) = corruption(reopen(&store).vector_size("chunks"));
    assert_eq!(path, meta);
    assert_eq!(kind, CorruptionKind::Missing);
}

#[test]
fn test_metadata_missing_field() {
    let (store, _dir, _) = seeded_store();
    let meta = store.base_path().join("chunks/collection_meta.json");
    let mut json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&meta).unwrap()).unwrap();
    json.as_object_mut().unwrap().remove("vector_size");
    std::fs::write(&meta, serde_json::to_vec(&json).unwrap()).unwrap();

    let (path, kind) = corruption(reopen(&store).count_points("chunks"));
    assert_eq!(path, meta);
    assert_eq!(kind, CorruptionKind::MissingField("vector_size"));
}

#[test]
fn test_metadata_unknown_index_type() {
    let (store, _dir, _) = seeded_store();
    let meta = store.base_path().join("chunks/collection_meta.json");
    let mut json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&meta).unwrap()).unwrap();
    json["index_type"] = "annoy".into();
    std::fs::write(&meta, serde_json::to_vec(&json).unwrap()).unwrap();

    let (_, kind) = corruption(reopen(&store).vector_size("chunks"));
    assert!(matches!(kind, CorruptionKind::Unparsable(_)));
}

#[test]
fn test_missing_projection_matrix_is_fatal() {
    let (store, _dir, vectors) = seeded_store();
    let matrix = store.base_path().join("chunks/projection_matrix.bin");
    std::fs::remove_file(&matrix).unwrap();

    let cold = reopen(&store);
    let (path, kind) = corruption(cold.search(&vectors[0], "chunks", 3, false));
    assert_eq!(path, matrix);
    assert_eq!(kind, CorruptionKind::Missing);

    let err = cold.upsert_points("chunks", chunk_points(&vectors)).unwrap_err();
    assert_eq!(err.status_code(), "COLLECTION_CORRUPTED");
    assert!(!err.recovery_suggestions().is_empty());
}

#[test]
fn test_damaged_point_file_is_named() {
    let (store, _dir, _) = seeded_store();
    let file = find_point_file(&store.base_path().join("chunks"), "vector_chunk-2.json");
    std::fs::write(&file, b"{ not json").unwrap();

    let cold = reopen(&store);
    let (path, kind) = corruption(cold.rebuild_index("chunks"));
    assert_eq!(path, file);
    assert!(matches!(kind, CorruptionKind::Unparsable(_)));

    let id = codevec::PointId::new("chunk-2").unwrap();
    assert!(cold.get_point("chunks", &id).unwrap_err().is_corruption());
}
