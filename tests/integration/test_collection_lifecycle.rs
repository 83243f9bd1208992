//! Collection lifecycle and index artifact exclusivity.

use codevec::{IndexType, Payload, Point, PointId, StoreError};

use crate::common::{chunk_points, create_test_store, random_vectors};

const BINARY_ARTIFACT: &str = "vector_index.bin";
const HNSW_ARTIFACT: &str = "hnsw_index.bin";

fn artifacts(store: &codevec::FilesystemVectorStore, name: &str) -> (bool, bool) {
    let path = store.base_path().join(name);
    (
        path.join(BINARY_ARTIFACT).exists(),
        path.join(HNSW_ARTIFACT).exists(),
    )
}

#[test]
fn test_create_list_and_info() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 32).unwrap();
    store.create_collection("another", 16).unwrap();

    assert_eq!(store.list_collections().unwrap(), vec!["another", "chunks"]);
    assert!(store.collection_exists("chunks"));
    assert!(!store.collection_exists("missing"));

    let info = store.collection_info("chunks").unwrap();
    assert_eq!(info.meta.vector_size, 32);
    assert_eq!(info.meta.reduced_dimensions, 32);
    assert_eq!(info.meta.index_type, IndexType::Binary);
    assert_eq!(info.point_count, 0);
    assert_eq!(info.index_status, "built");
    assert!(!info.indexing_open);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["vector_size"], 32);
    assert_eq!(json["index_type"], "binary");
}

#[test]
fn test_reduced_dimensions_cap_at_64() {
    let (store, _dir) = create_test_store();
    store.create_collection("wide", 384).unwrap();
    let info = store.collection_info("wide").unwrap();
    assert_eq!(info.meta.reduced_dimensions, 64);
    assert_eq!(info.meta.bits_per_dimension, 2);
    assert_eq!(info.meta.depth_factor, 4);
}

#[test]
fn test_index_artifacts_are_mutually_exclusive() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 24).unwrap();
    store.begin_indexing("chunks").unwrap();
    store
        .upsert_points("chunks", chunk_points(&random_vectors(30, 24, 7)))
        .unwrap();
    store.end_indexing("chunks", false).unwrap();
    assert_eq!(artifacts(&store, "chunks"), (true, false));

    store.set_index_type("chunks", IndexType::Hnsw).unwrap();
    assert_eq!(artifacts(&store, "chunks"), (false, true));
    let info = store.collection_info("chunks").unwrap();
    assert_eq!(info.meta.index_type, IndexType::Hnsw);
    assert_eq!(info.index_status, "built");
    let hnsw = info.meta.hnsw.expect("hnsw parameters recorded");
    assert_eq!(hnsw.vector_count, 30);

    // Setting the same type again keeps exactly one artifact
    store.set_index_type("chunks", IndexType::Hnsw).unwrap();
    assert_eq!(artifacts(&store, "chunks"), (false, true));

    store.set_index_type("chunks", IndexType::Binary).unwrap();
    assert_eq!(artifacts(&store, "chunks"), (true, false));
    let info = store.collection_info("chunks").unwrap();
    assert!(info.meta.hnsw.is_none());
    assert_eq!(info.point_count, 30);
}

#[test]
fn test_invalid_index_type_is_rejected() {
    let err = "annoy".parse::<IndexType>().unwrap_err();
    assert_eq!(err.status_code(), "INVALID_INDEX_TYPE");
    assert_eq!("HNSW".parse::<IndexType>().unwrap(), IndexType::Hnsw);
}

#[test]
fn test_dimension_mismatch_writes_nothing() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();

    let mut points = chunk_points(&random_vectors(3, 8, 1));
    points.push(Point::new(
        PointId::new("short").unwrap(),
        vec![0.5; 4],
        Payload::new(),
    ));
    let err = store.upsert_points("chunks", points).unwrap_err();
    assert_eq!(err.status_code(), "DIMENSION_MISMATCH");
    assert_eq!(store.count_points("chunks").unwrap(), 0);

    let err = store.search(&[1.0; 3], "chunks", 5, false).unwrap_err();
    assert_eq!(err.status_code(), "DIMENSION_MISMATCH");
}

#[test]
fn test_delete_points_and_clear() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 16).unwrap();
    let vectors = random_vectors(12, 16, 3);
    store.upsert_points("chunks", chunk_points(&vectors)).unwrap();
    assert_eq!(store.count_points("chunks").unwrap(), 12);

    let doomed = vec![
        PointId::new("chunk-0").unwrap(),
        PointId::new("chunk-5").unwrap(),
        PointId::new("never-written").unwrap(),
    ];
    assert_eq!(store.delete_points("chunks", &doomed).unwrap(), 2);
    assert_eq!(store.count_points("chunks").unwrap(), 10);

    let response = store.search(&vectors[0], "chunks", 12, false).unwrap();
    assert_eq!(response.len(), 10);
    assert!(response.results.iter().all(|r| r.id.as_str() != "chunk-0"));

    assert_eq!(store.clear_collection("chunks").unwrap(), 10);
    assert_eq!(store.count_points("chunks").unwrap(), 0);
    assert_eq!(artifacts(&store, "chunks"), (true, false));
    assert!(store.search(&vectors[1], "chunks", 5, false).unwrap().is_empty());
    assert_eq!(store.vector_size("chunks").unwrap(), 16);
}

#[test]
fn test_delete_collection() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();
    store.upsert_points("chunks", chunk_points(&random_vectors(4, 8, 2))).unwrap();

    store.delete_collection("chunks").unwrap();
    assert!(!store.base_path().join("chunks").exists());
    assert!(store.list_collections().unwrap().is_empty());

    match store.count_points("chunks") {
        Err(StoreError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(
        store.delete_collection("chunks").unwrap_err().status_code(),
        "COLLECTION_NOT_FOUND"
    );

    // The name is free again
    store.create_collection("chunks", 12).unwrap();
    assert_eq!(store.vector_size("chunks").unwrap(), 12);
}

#[test]
fn test_payload_round_trips_through_search() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();
    let vectors = random_vectors(5, 8, 11);
    store.upsert_points("chunks", chunk_points(&vectors)).unwrap();

    let response = store.search(&vectors[3], "chunks", 1, false).unwrap();
    let top = &response.results[0];
    assert_eq!(top.id.as_str(), "chunk-3");
    assert_eq!(top.payload.get_str("path"), Some("src/module_3.rs"));
    assert_eq!(top.payload.get_str("language"), Some("rust"));
    assert!((top.score.get() - 1.0).abs() < 1e-5);
}

#[test]
fn test_plain_id_shaped_like_a_digest_keeps_its_own_file() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 4).unwrap();

    let unsafe_id = PointId::new("src/lib.rs:1-20").unwrap();
    let digest = unsafe_id
        .file_name()
        .trim_start_matches("vector_~")
        .trim_end_matches(".json")
        .to_string();
    let lookalike = PointId::new(format!("h{digest}")).unwrap();

    // Same vector, so both land in the same shard directory
    let vector = vec![0.5, 0.5, 0.5, 0.5];
    store
        .upsert_points(
            "chunks",
            vec![
                Point::new(unsafe_id.clone(), vector.clone(), Payload::new().with("n", 1u64)),
                Point::new(lookalike.clone(), vector, Payload::new().with("n", 2u64)),
            ],
        )
        .unwrap();

    assert_eq!(store.count_points("chunks").unwrap(), 2);
    let first = store.get_point("chunks", &unsafe_id).unwrap().unwrap();
    let second = store.get_point("chunks", &lookalike).unwrap().unwrap();
    assert_eq!(first.id, unsafe_id);
    assert_eq!(second.id, lookalike);

    store.delete_points("chunks", &[lookalike.clone()]).unwrap();
    assert!(store.get_point("chunks", &unsafe_id).unwrap().is_some());
    assert!(store.get_point("chunks", &lookalike).unwrap().is_none());
}
