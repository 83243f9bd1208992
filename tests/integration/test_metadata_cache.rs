//! Metadata is parsed from disk at most once per store instance.

use std::thread;

use crate::common::{chunk_points, create_test_store, random_vectors, reopen};

#[test]
fn test_created_collection_needs_no_read() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();
    store.vector_size("chunks").unwrap();
    store.count_points("chunks").unwrap();
    assert_eq!(store.events().metadata_reads, 0);
}

#[test]
fn test_cold_store_reads_metadata_once() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();
    let vectors = random_vectors(10, 8, 5);
    store.upsert_points("chunks", chunk_points(&vectors)).unwrap();

    let cold = reopen(&store);
    assert_eq!(cold.events().metadata_reads, 0);
    for vector in &vectors {
        cold.search(vector, "chunks", 3, false).unwrap();
    }
    assert_eq!(cold.vector_size("chunks").unwrap(), 8);
    assert_eq!(cold.count_points("chunks").unwrap(), 10);
    cold.collection_info("chunks").unwrap();
    assert_eq!(cold.events().metadata_reads, 1);
}

#[test]
fn test_concurrent_first_access_reads_once() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();

    let cold = reopen(&store);
    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                assert_eq!(cold.vector_size("chunks").unwrap(), 8);
            });
        }
    });
    assert_eq!(cold.events().metadata_reads, 1);
}

#[test]
fn test_writes_refresh_cached_metadata() {
    let (store, _dir) = create_test_store();
    store.create_collection("chunks", 8).unwrap();
    store
        .upsert_points("chunks", chunk_points(&random_vectors(4, 8, 1)))
        .unwrap();

    let info = store.collection_info("chunks").unwrap();
    assert_eq!(info.meta.vector_count, 4);
    assert_eq!(store.events().metadata_reads, 0);

    // A different instance sees the persisted count
    let cold = reopen(&store);
    assert_eq!(cold.collection_info("chunks").unwrap().meta.vector_count, 4);
}
