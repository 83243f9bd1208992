//! Search dispatch: which strategy answers, and what the timing map says.

use std::collections::HashSet;

use codevec::{FallbackReason, IndexType, SearchPath, Staleness};

use crate::common::{chunk_points, create_test_store, random_vectors};

fn loaded_store(
    index_type: IndexType,
    count: usize,
    dim: usize,
) -> (codevec::FilesystemVectorStore, tempfile::TempDir, Vec<Vec<f32>>) {
    let (store, dir) = create_test_store();
    store.create_collection("chunks", dim).unwrap();
    store.set_index_type("chunks", index_type).unwrap();
    let vectors = random_vectors(count, dim, 42);
    store.begin_indexing("chunks").unwrap();
    store.upsert_points("chunks", chunk_points(&vectors)).unwrap();
    store.end_indexing("chunks", false).unwrap();
    (store, dir, vectors)
}

#[test]
fn test_binary_index_path() {
    let (store, _dir, vectors) = loaded_store(IndexType::Binary, 40, 32);
    let response = store.search(&vectors[7], "chunks", 5, false).unwrap();

    assert_eq!(response.search_path, SearchPath::BinaryIndex);
    assert_eq!(response.fallback_reason, None);
    assert_eq!(response.len(), 5);
    assert_eq!(response.results[0].id.as_str(), "chunk-7");
    assert!(response.results.iter().all(|r| r.staleness == Staleness::Fresh));
    assert!(
        response
            .results
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
}

#[test]
fn test_hnsw_index_path() {
    let (store, _dir, vectors) = loaded_store(IndexType::Hnsw, 40, 32);
    let response = store.search(&vectors[11], "chunks", 5, false).unwrap();

    assert_eq!(response.search_path, SearchPath::HnswIndex);
    assert_eq!(response.results[0].id.as_str(), "chunk-11");
    assert_eq!(response.len(), 5);
}

#[test]
fn test_missing_binary_index_falls_back() {
    let (store, _dir, vectors) = loaded_store(IndexType::Binary, 40, 32);
    std::fs::remove_file(store.base_path().join("chunks/vector_index.bin")).unwrap();

    let response = store.search(&vectors[3], "chunks", 5, false).unwrap();
    assert!(response.search_path.is_fallback());
    assert_eq!(response.fallback_reason, Some(FallbackReason::IndexAbsent));
    assert_eq!(response.results[0].id.as_str(), "chunk-3");
    assert_eq!(store.collection_info("chunks").unwrap().index_status, "absent");

    // A rebuild restores the fast path
    store.rebuild_index("chunks").unwrap();
    let response = store.search(&vectors[3], "chunks", 5, false).unwrap();
    assert_eq!(response.search_path, SearchPath::BinaryIndex);
}

#[test]
fn test_missing_hnsw_graph_falls_back() {
    let (store, _dir, vectors) = loaded_store(IndexType::Hnsw, 30, 16);
    // Warm the in-memory graph first; the file on disk still decides
    store.search(&vectors[0], "chunks", 1, false).unwrap();
    std::fs::remove_file(store.base_path().join("chunks/hnsw_index.bin")).unwrap();

    let response = store.search(&vectors[9], "chunks", 4, false).unwrap();
    assert!(response.search_path.is_fallback());
    assert_eq!(response.fallback_reason, Some(FallbackReason::IndexAbsent));
    assert_eq!(response.results[0].id.as_str(), "chunk-9");
}

#[test]
fn test_unreadable_index_falls_back() {
    let (store, _dir, vectors) = loaded_store(IndexType::Binary, 20, 16);
    std::fs::write(store.base_path().join("chunks/vector_index.bin"), b"garbage").unwrap();

    let response = store.search(&vectors[5], "chunks", 3, false).unwrap();
    assert_eq!(response.fallback_reason, Some(FallbackReason::IndexUnreadable));
    assert_eq!(response.results[0].id.as_str(), "chunk-5");
    assert_eq!(store.collection_info("chunks").unwrap().index_status, "unreadable");
}

#[test]
fn test_quantized_lookup_then_full_scan() {
    let (store, _dir, vectors) = loaded_store(IndexType::Binary, 25, 16);
    std::fs::remove_file(store.base_path().join("chunks/vector_index.bin")).unwrap();

    // The query's own shard holds at least the point itself
    let narrow = store.search(&vectors[8], "chunks", 1, false).unwrap();
    assert_eq!(narrow.search_path, SearchPath::QuantizedLookup);
    assert_eq!(narrow.results[0].id.as_str(), "chunk-8");

    // No shard holds more than the whole collection
    let wide = store.search(&vectors[8], "chunks", 100, false).unwrap();
    assert_eq!(wide.search_path, SearchPath::FullScan);
    assert_eq!(wide.len(), 25);
}

#[test]
fn test_binary_and_hnsw_agree() {
    // Several times the default shortlist, so the Hamming ranking decides
    let vectors = random_vectors(2000, 64, 2024);
    let queries = random_vectors(20, 64, 77);
    let points = chunk_points(&vectors);

    let (binary, _bdir) = create_test_store();
    assert!(vectors.len() >= 3 * binary.settings().search.min_candidates);
    binary.create_collection("chunks", 64).unwrap();
    binary.begin_indexing("chunks").unwrap();
    binary.upsert_points("chunks", points.clone()).unwrap();
    binary.end_indexing("chunks", false).unwrap();

    let (hnsw, _hdir) = create_test_store();
    hnsw.create_collection("chunks", 64).unwrap();
    hnsw.set_index_type("chunks", IndexType::Hnsw).unwrap();
    hnsw.begin_indexing("chunks").unwrap();
    hnsw.upsert_points("chunks", points).unwrap();
    hnsw.end_indexing("chunks", false).unwrap();

    let mut shared = 0;
    for query in &queries {
        let a = binary.search(query, "chunks", 10, false).unwrap();
        let b = hnsw.search(query, "chunks", 10, false).unwrap();
        assert_eq!(a.search_path, SearchPath::BinaryIndex);
        assert_eq!(b.search_path, SearchPath::HnswIndex);

        let a: HashSet<_> = a.ids().into_iter().collect();
        shared += b.ids().into_iter().filter(|id| a.contains(id)).count();
    }
    let overlap = shared as f64 / (queries.len() * 10) as f64;
    assert!(overlap >= 0.7, "overlap {overlap:.2} below 0.7");
}

#[test]
fn test_timing_reports_path_and_stages() {
    let (store, _dir, vectors) = loaded_store(IndexType::Binary, 20, 16);

    let response = store.search(&vectors[0], "chunks", 3, true).unwrap();
    let timing = response.timing.as_ref().expect("timing requested");
    assert_eq!(timing.search_path, response.search_path);
    for stage in ["metadata", "candidates", "load", "rerank", "total"] {
        let ms = timing.stage_ms(stage).unwrap_or_else(|| panic!("missing {stage}"));
        assert!(ms >= 0.0);
    }

    let map = timing.to_map();
    assert_eq!(map["search_path"], "binary_index");
    assert!(map.contains_key("total_ms"));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["search_path"], "binary_index");
    assert_eq!(json["timing"]["search_path"], "binary_index");
    assert!(json.get("fallback_reason").is_none());

    let quiet = store.search(&vectors[0], "chunks", 3, false).unwrap();
    assert!(quiet.timing.is_none());
}

#[test]
fn test_unknown_collection_is_not_found() {
    let (store, _dir) = create_test_store();
    let err = store.search(&[0.0; 4], "nope", 3, false).unwrap_err();
    assert_eq!(err.status_code(), "COLLECTION_NOT_FOUND");
}
