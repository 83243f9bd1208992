//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use codevec::{FilesystemVectorStore, Payload, Point, PointId, Settings};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// A store rooted in its own temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn create_test_store() -> (FilesystemVectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FilesystemVectorStore::new(temp_dir.path().join("vectors"))
        .expect("Failed to open store");
    (store, temp_dir)
}

/// Same as [`create_test_store`] but with caller-tuned settings.
pub fn create_store_with(configure: impl FnOnce(&mut Settings)) -> (FilesystemVectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut settings = Settings::default();
    settings.store.base_path = temp_dir.path().join("vectors");
    configure(&mut settings);
    let store = FilesystemVectorStore::with_settings(settings).expect("Failed to open store");
    (store, temp_dir)
}

/// Second handle on the same directory, with cold caches.
pub fn reopen(store: &FilesystemVectorStore) -> FilesystemVectorStore {
    FilesystemVectorStore::with_settings(store.settings().clone()).expect("Failed to reopen store")
}

/// Unit-length vectors with components drawn from a seeded RNG.
pub fn random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut v: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
            v.iter_mut().for_each(|x| *x /= norm);
            v
        })
        .collect()
}

/// Points `chunk-0..chunk-n` carrying a small code-chunk payload.
pub fn chunk_points(vectors: &[Vec<f32>]) -> Vec<Point> {
    vectors
        .iter()
        .enumerate()
        .map(|(i, vector)| {
            let payload = Payload::new()
                .with("path", format!("src/module_{}.rs", i % 7))
                .with("start_line", (i * 10) as u64)
                .with("language", "rust");
            Point::new(point_id(i), vector.clone(), payload)
        })
        .collect()
}

pub fn point_id(i: usize) -> PointId {
    PointId::new(format!("chunk-{i}")).expect("valid id")
}
