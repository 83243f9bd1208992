//! End-to-end runs of the `codevec` binary.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use crate::common::random_vectors;

fn run_cli(workspace: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_codevec"))
        .args(args)
        .current_dir(workspace)
        .env("CODEVEC_STORE__BASE_PATH", workspace.join("vectors"))
        .env_remove("RUST_LOG")
        .output()
        .expect("run codevec CLI");

    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn write_jsonl(path: &Path, vectors: &[Vec<f32>]) {
    let lines: Vec<String> = vectors
        .iter()
        .enumerate()
        .map(|(i, vector)| {
            serde_json::json!({
                "id": format!("chunk-{i}"),
                "vector": vector,
                "payload": {"path": format!("src/file_{i}.rs"), "line": i},
            })
            .to_string()
        })
        .collect();
    std::fs::write(path, lines.join("\n")).unwrap();
}

#[test]
fn test_create_upsert_search_round_trip() {
    let workspace = TempDir::new().unwrap();
    let root = workspace.path();
    let vectors = random_vectors(20, 12, 5);
    write_jsonl(&root.join("points.jsonl"), &vectors);

    let (code, stdout, stderr) = run_cli(root, &["create", "chunks", "--size", "12", "--index-type", "hnsw"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("hnsw"));

    let (code, stdout, stderr) = run_cli(root, &["upsert", "chunks", "points.jsonl", "--threads", "2"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("Upserted 20 points"), "stdout: {stdout}");

    let query = serde_json::to_string(&vectors[4]).unwrap();
    let (code, stdout, stderr) = run_cli(
        root,
        &["search", "chunks", "--vector", &query, "--limit", "2", "--json", "--timing"],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["search_path"], "hnsw_index");
    assert_eq!(response["results"][0]["id"], "chunk-4");
    assert_eq!(response["timing"]["search_path"], "hnsw_index");

    let (code, stdout, _) = run_cli(root, &["list"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "chunks");
}

#[test]
fn test_errors_exit_nonzero_with_suggestion() {
    let workspace = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(workspace.path(), &["info", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"), "stderr: {stderr}");
    assert!(stderr.contains("codevec list"));

    let (code, _, stderr) = run_cli(workspace.path(), &["create", "chunks", "--size", "4", "--index-type", "faiss"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Invalid index type"));
}
