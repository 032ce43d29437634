//! Tests for output module

use super::*;
use crate::types::ResourceRecord;
use serde_json::{json, Value};
use tempfile::tempdir;

fn records() -> Vec<ResourceRecord> {
    vec![
        ResourceRecord::new(json!({"id": "r1", "cloud_provider": "aws", "tags": {"env": "prod"}})),
        ResourceRecord::new(json!({"id": "r2", "cloud_provider": "azure", "active": false})),
    ]
}

// ============================================================================
// JSON File Sink Tests
// ============================================================================

#[tokio::test]
async fn test_write_pretty_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloud_assets.json");
    let sink = JsonFileSink::new(&path);

    let report = sink.write(&records()).await.unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.path, path);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(report.bytes, text.len() as u64);
    assert!(text.starts_with("[\n  {"));

    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed[0]["id"], "r1");
    assert_eq!(parsed[0]["tags"]["env"], "prod");
    assert_eq!(parsed[1]["active"], false);
}

#[tokio::test]
async fn test_write_compact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("compact.json");
    let sink = JsonFileSink::with_config(&path, JsonWriterConfig::new().compact());

    sink.write(&records()).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("[{"));
}

#[tokio::test]
async fn test_write_empty_export() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.json");

    let report = JsonFileSink::new(&path).write(&[]).await.unwrap();
    assert_eq!(report.records, 0);

    let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed, json!([]));
}

#[tokio::test]
async fn test_write_replaces_existing_and_leaves_no_staging_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.json");
    std::fs::write(&path, "stale").unwrap();

    JsonFileSink::new(&path).write(&records()).await.unwrap();

    let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn test_write_creates_parent_dirs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exports").join("2024").join("assets.json");

    JsonFileSink::new(&path).write(&records()).await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_write_without_parent_dirs_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("assets.json");
    let sink = JsonFileSink::with_config(&path, JsonWriterConfig::new().with_create_dirs(false));

    assert!(sink.write(&records()).await.is_err());
    assert!(!path.exists());
}

#[test]
fn test_writer_config_defaults() {
    let config = JsonWriterConfig::default();
    assert!(config.is_pretty());
    assert!(!JsonWriterConfig::new().compact().is_pretty());
    assert_eq!(DEFAULT_OUTPUT_FILE, "cloud_assets.json");
}
