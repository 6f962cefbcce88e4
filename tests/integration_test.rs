/// End-to-end integration tests for the docrag pipeline.
///
/// Tests the complete flow:
///   Config → Db → Embedder → Ingestor → SearchService
use docrag::config::Config;
use docrag::db::Db;
use docrag::embedder::Embedder;
use docrag::embedder::mock::MockEmbedder;
use docrag::indexer::core::{IngestOptions, Ingestor};
use docrag::indexer::splitter::RecursiveSplitter;
use docrag::search::SearchService;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::Mutex as TokioMutex;

fn options() -> IngestOptions {
    let config = Config::default();
    IngestOptions {
        collection: config.collection_name,
        patterns: config.document_patterns,
        allow_partial: false,
    }
}

fn ingest(db: &mut Db, embedder: &MockEmbedder, root: &Path) -> docrag::indexer::core::IngestReport {
    Ingestor::new(db, embedder, RecursiveSplitter::default(), options())
        .ingest(root)
        .unwrap()
}

/// Every stored chunk, keyed by id.
fn snapshot(db: &Db, embedder: &MockEmbedder) -> BTreeMap<String, String> {
    let probe = embedder.embed("probe").unwrap();
    db.query("react_docs", &probe, 10_000)
        .unwrap()
        .into_iter()
        .map(|m| (m.id, m.document))
        .collect()
}

fn write_corpus(root: &Path) {
    // 400 chars: a single chunk
    fs::write(
        root.join("a.md"),
        "Apples and oranges grow in the orchard. ".repeat(10),
    )
    .unwrap();

    // ~2000 chars: several overlapping chunks
    let b: String = (0..40)
        .map(|i| format!("Rendering step {i:03} covers reconciliation details. "))
        .collect();
    fs::create_dir_all(root.join("learn")).unwrap();
    fs::write(root.join("learn").join("b.md"), b).unwrap();
}

/// Ingest two files, then query a phrase taken from the longer one.
#[tokio::test]
async fn test_full_pipeline() {
    let temp_dir = tempdir().unwrap();
    let docs_dir = temp_dir.path().join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    write_corpus(&docs_dir);

    let mut db = Db::open(temp_dir.path().join("index").join("index.db")).unwrap();
    let embedder = MockEmbedder::default();

    let report = ingest(&mut db, &embedder, &docs_dir);
    assert_eq!(report.files_found, 2);
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.files_failed, 0);
    assert!(report.chunks >= 4, "got {} chunks", report.chunks);

    let stored = snapshot(&db, &embedder);
    assert_eq!(stored.len(), report.chunks);

    let sources: Vec<String> = {
        let probe = embedder.embed("probe").unwrap();
        db.query("react_docs", &probe, 100)
            .unwrap()
            .into_iter()
            .map(|m| m.metadata.source)
            .collect()
    };
    assert_eq!(sources.iter().filter(|s| *s == "a.md").count(), 1);
    assert!(sources.iter().filter(|s| *s == "learn/b.md").count() >= 3);

    let service = SearchService::new(
        Arc::new(TokioMutex::new(db)),
        Arc::new(MockEmbedder::default()),
        "react_docs",
        5,
    );

    let phrase = "Rendering step 017 covers reconciliation";
    let top = service.search(phrase, Some(1)).await.unwrap();
    assert_eq!(top.results.len(), 1);
    assert_eq!(top.results[0].metadata.source, "learn/b.md");

    let all = service.search(phrase, Some(100)).await.unwrap();
    assert_eq!(all.results.len(), report.chunks);
    let min = all
        .results
        .iter()
        .map(|r| r.distance)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(top.results[0].distance, min);
}

/// Rebuilding from the same corpus yields the same chunks under the same ids.
#[test]
fn test_rebuild_is_idempotent() {
    let temp_dir = tempdir().unwrap();
    write_corpus(temp_dir.path());

    let mut db = Db::open_in_memory().unwrap();
    let embedder = MockEmbedder::default();

    let first = ingest(&mut db, &embedder, temp_dir.path());
    let before = snapshot(&db, &embedder);

    let second = ingest(&mut db, &embedder, temp_dir.path());
    let after = snapshot(&db, &embedder);

    assert_eq!(first, second);
    assert_eq!(before, after);
    assert_eq!(db.list_collections().unwrap().len(), 1);
}

/// A corpus with no matching files produces an empty collection, not an error.
#[test]
fn test_empty_corpus() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("README.txt"), "not markdown").unwrap();

    let mut db = Db::open_in_memory().unwrap();
    let embedder = MockEmbedder::default();
    let report = ingest(&mut db, &embedder, temp_dir.path());

    assert_eq!(report.files_found, 0);
    assert_eq!(report.chunks, 0);
    let info = db.get_collection("react_docs").unwrap();
    assert_eq!(info.count, 0);
    assert_eq!(info.dimensions, None);
}

/// Rebuilding replaces content from files that have since been removed.
#[test]
fn test_rebuild_drops_removed_files() {
    let temp_dir = tempdir().unwrap();
    write_corpus(temp_dir.path());

    let mut db = Db::open_in_memory().unwrap();
    let embedder = MockEmbedder::default();
    ingest(&mut db, &embedder, temp_dir.path());

    fs::remove_file(temp_dir.path().join("learn").join("b.md")).unwrap();
    let report = ingest(&mut db, &embedder, temp_dir.path());

    assert_eq!(report.chunks, 1);
    assert_eq!(db.count("react_docs").unwrap(), 1);
}

/// Test config defaults and validation
#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();
    assert_eq!(config.chunking.chunk_size, 800);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.search_top_k, 5);
    assert!(config.validate().is_ok());

    let mut bad_config = Config::default();
    bad_config.chunking.chunk_overlap = 900;
    assert!(bad_config.validate().is_err());
}
