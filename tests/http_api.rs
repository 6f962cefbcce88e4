/// HTTP contract tests for the search API, driven through the axum router
/// without binding a socket.
use std::fs;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use docrag::api::{AppState, router};
use docrag::config::Config;
use docrag::db::Db;
use docrag::embedder::mock::MockEmbedder;
use docrag::indexer::core::{IngestOptions, Ingestor};
use docrag::indexer::splitter::RecursiveSplitter;
use docrag::search::SearchService;
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::sync::Mutex as TokioMutex;
use tower::ServiceExt;

fn app(db: Db) -> Router {
    let search = SearchService::new(
        Arc::new(TokioMutex::new(db)),
        Arc::new(MockEmbedder::default()),
        "react_docs",
        5,
    );
    router(AppState {
        search: Arc::new(search),
    })
}

fn ingested_app() -> Router {
    let temp_dir = tempdir().unwrap();
    fs::write(
        temp_dir.path().join("state.md"),
        "# State\n\nuseState lets a component remember information between renders.",
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("effects.md"),
        "# Effects\n\nuseEffect synchronizes a component with an external system.",
    )
    .unwrap();

    let config = Config::default();
    let mut db = Db::open_in_memory().unwrap();
    let embedder = MockEmbedder::default();
    Ingestor::new(
        &mut db,
        &embedder,
        RecursiveSplitter::default(),
        IngestOptions {
            collection: config.collection_name,
            patterns: config.document_patterns,
            allow_partial: false,
        },
    )
    .ingest(temp_dir.path())
    .unwrap();

    app(db)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_missing_query_is_bad_request() {
    let (status, body) = send(ingested_app(), post("/search", json!({"k": 5}).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Query parameter is required"}));
}

#[tokio::test]
async fn test_blank_query_is_bad_request() {
    let (status, body) = send(ingested_app(), post("/search", json!({"query": "   "}).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Query parameter is required");
}

#[tokio::test]
async fn test_zero_k_is_bad_request() {
    let request = post("/search", json!({"query": "state", "k": 0}).to_string());
    let (status, body) = send(ingested_app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (status, body) = send(ingested_app(), post("/search", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_query_before_ingestion_is_not_found() {
    let app = app(Db::open_in_memory().unwrap());
    let (status, body) = send(app, post("/search", json!({"query": "state"}).to_string())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("react_docs"));
}

#[tokio::test]
async fn test_search_response_shape() {
    let request = post("/search", json!({"query": "useState remember", "k": 1}).to_string());
    let (status, body) = send(ingested_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "useState remember");

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    let top = &results[0];
    assert_eq!(top["metadata"]["source"], "state.md");
    assert!(top["id"].as_str().unwrap().starts_with("chunk_"));
    assert!(top["document"].as_str().unwrap().contains("useState"));
    assert!(top["distance"].is_number());
}

#[tokio::test]
async fn test_query_echoed_as_received() {
    let request = post("/search", json!({"query": "  useState\n", "k": 1}).to_string());
    let (status, body) = send(ingested_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "  useState\n");
    assert_eq!(body["results"][0]["metadata"]["source"], "state.md");
}

#[tokio::test]
async fn test_default_k_returns_all_small_corpus() {
    let request = post("/search", json!({"query": "component"}).to_string());
    let (status, body) = send(ingested_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    // two one-chunk files, default k of 5
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_trailing_slash_route() {
    let request = post("/search/", json!({"query": "useEffect"}).to_string());
    let (status, body) = send(ingested_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["metadata"]["source"], "effects.md");
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(Db::open_in_memory().unwrap()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
