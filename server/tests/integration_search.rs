use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use spindex_core::builder::IndexBuilder;
use spindex_core::config::IndexerConfig;
use spindex_core::persist::IndexPaths;
use spindex_core::search::QueryEngine;
use spindex_server::run_repl;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &Path) {
    let mut builder = IndexBuilder::new(IndexPaths::new(dir), IndexerConfig::default()).unwrap();
    let pages = [
        ("https://docs.example/rust", "<title>Rust</title><p>Rust is great. rust systems programming with rust.</p>"),
        ("https://docs.example/learn", "<p>Learning rust one chapter at a time</p>"),
        ("https://docs.example/go", "<p>Go has goroutines and channels for concurrency</p>"),
    ];
    for (url, markup) in pages {
        builder.ingest(url, markup).unwrap();
    }
    builder.finish().unwrap();
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = spindex_server::build_app(&dir.path().to_string_lossy(), 5).unwrap();

    let (status, body) = call(app, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"].as_u64().unwrap(), 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["url"], "https://docs.example/rust");
    assert_eq!(arr[1]["url"], "https://docs.example/learn");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn unknown_terms_yield_no_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = spindex_server::build_app(&dir.path().to_string_lossy(), 5).unwrap();

    let (status, body) = call(app, "/search?q=rust%20haskell").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"].as_u64().unwrap(), 0);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_searches_share_the_engine() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = spindex_server::build_app(&dir.path().to_string_lossy(), 5).unwrap();

    let (rust, go, learn) = tokio::join!(
        call(app.clone(), "/search?q=rust"),
        call(app.clone(), "/search?q=goroutines"),
        call(app, "/search?q=chapter"),
    );
    for ((status, body), url) in [
        (rust, "https://docs.example/rust"),
        (go, "https://docs.example/go"),
        (learn, "https://docs.example/learn"),
    ] {
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["results"][0]["url"], url);
    }
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = spindex_server::build_app(&dir.path().to_string_lossy(), 5).unwrap();

    let (status, body) = call(app.clone(), "/doc/3").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["url"], "https://docs.example/go");

    let (status, _) = call(app, "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn repl_prints_numbered_results_until_quit() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let engine = QueryEngine::open(&IndexPaths::new(dir.path()), 5).unwrap();

    let input = "rust\ncobol\n!quit\ngo\n".as_bytes();
    let mut out = Vec::new();
    run_repl(&engine, input, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("Please enter a query string: "));
    assert!(out.contains("Displaying top 2 results for \"rust\":\n\t1. https://docs.example/rust\n\t2. https://docs.example/learn\n"));
    assert!(out.contains("No documents found."));
    // nothing after !quit is evaluated
    assert!(!out.contains("docs.example/go"));
    assert_eq!(out.matches("Please enter a query string: ").count(), 3);
}

#[test]
fn repl_ignores_line_endings_and_padding() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let engine = QueryEngine::open(&IndexPaths::new(dir.path()), 5).unwrap();

    let input = "  rust \r\n!quit \r\ngo\n".as_bytes();
    let mut out = Vec::new();
    run_repl(&engine, input, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("Displaying top 2 results for \"rust\":\n"));
    assert!(!out.contains("docs.example/go"));
    assert_eq!(out.matches("Please enter a query string: ").count(), 2);
}
