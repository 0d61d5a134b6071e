use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use spindex_core::persist::IndexPaths;
use spindex_core::search::QueryEngine;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const QUIT: &str = "!quit";
pub const PROMPT: &str = "Please enter a query string: ";
const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub score: f64,
    pub url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
}

pub fn build_app(index_dir: &str, limit: usize) -> Result<Router> {
    let engine = QueryEngine::open(&IndexPaths::new(index_dir), limit)?;
    Ok(router(Arc::new(engine)))
}

pub fn router(engine: Arc<QueryEngine>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(AppState { engine })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = Instant::now();
    let k = params.k.unwrap_or(state.engine.limit()).clamp(1, MAX_K);
    // Postings are read with blocking file I/O under a lock.
    let engine = state.engine.clone();
    let query = params.q.clone();
    let found = tokio::task::spawn_blocking(move || engine.search_scored(&query, k))
        .await
        .map_err(anyhow::Error::from)
        .and_then(|searched| searched)
        .map_err(|err| {
            tracing::error!(error = %err, query = %params.q, "search failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        })?;
    let results = found
        .hits
        .into_iter()
        .map(|h| SearchHit { doc_id: h.doc_id, score: h.score, url: h.url })
        .collect();
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: found.total_hits,
        results,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<u32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match state.engine.url(doc_id) {
        Some(url) => Ok(Json(serde_json::json!({ "doc_id": doc_id, "url": url }))),
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

/// Interactive loop: one query per line until `!quit` or end of input.
pub fn run_repl<R: BufRead, W: Write>(engine: &QueryEngine, input: R, mut out: W) -> Result<()> {
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let query = line.trim();
        if query == QUIT {
            break;
        }

        let start = Instant::now();
        let urls = engine.search(query)?;
        if urls.is_empty() {
            writeln!(out, "No documents found.")?;
        } else {
            writeln!(out, "Displaying top {} results for \"{}\":", urls.len(), query)?;
            for (i, url) in urls.iter().enumerate() {
                writeln!(out, "\t{}. {}", i + 1, url)?;
            }
        }
        tracing::debug!(query, elapsed_ms = start.elapsed().as_secs_f64() * 1000.0, "query answered");
    }
    Ok(())
}
