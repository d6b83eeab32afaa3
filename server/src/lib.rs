use anyhow::{Context, Result};
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use minblast_core::config::SearchConfig;
use minblast_core::engine::{AlignedHit, SearchEngine};
use minblast_core::index::IndexStore;
use minblast_core::persist::{load_flat_index, load_meta, load_sequence_store, IndexPaths};
use minblast_core::sled_index::SledIndex;
use minblast_core::{Error, SeqId};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub mod remote;

use remote::RemoteIndex;

/// Where minimizer postings are looked up. Sequence records always come from
/// the local index directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    Flat,
    Sled,
    Remote,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: PathBuf,
    pub backend: Backend,
    pub remote_url: Option<String>,
    pub remote_index: String,
    pub search: SearchConfig,
    pub admin_token: Option<String>,
}

impl ServerConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            backend: Backend::Flat,
            remote_url: None,
            remote_index: "sequences".into(),
            search: SearchConfig::default(),
            admin_token: None,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "searchString")]
    pub search_string: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<AlignedHit>,
}

#[derive(Serialize)]
pub struct IndexInfo {
    pub num_sequences: usize,
    pub num_minimizers: usize,
    pub k: usize,
    pub w: usize,
}

#[derive(Clone)]
pub struct AppState {
    engine: Arc<RwLock<Arc<SearchEngine>>>,
    config: Arc<ServerConfig>,
    residues: Regex,
}

impl AppState {
    /// Snapshot of the current engine. A concurrent reload swaps the pointer but
    /// never touches an engine a request already holds.
    fn engine(&self) -> Arc<SearchEngine> {
        self.engine.read().clone()
    }
}

type ApiError = (StatusCode, String);

/// Open the configured index. Any storage failure here is a startup failure.
pub async fn load_engine(config: &ServerConfig) -> Result<SearchEngine> {
    let paths = IndexPaths::new(&config.index_dir);
    let meta = load_meta(&paths).with_context(|| format!("loading index metadata from {}", config.index_dir.display()))?;
    let params = meta.params()?;
    let sequences = Arc::new(load_sequence_store(&paths)?);
    let index: Arc<dyn IndexStore> = match config.backend {
        Backend::Flat => Arc::new(load_flat_index(&paths)?),
        Backend::Sled => Arc::new(SledIndex::open(&paths)?),
        Backend::Remote => {
            let url = config.remote_url.as_deref().context("the remote backend needs a remote url")?;
            Arc::new(RemoteIndex::connect(url, &config.remote_index).await?)
        }
    };
    tracing::info!(
        backend = ?config.backend,
        num_sequences = sequences.len(),
        num_minimizers = index.size(),
        k = params.k,
        w = params.w,
        "index loaded"
    );
    Ok(SearchEngine::new(index, sequences, params, config.search.clone())?)
}

pub async fn build_app(config: ServerConfig) -> Result<Router> {
    // Load index at startup
    let engine = load_engine(&config).await?;
    let app_state = AppState {
        engine: Arc::new(RwLock::new(Arc::new(engine))),
        config: Arc::new(config),
        residues: Regex::new(r"^[A-Z*]+$")?,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/search", post(search_handler))
        .route("/sequence/:id", get(sequence_handler))
        .route("/index/info", get(info_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

/// Strip whitespace and an optional FASTA header, then upper-case.
fn normalize_query(raw: &str) -> String {
    let body = match raw.trim_start().strip_prefix('>') {
        Some(rest) => rest.split_once('\n').map(|(_, seq)| seq).unwrap_or(""),
        None => raw,
    };
    body.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_uppercase()
}

pub async fn search_handler(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let query = normalize_query(&req.search_string);
    // an empty query sketches to nothing and answers with zero hits
    if !query.is_empty() && !state.residues.is_match(&query) {
        return Err((StatusCode::BAD_REQUEST, "query may contain only residue letters and '*'".into()));
    }

    let engine = state.engine();
    let timeout = Duration::from_millis(engine.config().timeout_ms);
    let q = query.clone();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let task = tokio::task::spawn_blocking(move || engine.query_cancellable(q.as_bytes(), &flag));
    let out = match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            // the blocking task notices the flag at its next index call and exits
            cancel.store(true, Ordering::Relaxed);
            tracing::warn!(query_len = query.len(), ?timeout, "search timed out");
            return Err((StatusCode::GATEWAY_TIMEOUT, "search timed out".into()));
        }
        Ok(Err(join)) => return Err((StatusCode::INTERNAL_SERVER_ERROR, join.to_string())),
        Ok(Ok(res)) => res.map_err(internal)?,
    };

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query, took_s: elapsed.as_secs_f64(), total_hits: out.total_hits, results: out.results }))
}

pub async fn sequence_handler(State(state): State<AppState>, Path(id): Path<SeqId>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.engine().resolve(id) {
        Ok(rec) => Ok(Json(serde_json::json!({
            "id": rec.id,
            "description": rec.description,
            "residues": String::from_utf8_lossy(&rec.residues),
        }))),
        Err(Error::NotFound(_)) => Err((StatusCode::NOT_FOUND, format!("sequence {id} not found"))),
        Err(e) => Err(internal(e)),
    }
}

pub async fn info_handler(State(state): State<AppState>) -> Json<IndexInfo> {
    let engine = state.engine();
    let params = engine.params();
    Json(IndexInfo {
        num_sequences: engine.num_sequences(),
        num_minimizers: engine.index().size(),
        k: params.k,
        w: params.w,
    })
}

// --- Admin endpoints ---
async fn reload_handler(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<Json<IndexInfo>, ApiError> {
    authorize(&state, &headers)?;
    let engine = load_engine(&state.config).await.map_err(|e| {
        tracing::error!(error = %e, "reload failed, keeping current index");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {e:#}"))
    })?;
    *state.engine.write() = Arc::new(engine);
    tracing::info!("index reloaded");
    Ok(info_handler(State(state)).await)
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), ApiError> {
    let required = match &state.config.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn internal(e: Error) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
