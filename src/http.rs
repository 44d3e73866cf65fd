//! HTTP transport for sheet-mind.
//!
//! Every route is an explicit handler that runs only the work its action
//! needs. The per-interaction flow is strictly linear: credential, table,
//! agent, answer. Nothing here retries a failed interaction; the user asks
//! again if they want another attempt.

use crate::agent::{self, AgentCache, AgentKey, AgentQuery};
use crate::config::Config;
use crate::credential::{self, ApiKey};
use crate::error::{Result, SheetMindError};
use crate::sessions::SessionStore;
use crate::table::TableCache;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Page title, unchanged from the original app.
pub const PAGE_TITLE: &str = "Habla con tu Excel (Coach de Gimnasio 🤖)";
/// Warning returned when the question box is empty.
pub const EMPTY_QUESTION_WARNING: &str = "Escribe una pregunta primero.";
/// Session identity travels in this header.
pub const SESSION_HEADER: &str = "x-session-id";

/// The single-page UI, embedded at build time.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub tables: Arc<TableCache>,
    pub agents: Arc<AgentCache>,
    pub metrics: Arc<Mutex<HttpMetrics>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let ttl_secs = config.runtime.session_ttl_secs;
        let cache_max = config.runtime.agent_cache_max;
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new(ttl_secs)),
            tables: Arc::new(TableCache::new()),
            agents: Arc::new(AgentCache::new(cache_max)),
            metrics: Arc::new(Mutex::new(HttpMetrics::new())),
        }
    }
}

/// Request counters; ask latencies feed the p95 on the info endpoint.
#[derive(Debug, Clone)]
pub struct HttpMetrics {
    pub total_requests: u64,
    pub last_request_unix: u64,
    pub errors_total: u64,
    pub asks_total: u64,
    pub latencies: Vec<f64>, // ring buffer for p95
}

impl HttpMetrics {
    fn new() -> Self {
        Self {
            total_requests: 0,
            last_request_unix: std::time::SystemTime::UNIX_EPOCH
                .elapsed()
                .unwrap_or_default()
                .as_secs(),
            errors_total: 0,
            asks_total: 0,
            latencies: Vec::with_capacity(256),
        }
    }
}

fn session_id_from(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// Resolve the effective credential for this request: session value first,
/// then the environment fallback. Callers stop at the error; nothing
/// downstream of the gate may run without a key.
async fn resolve_key(state: &AppState, headers: &HeaderMap) -> Result<ApiKey> {
    let session_key = match session_id_from(headers) {
        Some(id) => state.sessions.touch(id).await.and_then(|s| s.api_key),
        None => None,
    };
    credential::resolve(session_key.as_ref(), &state.config.runtime)
}

/// Embedded single-page UI.
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Configuration snapshot plus cache and request counters.
pub async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.lock().await.clone();
    let (avg_latency_ms, p95_latency_ms) = if metrics.latencies.is_empty() {
        (None, None)
    } else {
        let sum: f64 = metrics.latencies.iter().sum();
        let avg = sum / metrics.latencies.len() as f64;
        let mut sorted = metrics.latencies.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let p95_idx = (sorted.len() as f64 * 0.95) as usize;
        (Some(avg), sorted.get(p95_idx).copied())
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "title": PAGE_TITLE,
            "agent": {
                "provider": state.config.agent.provider,
                "model": state.config.agent.model,
                "style": state.config.agent.style,
                "temperature": state.config.agent.temperature,
            },
            "table": {
                "path": state.config.table.path,
                "preview_rows": state.config.table.preview_rows,
                "cache": state.tables.stats(),
            },
            "agent_cache": state.agents.stats(),
            "sessions": state.sessions.count().await,
            "server": { "bind": state.config.runtime.http_bind.to_string() },
            "requests": {
                "total": metrics.total_requests,
                "errors": metrics.errors_total,
                "asks": metrics.asks_total,
                "last_request_unix": metrics.last_request_unix,
                "avg_latency_ms": avg_latency_ms,
                "p95_latency_ms": p95_latency_ms,
            },
        })
        .to_string(),
    )
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Create a session, optionally seeding it with a credential. Placeholder
/// values are dropped silently; the gate will report them as absent later.
pub async fn create_session_handler(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let api_key = req.api_key.as_deref().and_then(ApiKey::new);
    let masked = api_key.as_ref().map(|k| k.masked());
    let id = state.sessions.create(api_key).await;
    tracing::debug!(session_id = %id, has_key = masked.is_some(), "session created");
    Json(json!({ "ok": true, "session_id": id, "api_key": masked }))
}

#[derive(Debug, Deserialize)]
pub struct SetKeyRequest {
    pub api_key: String,
}

/// Store the typed-in credential on the caller's session. Unknown or expired
/// sessions get a fresh one so the key never lands in limbo.
pub async fn set_key_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetKeyRequest>,
) -> Result<impl IntoResponse> {
    let key = ApiKey::new(&req.api_key).ok_or_else(|| SheetMindError::Credential {
        message: credential::MISSING_KEY_NOTICE.to_string(),
    })?;
    let masked = key.masked();

    let session_id = match session_id_from(&headers) {
        Some(id) if state.sessions.set_key(id, key.clone()).await => id,
        _ => state.sessions.create(Some(key)).await,
    };
    Ok(Json(
        json!({ "ok": true, "session_id": session_id, "api_key": masked }),
    ))
}

/// Credential gate, then the cached table: shape caption, header and the
/// first preview rows.
pub async fn preview_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    resolve_key(&state, &headers).await?;

    let cfg = &state.config.table;
    let handle = state
        .tables
        .fetch(Path::new(&cfg.path), cfg.sheet.as_deref())
        .await?;
    let table = &handle.table;
    let (rows, cols) = table.shape();
    let head: Vec<Vec<String>> = table
        .head(cfg.preview_rows)
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect();

    Ok(Json(json!({
        "ok": true,
        "caption": table.caption(),
        "rows": rows,
        "cols": cols,
        "columns": table.columns,
        "head": head,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

/// One full interaction: validate, gate, load, delegate, normalize.
pub async fn ask_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse> {
    // Validation happens before the gate; an empty question touches nothing
    let question = req.question.trim();
    if question.is_empty() {
        return Err(SheetMindError::Validation {
            message: EMPTY_QUESTION_WARNING.to_string(),
        });
    }

    let api_key = resolve_key(&state, &headers).await?;

    let cfg = &state.config.table;
    let handle = state
        .tables
        .fetch(Path::new(&cfg.path), cfg.sheet.as_deref())
        .await?;

    let agent_key: AgentKey = (handle.fingerprint.clone(), api_key.fingerprint());
    let agent = match state.agents.get(&agent_key).await {
        Some(agent) => agent,
        None => {
            let built = agent::build_agent(&state.config, api_key, &handle.table)?;
            state.agents.insert(agent_key, built.clone()).await;
            built
        }
    };

    let query = AgentQuery::new(question);
    tracing::info!(
        question_chars = question.chars().count(),
        provider = agent.provider(),
        "delegating question to the data agent"
    );
    let started = Instant::now();
    let outcome = agent.ask(&query).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    {
        let mut m = state.metrics.lock().await;
        m.asks_total = m.asks_total.saturating_add(1);
    }

    match outcome {
        Ok(answer) => {
            let structured = answer.is_structured();
            let text = answer.into_text();
            tracing::info!(elapsed_ms, structured, "agent answered");
            Ok(Json(json!({
                "ok": true,
                "answer": text,
                "structured": structured,
                "elapsed_ms": elapsed_ms,
            })))
        }
        Err(e) => {
            tracing::warn!(elapsed_ms, error = %e, "agent interaction failed");
            Err(SheetMindError::Agent {
                message: format!("Error consultando el Excel: {}", e),
            })
        }
    }
}

/// Build the application router around shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .route("/api/session", post(create_session_handler))
        .route("/api/key", post(set_key_handler))
        .route("/api/preview", get(preview_handler))
        .route("/api/ask", post(ask_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            |State(metrics): State<Arc<Mutex<HttpMetrics>>>,
             req: axum::http::Request<Body>,
             next: axum::middleware::Next| async move {
                let is_ask = req.uri().path() == "/api/ask";
                let start = if is_ask { Some(Instant::now()) } else { None };
                let resp = next.run(req).await;
                let mut m = metrics.lock().await;
                if let Some(start_time) = start {
                    let latency_ms = start_time.elapsed().as_millis() as f64;
                    if latency_ms > 0.0 {
                        m.latencies.push(latency_ms);
                        if m.latencies.len() > 256 {
                            m.latencies.remove(0);
                        }
                    }
                }
                if !resp.status().is_success() {
                    m.errors_total = m.errors_total.saturating_add(1);
                }
                m.total_requests = m.total_requests.saturating_add(1);
                m.last_request_unix = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                resp
            },
        ))
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn start_http_server(config: Config) -> Result<()> {
    let bind = config.runtime.http_bind;
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener: {}", e))?;

    tracing::info!("Starting HTTP server on {}", bind);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
