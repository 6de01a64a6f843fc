//! HTTP server for the questlog REST API.
//!
//! Serves the JSON API under `/api` and the bundled web client (when
//! present) for everything else, with an SPA index fallback. Startup
//! retries the port bind with exponential backoff instead of failing the
//! process.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::db::Database;
use crate::error::ApiError;
use crate::llm::{self, LlmClient};
use crate::progression;
use crate::types::{Achievement, HistoryEntry, Task, TaskDraft, TaskPatch, UpdateOutcome, User};

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self)).into_response()
    }
}

/// API server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    /// Reference to the task database.
    db: Arc<Database>,
    /// The singleton user whose progression updates target.
    user_id: i64,
}

impl ApiServer {
    pub fn new(db: Arc<Database>, user_id: i64) -> Self {
        Self { db, user_id }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_tasks(State(state): State<ApiServer>) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.db().list_tasks().map_err(ApiError::from)?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<ApiServer>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.db().create_task(draft).map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .db()
        .get_task(task_id)
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;
    Ok(Json(task))
}

/// Apply a partial update and return the full outcome (history count, XP,
/// level change, unlocked achievements) so clients never re-derive the
/// progression logic.
async fn update_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<i64>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    let outcome = progression::apply_task_update(state.db(), state.user_id(), task_id, &patch)
        .map_err(ApiError::from)?;
    Ok(Json(outcome))
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: usize,
}

async fn delete_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.db().delete_task(task_id).map_err(ApiError::from)?;
    if deleted == 0 {
        return Err(ApiError::task_not_found(task_id));
    }
    Ok(Json(DeleteResponse { deleted }))
}

async fn task_history(
    State(state): State<ApiServer>,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    // History of a deleted task remains readable, so no existence check.
    let entries = state.db().task_history(task_id).map_err(ApiError::from)?;
    Ok(Json(entries))
}

async fn get_user(State(state): State<ApiServer>) -> Result<Json<User>, ApiError> {
    let user = state
        .db()
        .get_user(state.user_id())
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::user_not_found(&state.user_id().to_string()))?;
    Ok(Json(user))
}

async fn list_achievements(
    State(state): State<ApiServer>,
) -> Result<Json<Vec<Achievement>>, ApiError> {
    let achievements = state
        .db()
        .list_achievements(state.user_id())
        .map_err(ApiError::from)?;
    Ok(Json(achievements))
}

async fn get_settings(
    State(state): State<ApiServer>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let settings = state.db().get_settings().map_err(ApiError::from)?;
    Ok(Json(settings))
}

/// Settings update payload. Only the LLM settings are writable.
#[derive(Debug, Deserialize)]
struct SettingsPatch {
    llm_ip: Option<String>,
    llm_model: Option<String>,
}

async fn update_settings(
    State(state): State<ApiServer>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    if let Some(ref llm_ip) = patch.llm_ip {
        state
            .db()
            .set_setting("llm_ip", llm_ip)
            .map_err(ApiError::from)?;
    }
    if let Some(ref llm_model) = patch.llm_model {
        state
            .db()
            .set_setting("llm_model", llm_model)
            .map_err(ApiError::from)?;
    }

    let settings = state.db().get_settings().map_err(ApiError::from)?;
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    prompt: String,
}

/// Draft a task with the configured LLM. The draft is returned for the
/// client to review and submit via `POST /api/tasks`; nothing is persisted
/// here.
async fn generate_task(
    State(state): State<ApiServer>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<TaskDraft>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::missing_field("prompt"));
    }

    let endpoint = state
        .db()
        .get_setting("llm_ip")
        .map_err(ApiError::from)?
        .unwrap_or_else(|| llm::DEFAULT_ENDPOINT.to_string());
    let model = state
        .db()
        .get_setting("llm_model")
        .map_err(ApiError::from)?
        .unwrap_or_else(|| llm::DEFAULT_MODEL.to_string());

    let client = LlmClient::new(endpoint, model)?;
    let draft = client.generate_task(&request.prompt).await?;
    Ok(Json(draft))
}

/// Build the router with all routes.
fn build_router(state: ApiServer, static_dir: &std::path::Path) -> Router {
    // Permissive CORS so the dev client can talk to the API from another port
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/tasks/{task_id}/history", get(task_history))
        .route("/api/tasks/generate", post(generate_task))
        .route("/api/user", get(get_user))
        .route("/api/achievements", get(list_achievements))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/health", get(health));

    // Serve the bundled web client when it exists, with an SPA fallback to
    // index.html for client-side routes.
    let router = if static_dir.is_dir() {
        let index = static_dir.join("index.html");
        router.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index)))
    } else {
        router
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Status of the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Server is running and serving requests.
    Running,
    /// Server failed to start, retrying in background.
    Retrying,
    /// Server has been shut down.
    Stopped,
}

/// Handle for managing the API server lifecycle.
pub struct ServerHandle {
    /// Channel to signal shutdown.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Receiver for status updates.
    status_rx: watch::Receiver<ServerStatus>,
}

impl ServerHandle {
    /// Get the current status of the server.
    pub fn status(&self) -> ServerStatus {
        *self.status_rx.borrow()
    }

    /// Trigger shutdown of the server.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Start the HTTP server on the configured port.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    db: Arc<Database>,
    user_id: i64,
    config: &ServerConfig,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let state = ApiServer::new(db, user_id);
    let app = build_router(state, &config.static_dir);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

/// Compute jittered delay for retry.
/// Uses system time nanoseconds for simple jitter without requiring rand crate.
fn compute_jittered_delay(base_ms: u64, jitter_ms: u64) -> Duration {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    // Map nanos to range [-jitter_ms, +jitter_ms]
    let jitter_range = (jitter_ms * 2) as i64;
    let jitter = if jitter_range > 0 {
        (nanos as i64 % jitter_range) - (jitter_ms as i64)
    } else {
        0
    };

    let delay_ms = (base_ms as i64 + jitter).max(250) as u64;
    Duration::from_millis(delay_ms)
}

/// Start the HTTP server with automatic retry on failure.
///
/// This function never fails - if the port is in use, it will retry in the
/// background with exponential backoff. Returns a handle to monitor and
/// control the server.
pub fn start_server_with_retry(
    db: Arc<Database>,
    user_id: i64,
    config: &ServerConfig,
) -> ServerHandle {
    let config = config.clone();
    let retry_jitter_ms = config.retry_jitter_ms;
    let retry_max_ms = config.retry_max_ms;
    let retry_multiplier = config.retry_multiplier;

    let (status_tx, status_rx) = watch::channel(ServerStatus::Retrying);
    let (handle_shutdown_tx, mut handle_shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut current_delay_ms = config.retry_initial_ms;
        let mut server_shutdown_tx: Option<oneshot::Sender<()>> = None;

        loop {
            // Check if we've been asked to shut down
            match handle_shutdown_rx.try_recv() {
                Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                    info!("Server retry loop shutting down");
                    if let Some(tx) = server_shutdown_tx.take() {
                        let _ = tx.send(());
                    }
                    let _ = status_tx.send(ServerStatus::Stopped);
                    break;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }

            match start_server(Arc::clone(&db), user_id, &config).await {
                Ok((shutdown_tx, bound_addr)) => {
                    info!("questlog available at http://{}", bound_addr);
                    let _ = status_tx.send(ServerStatus::Running);
                    server_shutdown_tx = Some(shutdown_tx);

                    // Wait for shutdown signal
                    let _ = handle_shutdown_rx.await;
                    info!("Server handle shutdown received");
                    if let Some(tx) = server_shutdown_tx.take() {
                        let _ = tx.send(());
                    }
                    let _ = status_tx.send(ServerStatus::Stopped);
                    break;
                }
                Err(e) => {
                    warn!(
                        "Failed to start server on port {}: {}. Retrying in {:.1}s...",
                        config.port,
                        e,
                        current_delay_ms as f64 / 1000.0
                    );
                    let _ = status_tx.send(ServerStatus::Retrying);

                    let delay = compute_jittered_delay(current_delay_ms, retry_jitter_ms);
                    tokio::time::sleep(delay).await;

                    // Exponential backoff, capped at max
                    current_delay_ms =
                        ((current_delay_ms as f64 * retry_multiplier) as u64).min(retry_max_ms);
                }
            }
        }
    });

    ServerHandle {
        shutdown_tx: Some(handle_shutdown_tx),
        status_rx,
    }
}
