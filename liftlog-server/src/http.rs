//! Liftlog HTTP API
//!
//! Axum-based presentation boundary over the session tracker. Each endpoint
//! has a thin axum handler that delegates to an inner function returning
//! `(StatusCode, json)`; the inner functions are tested directly.
//!
//! Endpoints:
//! - GET    /health:       remote store check for the current user
//! - GET    /version:      server version info
//! - GET    /snapshot:     current tracker snapshot
//! - POST   /refresh:      refetch sessions
//! - POST   /sessions:     fill the form (optional) and submit it
//! - DELETE /sessions/:id: delete a session
//! - PUT    /form/:field:  update one form field
//! - PUT    /selection:    select the charted exercise
//! - PUT    /identity:     signal an identity change

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use liftlog_core::protocol::{TrackerRequest, TrackerResponse, PROTOCOL_VERSION};
use liftlog_core::{LiftlogConfig, SessionId};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router;
use crate::tracker::ViewStateController;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub controller: Arc<ViewStateController>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/refresh", post(refresh_handler))
        .route("/sessions", post(add_session_handler))
        .route("/sessions/:id", delete(delete_session_handler))
        .route("/form/:field", put(update_field_handler))
        .route("/selection", put(select_exercise_handler))
        .route("/identity", put(identity_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    controller: Arc<ViewStateController>,
    config: LiftlogConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { controller });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Liftlog HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Optional form values applied before submitting. Absent fields keep
/// whatever the form already holds.
#[derive(Debug, Deserialize, Default)]
pub struct AddSessionRequest {
    #[serde(default)]
    pub exercise: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub reps: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FieldValue {
    pub value: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct SelectionRequest {
    pub exercise: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct IdentityRequest {
    pub user_id: Option<String>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub async fn health_inner(controller: &ViewStateController) -> (StatusCode, serde_json::Value) {
    let resp = router::handle_request(TrackerRequest::Health, controller).await;
    let status = if resp.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, body_of(resp))
}

/// Pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL_VERSION,
    })
}

pub async fn dispatch_inner(
    controller: &ViewStateController,
    request: TrackerRequest,
) -> (StatusCode, serde_json::Value) {
    let resp = router::handle_request(request, controller).await;
    (status_for(&resp), body_of(resp))
}

pub async fn add_session_inner(
    controller: &ViewStateController,
    req: AddSessionRequest,
) -> (StatusCode, serde_json::Value) {
    let fields = [("exercise", req.exercise), ("weight", req.weight), ("reps", req.reps)];
    for (field, value) in fields {
        if let Some(value) = value {
            let update = TrackerRequest::UpdateField {
                field: field.to_string(),
                value,
            };
            let resp = router::handle_request(update, controller).await;
            if !resp.is_ok() {
                return (status_for(&resp), body_of(resp));
            }
        }
    }
    dispatch_inner(controller, TrackerRequest::SubmitAdd).await
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.controller).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn snapshot_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = dispatch_inner(&state.controller, TrackerRequest::Snapshot).await;
    (status, Json(body))
}

pub async fn refresh_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = dispatch_inner(&state.controller, TrackerRequest::Refresh).await;
    (status, Json(body))
}

pub async fn add_session_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AddSessionRequest>,
) -> impl IntoResponse {
    let (status, body) = add_session_inner(&state.controller, req).await;
    (status, Json(body))
}

pub async fn delete_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<SessionId>,
) -> impl IntoResponse {
    let (status, body) =
        dispatch_inner(&state.controller, TrackerRequest::SubmitDelete { id }).await;
    (status, Json(body))
}

pub async fn update_field_handler(
    State(state): State<Arc<HttpState>>,
    Path(field): Path<String>,
    Json(req): Json<FieldValue>,
) -> impl IntoResponse {
    let request = TrackerRequest::UpdateField {
        field,
        value: req.value,
    };
    let (status, body) = dispatch_inner(&state.controller, request).await;
    (status, Json(body))
}

pub async fn select_exercise_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SelectionRequest>,
) -> impl IntoResponse {
    let request = TrackerRequest::SelectExercise {
        exercise: req.exercise,
    };
    let (status, body) = dispatch_inner(&state.controller, request).await;
    (status, Json(body))
}

pub async fn identity_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<IdentityRequest>,
) -> impl IntoResponse {
    let request = TrackerRequest::AuthChanged {
        user_id: req.user_id,
    };
    let (status, body) = dispatch_inner(&state.controller, request).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// HTTP status for a tracker response, keyed on its failure kind.
pub fn status_for(resp: &TrackerResponse) -> StatusCode {
    if resp.is_ok() {
        return StatusCode::OK;
    }
    match resp.kind.as_deref() {
        Some("validation") => StatusCode::UNPROCESSABLE_ENTITY,
        Some("busy") | Some("superseded") => StatusCode::CONFLICT,
        Some("identity_missing") => StatusCode::UNAUTHORIZED,
        Some("unknown_field") => StatusCode::BAD_REQUEST,
        Some("gateway") => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Flatten a tracker response into an HTTP body: the snapshot, plus
/// `error`/`kind` on failure.
pub fn body_of(resp: TrackerResponse) -> serde_json::Value {
    let mut body = resp.data.unwrap_or_else(|| serde_json::json!({}));
    if let Some(error) = resp.error {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("error".to_string(), serde_json::json!(error));
            obj.insert("kind".to_string(), serde_json::json!(resp.kind));
        }
    }
    body
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
