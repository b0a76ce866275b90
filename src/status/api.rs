//! Status API
//!
//! - `GET /` runs a fixed test query through the completion gateway
//! - `GET /debug` (alias `/userHistory`) dumps every conversation as JSON
//! - `GET /health`, `GET /healthz` for monitoring

use crate::conversation::ConversationSnapshot;
use crate::router::Router as MessageRouter;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Query sent by `GET /`
pub const TEST_QUERY: &str = "Test Query";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Router owning the store and gateway
    pub router: Arc<MessageRouter>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Application version
    pub version: &'static str,
}

impl AppState {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self {
            router,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub participants: usize,
    pub turns: usize,
    pub paused: bool,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// Completion smoke test
///
/// 200 with the reply as plain text, 500 if every attempt failed.
pub async fn test_query(State(state): State<Arc<AppState>>) -> Response {
    match state.router.gateway().try_complete(TEST_QUERY).await {
        Ok(reply) => (StatusCode::OK, reply).into_response(),
        Err(e) => {
            error!("Error details: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "An error occurred").into_response()
        }
    }
}

/// Full conversation dump, keyed by participant id
pub async fn user_history(State(state): State<Arc<AppState>>) -> Json<ConversationSnapshot> {
    let snapshot = state.router.store().snapshot();
    debug!("Serving history for {} participants", snapshot.len());
    Json(snapshot)
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.router.store().stats();
    Json(HealthResponse {
        status: "ok",
        version: state.version,
        uptime_secs: state.uptime_secs(),
        participants: stats.participants,
        turns: stats.turns,
        paused: state.router.is_paused(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Liveness probe
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Create status router
pub fn status_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(test_query))
        .route("/debug", get(user_history))
        .route("/userHistory", get(user_history))
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .with_state(state)
}
