//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::error::LeaseError;
use crate::health::HealthResponse;
use crate::manager::PoolStats;
use crate::pool::{Token, TokenId};
use crate::service::{HealthSnapshot, TokenService};
use crate::version::VersionInfo;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: HealthResponse,
    pub tokens: PoolStats,
    /// Timers armed in the scheduler and not yet fired.
    pub pending_timers: usize,
    /// Scheduled actions that panicked since startup.
    pub failed_actions: u64,
    pub version: VersionInfo,
}

impl HealthCheckResponse {
    pub fn from_snapshot(snapshot: HealthSnapshot) -> Self {
        let status = if snapshot.is_busy() {
            HealthResponse::Busy
        } else {
            snapshot.state.into()
        };

        Self {
            status,
            tokens: snapshot.tokens,
            pending_timers: snapshot.pending_timers,
            failed_actions: snapshot.failed_actions,
            version: snapshot.version,
        }
    }
}

impl IntoResponse for LeaseError {
    fn into_response(self) -> Response {
        // Exhaustion is reported like a missing token: there is nothing to hand out.
        let status = match self {
            LeaseError::NotFound(_) | LeaseError::PoolExhausted => StatusCode::NOT_FOUND,
        };
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

async fn health_check(State(service): State<Arc<TokenService>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::from_snapshot(service.health().await))
}

async fn generate(State(service): State<Arc<TokenService>>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(service.generate()))
}

async fn assign(State(service): State<Arc<TokenService>>) -> Result<Json<Token>, LeaseError> {
    service.assign().map(Json)
}

async fn unassign(
    State(service): State<Arc<TokenService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, LeaseError> {
    service.unassign(&TokenId::from(id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn keep_alive(
    State(service): State<Arc<TokenService>>,
    Path(id): Path<String>,
) -> Result<Json<Token>, LeaseError> {
    service.keep_alive(&TokenId::from(id)).map(Json)
}

async fn list_tokens(State(service): State<Arc<TokenService>>) -> Json<Vec<Token>> {
    Json(service.list())
}

async fn get_token(
    State(service): State<Arc<TokenService>>,
    Path(id): Path<String>,
) -> Result<Json<Token>, LeaseError> {
    service.get(&TokenId::from(id)).map(Json)
}

async fn delete_token(
    State(service): State<Arc<TokenService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, LeaseError> {
    service.delete(&TokenId::from(id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown(State(service): State<Arc<TokenService>>) -> impl IntoResponse {
    tracing::info!("Shutdown requested via HTTP");
    service.trigger_shutdown();
    (StatusCode::OK, Json(serde_json::json!({})))
}

pub fn routes(service: Arc<TokenService>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/shutdown", post(shutdown))
        .route("/tokens", get(list_tokens))
        .route("/tokens/generate", post(generate))
        .route("/tokens/assign", get(assign))
        .route("/tokens/unassign/{id}", post(unassign))
        .route("/tokens/{id}/keep-alive", post(keep_alive))
        .route("/tokens/{id}", get(get_token).delete(delete_token))
        .with_state(service)
}
