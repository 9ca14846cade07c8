//! Bounty Board Server
//!
//! HTTP endpoints for the winner subsystem. Upstream authentication is a
//! separate concern; the authenticated user id arrives in the `x-user-id`
//! header and the authorization resolver decides what it may do.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::authz;
use crate::error::ApiError;
use crate::exchange::RateSource;
use crate::models::Bounty;
use crate::notify::Notifier;
use crate::storage::MarketStore;
use crate::winners::{self, AnnouncedWinner};

pub struct AppState {
    pub store: Arc<MarketStore>,
    pub rates: Arc<dyn RateSource>,
    pub notifier: Arc<dyn Notifier>,
    pub started_at: std::time::Instant,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/bounties/:bounty_id/submissions/:submission_id/position",
            patch(position_handler),
        )
        .route("/bounties/:bounty_id/winners", post(announce_handler))
        .route("/bounties/:bounty_id/winners/reset", patch(reset_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Authenticated caller identity, provided by the upstream auth layer.
fn require_caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or(ApiError::Unauthenticated)
}

fn load_bounty(store: &MarketStore, bounty_id: &str) -> Result<Bounty, ApiError> {
    store
        .get_bounty(bounty_id)?
        .ok_or_else(|| ApiError::NotFound("Bounty not found".to_string()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub uptime_secs: u64,
    pub version: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// PATCH body. The `position` field is required: a positive integer
/// assigns, an explicit null clears. A body without the field is invalid
/// rather than a clear, so the outer Option tracks field presence and the
/// inner one carries the null.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    #[serde(default, deserialize_with = "present_position")]
    pub position: Option<Option<u32>>,
}

fn present_position<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

impl PositionRequest {
    fn desired_position(&self) -> Result<Option<u32>, ApiError> {
        self.position.ok_or_else(|| {
            ApiError::invalid_field("Position field is required", "position", "required")
        })
    }
}

async fn position_handler(
    State(state): State<Arc<AppState>>,
    Path((bounty_id, submission_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<PositionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let desired = request.desired_position()?;
    let caller = require_caller(&headers)?;
    let bounty = load_bounty(&state.store, &bounty_id)?;
    authz::require_winner_access(&state.store, &caller, &bounty)?;

    let update = winners::assign_position(
        &state.store,
        state.rates.as_ref(),
        &bounty,
        &submission_id,
        desired,
    )
    .await?;

    Ok(Json(json!({
        "message": update.message,
        "submission": update.submission,
        "displaced": update.displaced,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AnnounceRequest {
    pub winners: Vec<AnnouncedWinner>,
}

async fn announce_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AnnounceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = require_caller(&headers)?;
    let bounty = load_bounty(&state.store, &bounty_id)?;
    authz::require_winner_access(&state.store, &caller, &bounty)?;

    let outcome =
        winners::announce_winners(&state.store, &state.notifier, &bounty, &request.winners)
            .await?;

    Ok(Json(json!({
        "message": "Winners announced successfully",
        "bounty": outcome.bounty,
        "winners": outcome.winners,
    })))
}

async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = require_caller(&headers)?;
    let bounty = load_bounty(&state.store, &bounty_id)?;
    authz::require_winner_access(&state.store, &caller, &bounty)?;

    let outcome = winners::reset_winners(&state.store, &bounty.id)?;

    Ok(Json(json!({
        "message": "Winners reset successfully",
        "resetCount": outcome.reset_count,
        "affectedSubmissions": outcome.affected_submissions,
    })))
}

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting Bounty Board server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_caller() {
        let mut headers = HeaderMap::new();
        assert!(require_caller(&headers).is_err());

        headers.insert("x-user-id", "".parse().unwrap());
        assert!(require_caller(&headers).is_err());

        headers.insert("x-user-id", "alice".parse().unwrap());
        assert_eq!(require_caller(&headers).unwrap(), "alice");
    }

    #[test]
    fn test_position_field_must_be_present() {
        // A body without the field is a bad request, not a clear.
        let request: PositionRequest = serde_json::from_str("{}").unwrap();
        let err = request.desired_position().unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));

        let request: PositionRequest = serde_json::from_str(r#"{"position": null}"#).unwrap();
        assert_eq!(request.desired_position().unwrap(), None);

        let request: PositionRequest = serde_json::from_str(r#"{"position": 2}"#).unwrap();
        assert_eq!(request.desired_position().unwrap(), Some(2));
    }
}
