//! Health check handler
//!
//! Provides the health endpoint for monitoring and load balancers.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Challenges issued and not yet consumed or expired
    pub pending_challenges: usize,
}

/// GET /health - Health check endpoint
///
/// Returns JSON with service status, version and the number of live
/// challenges in the ledger.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.orchestrator.ledger().stats();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "passkey-server",
        pending_challenges: stats.live,
    })
}
