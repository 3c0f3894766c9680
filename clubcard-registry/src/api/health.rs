//! Liveness probe
//!
//! Reports the in-memory snapshot size; never reaches the hosted sheet, so
//! it answers even while the source is unreachable.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Short commit hash the binary was built from
    pub build: &'static str,
    /// Members in the active snapshot; 0 until the first successful load
    pub members: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        build: env!("GIT_HASH"),
        members: state.store.all().len(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
