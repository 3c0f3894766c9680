//! Dashboard statistics, insights, and manual reload

use axum::{extract::State, Json};
use clubcard_common::time::today;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::stats::{
    insights_summary, state_counts, top_modifiers, ModifierEntry, StateCount, DEFAULT_TOP_LIMIT,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_members: usize,
    pub states: Vec<StateCount>,
    pub top_modifiers: Vec<ModifierEntry>,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    /// "remote" when the script endpoint answered, otherwise "local"
    pub source: &'static str,
    pub insights: String,
    pub metrics: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub records: usize,
}

/// GET /api/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let snapshot = state.store.all();
    Json(DashboardResponse {
        total_members: snapshot.len(),
        states: state_counts(&snapshot),
        top_modifiers: top_modifiers(&snapshot, DEFAULT_TOP_LIMIT),
    })
}

/// GET /api/insights
///
/// Prefers the remote insights source; any failure falls back to the local
/// summary of the current snapshot.
pub async fn get_insights(State(state): State<AppState>) -> ApiResult<Json<InsightsResponse>> {
    if state.insights_enabled {
        match state.gateway.fetch_insights().await {
            Ok(Some(remote)) if remote.success => {
                return Ok(Json(InsightsResponse {
                    source: "remote",
                    insights: remote.insights,
                    metrics: remote.metrics,
                }));
            }
            Ok(Some(_)) => warn!("Remote insights reported failure, using local summary"),
            Ok(None) => {}
            Err(e) => warn!("Remote insights unavailable, using local summary: {}", e),
        }
    }

    let snapshot = state.store.all();
    let summary = insights_summary(&snapshot, today());
    let metrics = serde_json::to_value(&summary.metrics)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(InsightsResponse {
        source: "local",
        insights: summary.insights,
        metrics,
    }))
}

/// POST /api/reload
pub async fn reload_records(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let snapshot = state.store.reload().await?;
    info!(records = snapshot.len(), "Member sheet reloaded on request");
    Ok(Json(ReloadResponse {
        records: snapshot.len(),
    }))
}
