//! clubcard-registry library - club member lookup, card view, and editing
//!
//! The core is a member-record state machine:
//! - `store`: immutable snapshots of the member sheet, replaced on reload
//! - `plate`: case/whitespace-insensitive plate lookup
//! - `session`: view/edit/save transitions for the selected member
//! - `stats`: dashboard aggregates
//! - `gateway`: the boundary to the hosted sheet and script endpoint
//!
//! `api` exposes it over HTTP for whatever front end renders the card.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod card;
pub mod error;
pub mod gateway;
pub mod plate;
pub mod record;
pub mod session;
pub mod stats;
pub mod store;

use gateway::SyncGateway;
use session::{SessionConfig, SharedSession};
use store::RecordStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub gateway: Arc<dyn SyncGateway>,
    /// The operator's edit session
    pub session: SharedSession,
    pub session_config: SessionConfig,
    /// Ask the gateway for remote insights before computing them locally
    pub insights_enabled: bool,
}

impl AppState {
    /// Create new application state with an empty store
    pub fn new(gateway: Arc<dyn SyncGateway>, session_config: SessionConfig) -> Self {
        Self {
            store: Arc::new(RecordStore::new(Arc::clone(&gateway))),
            gateway,
            session: SharedSession::new(),
            session_config,
            insights_enabled: true,
        }
    }

    pub fn with_insights(mut self, enabled: bool) -> Self {
        self.insights_enabled = enabled;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let api = Router::new()
        .route("/api/search", get(api::search_member))
        .route("/api/session", get(api::get_session))
        .route("/api/session/edit", post(api::begin_edit))
        .route("/api/session/draft", put(api::update_draft))
        .route("/api/session/cancel", post(api::cancel_edit))
        .route("/api/session/save", post(api::save_changes))
        .route("/api/dashboard", get(api::get_dashboard))
        .route("/api/insights", get(api::get_insights))
        .route("/api/reload", post(api::reload_records));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
