//! Edit session endpoints
//!
//! Thin wrappers over `EditSession`; every call made while a save holds the
//! session answers 409.

use axum::{extract::State, Json};
use clubcard_common::time::today;
use serde::Serialize;
use tracing::warn;

use crate::card::{card_for, CardView};
use crate::error::ApiResult;
use crate::session::{Draft, DraftUpdate, SaveFailure, SessionError, SessionView};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: SessionView,
    pub card: Option<CardView>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// True when the saved record was found again after reload
    pub verified: bool,
    pub message: String,
    pub card: Option<CardView>,
}

fn session_response(view: SessionView) -> SessionResponse {
    let card = view.record.as_ref().map(|record| card_for(record, today()));
    SessionResponse {
        session: view,
        card,
    }
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> ApiResult<Json<SessionResponse>> {
    let session = state.session.try_lock()?;
    Ok(Json(session_response(session.view())))
}

/// POST /api/session/edit
pub async fn begin_edit(State(state): State<AppState>) -> ApiResult<Json<Draft>> {
    let mut session = state.session.try_lock()?;
    let draft = session.begin_edit()?;
    Ok(Json(draft.clone()))
}

/// PUT /api/session/draft
pub async fn update_draft(
    State(state): State<AppState>,
    Json(update): Json<DraftUpdate>,
) -> ApiResult<Json<Draft>> {
    let mut session = state.session.try_lock()?;
    let draft = session.update_draft(update)?;
    Ok(Json(draft.clone()))
}

/// POST /api/session/cancel
pub async fn cancel_edit(State(state): State<AppState>) -> ApiResult<Json<SessionResponse>> {
    let mut session = state.session.try_lock()?;
    session.cancel();
    Ok(Json(session_response(session.view())))
}

/// POST /api/session/save
///
/// An unverified save (record not found again, or reload failed) is still a
/// 200 with `verified: false`: the write was dispatched and the card is the
/// optimistic record as the save left it.
pub async fn save_changes(State(state): State<AppState>) -> ApiResult<Json<SaveResponse>> {
    let result = state
        .session
        .save(
            state.gateway.clone(),
            state.store.clone(),
            state.session_config.clone(),
        )
        .await;

    match result {
        Ok(record) => Ok(Json(SaveResponse {
            verified: true,
            message: "Member information updated successfully".to_string(),
            card: Some(card_for(&record, today())),
        })),
        Err(SaveFailure { error, selected }) if error.is_unverified() => {
            warn!("Save finished unverified: {}", error);
            Ok(Json(SaveResponse {
                verified: false,
                message: error.to_string(),
                card: selected.as_ref().map(|record| card_for(record, today())),
            }))
        }
        Err(SaveFailure {
            error: error @ SessionError::Transport(_),
            ..
        }) => {
            warn!("Save failed, draft kept for retry: {}", error);
            Err(error.into())
        }
        Err(failure) => Err(failure.error.into()),
    }
}
