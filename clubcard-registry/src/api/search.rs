//! Plate search
//!
//! A hit selects the record in the session and returns its card. A miss
//! clears the session so the view shows the not-found state.

use axum::{
    extract::{Query, State},
    Json,
};
use clubcard_common::time::today;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::card::{card_for, CardView};
use crate::error::{ApiError, ApiResult};
use crate::plate;
use crate::record::MemberRecord;
use crate::AppState;

/// Query parameters for plate search
#[derive(Debug, Deserialize)]
pub struct PlateQuery {
    #[serde(default)]
    pub plate: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Query as searched (trimmed, uppercased)
    pub query: String,
    pub card: CardView,
    pub record: MemberRecord,
}

/// GET /api/search?plate=WXY1234
pub async fn search_member(
    State(state): State<AppState>,
    Query(query): Query<PlateQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let searched = query.plate.trim().to_uppercase();
    if searched.is_empty() {
        return Err(ApiError::BadRequest("Please enter a plate number".to_string()));
    }

    let snapshot = state.store.all();
    let mut session = state.session.try_lock()?;

    match plate::find(&snapshot, &searched) {
        Some(record) => {
            info!(plate = %searched, row = record.source_row, "Member found");
            session.select(record.clone());
            Ok(Json(SearchResponse {
                query: searched,
                card: card_for(record, today()),
                record: record.clone(),
            }))
        }
        None => {
            info!(plate = %searched, "No member found");
            session.clear();
            Err(ApiError::NotFound(format!(
                "No member found with plate {}",
                searched
            )))
        }
    }
}
