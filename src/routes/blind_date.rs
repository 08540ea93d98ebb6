use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::{error::AppResult, models::BlindDate, routes::AppState};

/// Handler for a random blind date
pub async fn random(State(state): State<Arc<AppState>>) -> AppResult<Json<BlindDate>> {
    Ok(Json(state.blind_date.blind_date().await?))
}

/// Handler for a blind date restricted to one tag
pub async fn by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> AppResult<Json<BlindDate>> {
    Ok(Json(state.blind_date.blind_date_by_tag(&tag).await?))
}
