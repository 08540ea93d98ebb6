use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{ScoredCandidate, UserId},
    routes::AppState,
};

const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
}

/// Handler for personalized recommendations
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    user_id: Result<Path<UserId>, PathRejection>,
    params: Result<Query<RecommendationQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ScoredCandidate>>> {
    let Path(user_id) = user_id?;
    let Query(params) = params?;

    if let Some(limit) = params.limit {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            )));
        }
    }

    tracing::info!(
        request_id = %request_id,
        user_id,
        limit = params.limit,
        "Processing recommendation request"
    );

    let recommendations = state
        .recommendations
        .personalized_recommendations(user_id, params.limit)
        .await?;

    tracing::info!(
        request_id = %request_id,
        count = recommendations.len(),
        "Recommendations completed"
    );

    Ok(Json(recommendations))
}
