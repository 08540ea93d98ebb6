use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{QuizAnswer, QuizOutcome},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    /// A missing or null list is treated as empty
    #[serde(default)]
    pub answers: Option<Vec<QuizAnswer>>,
}

/// Handler for quiz submissions
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> AppResult<Json<QuizOutcome>> {
    let Json(request) = payload?;
    let answers = request.answers.unwrap_or_default();

    tracing::info!(
        request_id = %request_id,
        answers = answers.len(),
        "Processing quiz"
    );

    let outcome = state.quiz.match_answers(&answers).await?;
    Ok(Json(outcome))
}
