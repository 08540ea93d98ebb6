use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{
        stores::{CatalogStore, QuoteStore, ReviewStore, UserStore},
        BlindDateSelector, QuizMatcher, RecommendationService, RecommendationSettings,
    },
};

pub mod blind_date;
pub mod quiz;
pub mod recommendations;

/// Services shared by every handler
pub struct AppState {
    pub recommendations: RecommendationService,
    pub quiz: QuizMatcher,
    pub blind_date: BlindDateSelector,
}

impl AppState {
    /// Wires every service to a single store implementing all collaborator traits
    pub fn from_store<S>(store: Arc<S>, settings: RecommendationSettings) -> Self
    where
        S: CatalogStore + ReviewStore + UserStore + QuoteStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store, settings)
    }

    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        reviews: Arc<dyn ReviewStore>,
        users: Arc<dyn UserStore>,
        quotes: Arc<dyn QuoteStore>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            recommendations: RecommendationService::new(
                catalog.clone(),
                reviews,
                users,
                settings,
            ),
            quiz: QuizMatcher::new(catalog.clone()),
            blind_date: BlindDateSelector::new(quotes, catalog),
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/users/:user_id/recommendations",
            get(recommendations::recommend),
        )
        .route("/quiz", post(quiz::submit))
        .route("/blind-date", get(blind_date::random))
        .route("/blind-date/tag/:tag", get(blind_date::by_tag))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
