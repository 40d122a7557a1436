//! HTTP routing.
//!
//! All endpoints live under `/api` and share one [`AppState`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::owm::OwmClient;

pub mod health;
pub mod models;
pub mod predict;
pub mod predictions;
pub mod weather;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: sqlx::PgPool,
    pub(crate) owm_client: OwmClient,
    pub(crate) config: Arc<AppConfig>,
}

/// Build the `/api` router.
pub(crate) fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/predict", post(predict::predict))
        .route("/api/weather/current", get(weather::get_current_weather))
        .route(
            "/api/weather/historical",
            get(weather::get_historical_weather),
        )
        .route(
            "/api/weather/observations",
            post(weather::create_observation),
        )
        .route(
            "/api/predictions/history",
            get(predictions::get_prediction_history),
        )
        .route("/api/predictions", post(predictions::create_prediction))
        .route(
            "/api/models/performance",
            get(models::get_model_performance).post(models::create_model_performance),
        )
        .route("/api/train", post(models::train_model))
        .with_state(state)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}
