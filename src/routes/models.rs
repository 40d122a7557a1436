//! Model bookkeeping endpoints.
//!
//! - GET  /api/models/performance?model_name=
//! - POST /api/models/performance
//! - POST /api/train

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::AppState;
use crate::db::models;
use crate::db::queries::{self, InsertModelPerformanceParams};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{opt_dec_to_f64, opt_f64_to_decimal};
use crate::services::validation::{check_tag, check_unit_interval, parse_datetime_param};

const PERFORMANCE_FAILED: &str = "Failed to fetch model performance";
const PERFORMANCE_STORE_FAILED: &str = "Failed to store model performance";

const DEFAULT_MODEL_TYPE: &str = "ensemble";
const MAX_MODEL_NAME_LEN: usize = 100;
const MAX_MODEL_VERSION_LEN: usize = 50;
const MAX_EVENT_TYPE_LEN: usize = 50;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PerformanceQuery {
    /// Only records for this model
    pub model_name: Option<String>,
}

/// Evaluation metrics for one model run.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PerformanceRequest {
    /// Evaluation time, ISO 8601. Defaults to now.
    pub timestamp: Option<String>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub event_type: Option<String>,
    pub validation_samples: Option<i32>,
    pub validation_period_start: Option<String>,
    pub validation_period_end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceResponse {
    pub id: Uuid,
    /// Evaluation time (RFC 3339)
    pub timestamp: String,
    pub model_name: String,
    pub model_version: Option<String>,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub event_type: Option<String>,
    pub validation_samples: Option<i32>,
    pub validation_period_start: Option<String>,
    pub validation_period_end: Option<String>,
}

impl From<models::ModelPerformance> for PerformanceResponse {
    fn from(m: models::ModelPerformance) -> Self {
        Self {
            id: m.id,
            timestamp: m.timestamp.to_rfc3339(),
            model_name: m.model_name,
            model_version: m.model_version,
            accuracy: opt_dec_to_f64(m.accuracy),
            precision: opt_dec_to_f64(m.precision),
            recall: opt_dec_to_f64(m.recall),
            f1_score: opt_dec_to_f64(m.f1_score),
            rmse: opt_dec_to_f64(m.rmse),
            mae: opt_dec_to_f64(m.mae),
            event_type: m.event_type,
            validation_samples: m.validation_samples,
            validation_period_start: m.validation_period_start.map(|t| t.to_rfc3339()),
            validation_period_end: m.validation_period_end.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceListResponse {
    pub success: bool,
    pub count: usize,
    /// Newest first, at most 50
    pub metrics: Vec<PerformanceResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceCreatedResponse {
    pub success: bool,
    pub metric: PerformanceResponse,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TrainRequest {
    /// Model family, default "ensemble"
    pub model_type: Option<String>,
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainResponse {
    pub success: bool,
    pub message: String,
    pub model_type: String,
    pub event_type: Option<String>,
    /// Always "queued"
    pub status: String,
}

/// List the latest model evaluation records.
#[utoipa::path(
    get,
    path = "/api/models/performance",
    tag = "Models",
    params(PerformanceQuery),
    responses(
        (status = 200, description = "Evaluation records", body = PerformanceListResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub(crate) async fn get_model_performance(
    State(state): State<AppState>,
    query: Result<Query<PerformanceQuery>, QueryRejection>,
) -> Result<Json<PerformanceListResponse>, AppError> {
    let Query(params) = query?;
    let model_name = params
        .model_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let rows = queries::get_model_performance(&state.pool, model_name)
        .await
        .map_err(|e| AppError::from(e).or_generic(PERFORMANCE_FAILED))?;

    let metrics: Vec<PerformanceResponse> =
        rows.into_iter().map(PerformanceResponse::from).collect();
    Ok(Json(PerformanceListResponse {
        success: true,
        count: metrics.len(),
        metrics,
    }))
}

/// Store evaluation metrics reported by an external training run.
#[utoipa::path(
    post,
    path = "/api/models/performance",
    tag = "Models",
    request_body = PerformanceRequest,
    responses(
        (status = 201, description = "Record stored", body = PerformanceCreatedResponse),
        (status = 400, description = "Invalid metrics", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub(crate) async fn create_model_performance(
    State(state): State<AppState>,
    payload: Result<Json<PerformanceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PerformanceCreatedResponse>), AppError> {
    let Json(request) = payload?;
    let params = validate_performance(request)?;

    let stored = queries::insert_model_performance(&state.pool, params)
        .await
        .map_err(|e| AppError::from(e).or_generic(PERFORMANCE_STORE_FAILED))?;

    tracing::info!("Stored performance record for model {}", stored.model_name);
    Ok((
        StatusCode::CREATED,
        Json(PerformanceCreatedResponse {
            success: true,
            metric: stored.into(),
        }),
    ))
}

fn validate_performance(
    request: PerformanceRequest,
) -> Result<InsertModelPerformanceParams, AppError> {
    let model_name = request
        .model_name
        .ok_or_else(|| AppError::MissingField(vec!["model_name"]))?;
    check_tag("model_name", &model_name, MAX_MODEL_NAME_LEN)?;
    if let Some(version) = &request.model_version {
        check_tag("model_version", version, MAX_MODEL_VERSION_LEN)?;
    }
    if let Some(event_type) = &request.event_type {
        check_tag("event_type", event_type, MAX_EVENT_TYPE_LEN)?;
    }

    for (field, value) in [
        ("accuracy", request.accuracy),
        ("precision", request.precision),
        ("recall", request.recall),
        ("f1_score", request.f1_score),
    ] {
        check_unit_interval(field, value)?;
    }
    for (field, value) in [("rmse", request.rmse), ("mae", request.mae)] {
        if matches!(value, Some(v) if !(v >= 0.0 && v.is_finite())) {
            return Err(AppError::Validation(format!(
                "Invalid {}. Must be a non-negative number",
                field
            )));
        }
    }
    if matches!(request.validation_samples, Some(n) if n < 0) {
        return Err(AppError::Validation(
            "validation_samples must not be negative".to_string(),
        ));
    }

    let parse = |field: &str, raw: Option<String>| {
        raw.as_deref()
            .map(|s| parse_datetime_param(field, s))
            .transpose()
    };
    let timestamp = parse("timestamp", request.timestamp)?;
    let validation_period_start = parse("validation_period_start", request.validation_period_start)?;
    let validation_period_end = parse("validation_period_end", request.validation_period_end)?;
    if let (Some(start), Some(end)) = (validation_period_start, validation_period_end) {
        if start > end {
            return Err(AppError::Validation(
                "validation_period_start must not be after validation_period_end".to_string(),
            ));
        }
    }

    Ok(InsertModelPerformanceParams {
        timestamp,
        model_name,
        model_version: request.model_version,
        accuracy: opt_f64_to_decimal(request.accuracy),
        precision: opt_f64_to_decimal(request.precision),
        recall: opt_f64_to_decimal(request.recall),
        f1_score: opt_f64_to_decimal(request.f1_score),
        rmse: opt_f64_to_decimal(request.rmse),
        mae: opt_f64_to_decimal(request.mae),
        event_type: request.event_type,
        validation_samples: request.validation_samples,
        validation_period_start,
        validation_period_end,
    })
}

/// Acknowledge a training request.
///
/// No training backend exists; the request is logged and answered with a
/// "queued" status without doing any work. The body is optional.
#[utoipa::path(
    post,
    path = "/api/train",
    tag = "Models",
    request_body(content = TrainRequest, description = "Optional training parameters"),
    responses(
        (status = 200, description = "Request acknowledged", body = TrainResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
    )
)]
pub(crate) async fn train_model(
    payload: Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<TrainResponse>, AppError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => TrainRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };

    let model_type = request
        .model_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL_TYPE.to_string());
    tracing::warn!(
        "Training requested for {} ({}) but no training backend is available",
        model_type,
        request.event_type.as_deref().unwrap_or("all events")
    );

    Ok(Json(TrainResponse {
        success: true,
        message: "Training initiated".to_string(),
        model_type,
        event_type: request.event_type,
        status: "queued".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, post_json, send, test_config, test_router};
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn request(body: serde_json::Value) -> PerformanceRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_train_without_body() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let req = Request::builder()
            .method("POST")
            .uri("/api/train")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "success": true,
                "message": "Training initiated",
                "model_type": "ensemble",
                "event_type": null,
                "status": "queued"
            })
        );
    }

    #[tokio::test]
    async fn test_train_echoes_parameters() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, body) = send(
            router,
            post_json(
                "/api/train",
                serde_json::json!({ "model_type": "lstm", "event_type": "storm" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_type"], "lstm");
        assert_eq!(body["event_type"], "storm");
        assert_eq!(body["status"], "queued");
    }

    #[tokio::test]
    async fn test_train_rejects_malformed_json() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let req = Request::builder()
            .method("POST")
            .uri("/api/train")
            .header("content-type", "application/json")
            .body(Body::from("{\"model_type\":"))
            .unwrap();
        let (status, _) = send(router, req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_performance_database_failure_is_generic() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, body) = send(router, get("/api/models/performance?model_name=lstm")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch model performance");
    }

    #[tokio::test]
    async fn test_create_performance_requires_model_name() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, body) = send(
            router,
            post_json(
                "/api/models/performance",
                serde_json::json!({ "accuracy": 0.9 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: model_name");
    }

    #[test]
    fn test_validate_performance_accepts_full_record() {
        let params = validate_performance(request(serde_json::json!({
            "model_name": "lstm",
            "model_version": "2.0",
            "accuracy": 0.91, "precision": 0.88, "recall": 0.8, "f1_score": 0.84,
            "rmse": 1.7, "mae": 1.1,
            "event_type": "heatwave",
            "validation_samples": 365,
            "validation_period_start": "2025-01-01",
            "validation_period_end": "2025-12-31"
        })))
        .unwrap();

        assert_eq!(params.model_name, "lstm");
        assert!(params.timestamp.is_none());
        assert_eq!(params.validation_samples, Some(365));
        assert!(params.validation_period_start < params.validation_period_end);
    }

    #[test]
    fn test_validate_performance_rejects_bad_metrics() {
        for body in [
            serde_json::json!({ "model_name": "m", "accuracy": 1.2 }),
            serde_json::json!({ "model_name": "m", "recall": -0.1 }),
            serde_json::json!({ "model_name": "m", "rmse": -1.0 }),
            serde_json::json!({ "model_name": "m", "validation_samples": -3 }),
            serde_json::json!({ "model_name": "  " }),
            serde_json::json!({
                "model_name": "m",
                "validation_period_start": "2025-06-01",
                "validation_period_end": "2025-01-01"
            }),
        ] {
            let err = validate_performance(request(body.clone())).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{}: {:?}", body, err);
        }
    }
}
