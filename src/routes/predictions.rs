//! Stored event predictions.
//!
//! - GET  /api/predictions/history?latitude=&longitude=&limit=
//! - POST /api/predictions

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::AppState;
use crate::db::models::{self, PredictionMetadata};
use crate::db::queries::{self, BoundingBox, InsertPredictionParams};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{dec_to_f64, f64_to_decimal, opt_dec_to_f64, opt_f64_to_decimal};
use crate::services::validation::{
    check_tag, check_unit_interval, parse_datetime_param, resolve_limit, validate_coordinates,
    CoordinateInput,
};

const HISTORY_FAILED: &str = "Failed to fetch predictions";
const CREATE_FAILED: &str = "Failed to store prediction";

const MAX_EVENT_TYPE_LEN: usize = 50;
const MAX_MODEL_NAME_LEN: usize = 100;
const MAX_MODEL_VERSION_LEN: usize = 50;
const MAX_LOCATION_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Restrict to ±0.5° around this latitude (requires `longitude`)
    pub latitude: Option<String>,
    /// Restrict to ±0.5° around this longitude (requires `latitude`)
    pub longitude: Option<String>,
    /// Maximum rows, default 100, capped at 1000
    pub limit: Option<i64>,
}

/// A prediction produced by an external model run.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PredictionRequest {
    /// Target date of the prediction, ISO 8601
    pub prediction_date: Option<String>,
    pub latitude: Option<CoordinateInput>,
    pub longitude: Option<CoordinateInput>,
    pub location_name: Option<String>,
    /// e.g. "heatwave", "storm", "flood"
    pub event_type: Option<String>,
    /// Event probability in [0, 1]
    pub probability: Option<f64>,
    /// Model confidence in [0, 1]
    pub confidence: Option<f64>,
    pub predicted_temperature: Option<f64>,
    pub predicted_precipitation: Option<f64>,
    pub predicted_wind_speed: Option<f64>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    #[serde(default)]
    pub metadata: PredictionMetadata,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionResponse {
    pub id: Uuid,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Target date (RFC 3339)
    pub prediction_date: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: Option<String>,
    pub event_type: Option<String>,
    pub probability: Option<f64>,
    pub confidence: Option<f64>,
    pub predicted_temperature: Option<f64>,
    pub predicted_precipitation: Option<f64>,
    pub predicted_wind_speed: Option<f64>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub metadata: PredictionMetadata,
}

impl From<models::Prediction> for PredictionResponse {
    fn from(p: models::Prediction) -> Self {
        Self {
            id: p.id,
            created_at: p.created_at.to_rfc3339(),
            prediction_date: p.prediction_date.to_rfc3339(),
            latitude: dec_to_f64(p.latitude),
            longitude: dec_to_f64(p.longitude),
            location_name: p.location_name,
            event_type: p.event_type,
            probability: opt_dec_to_f64(p.probability),
            confidence: opt_dec_to_f64(p.confidence),
            predicted_temperature: opt_dec_to_f64(p.predicted_temperature),
            predicted_precipitation: opt_dec_to_f64(p.predicted_precipitation),
            predicted_wind_speed: opt_dec_to_f64(p.predicted_wind_speed),
            model_name: p.model_name,
            model_version: p.model_version,
            metadata: p.metadata.0,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionHistoryResponse {
    pub success: bool,
    pub count: usize,
    /// Newest first
    pub predictions: Vec<PredictionResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionCreatedResponse {
    pub success: bool,
    pub prediction: PredictionResponse,
}

/// List stored predictions, newest first.
///
/// The location filter applies only when both coordinates are given.
#[utoipa::path(
    get,
    path = "/api/predictions/history",
    tag = "Predictions",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Stored predictions", body = PredictionHistoryResponse),
        (status = 400, description = "Invalid coordinates or limit", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub(crate) async fn get_prediction_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<PredictionHistoryResponse>, AppError> {
    let Query(params) = query?;
    let limit = resolve_limit(params.limit)?;

    let bbox = match (params.latitude, params.longitude) {
        (Some(lat), Some(lon)) => {
            let coordinates = validate_coordinates(
                Some(&CoordinateInput::from(lat)),
                Some(&CoordinateInput::from(lon)),
            )?;
            Some(BoundingBox::around(
                f64_to_decimal(coordinates.latitude),
                f64_to_decimal(coordinates.longitude),
            ))
        }
        _ => None,
    };

    let rows = queries::get_prediction_history(&state.pool, bbox, limit)
        .await
        .map_err(|e| AppError::from(e).or_generic(HISTORY_FAILED))?;

    let predictions: Vec<PredictionResponse> =
        rows.into_iter().map(PredictionResponse::from).collect();
    Ok(Json(PredictionHistoryResponse {
        success: true,
        count: predictions.len(),
        predictions,
    }))
}

/// Store a prediction produced by an external model run.
#[utoipa::path(
    post,
    path = "/api/predictions",
    tag = "Predictions",
    request_body = PredictionRequest,
    responses(
        (status = 201, description = "Prediction stored", body = PredictionCreatedResponse),
        (status = 400, description = "Invalid prediction", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub(crate) async fn create_prediction(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PredictionCreatedResponse>), AppError> {
    let Json(request) = payload?;
    let params = validate_prediction(request)?;

    let stored = queries::insert_prediction(&state.pool, params)
        .await
        .map_err(|e| AppError::from(e).or_generic(CREATE_FAILED))?;

    tracing::info!(
        "Stored prediction {} ({})",
        stored.id,
        stored.event_type.as_deref().unwrap_or("untyped")
    );
    Ok((
        StatusCode::CREATED,
        Json(PredictionCreatedResponse {
            success: true,
            prediction: stored.into(),
        }),
    ))
}

fn validate_prediction(request: PredictionRequest) -> Result<InsertPredictionParams, AppError> {
    let coordinates = validate_coordinates(request.latitude.as_ref(), request.longitude.as_ref())?;
    let raw_date = request
        .prediction_date
        .ok_or_else(|| AppError::MissingField(vec!["prediction_date"]))?;
    let prediction_date = parse_datetime_param("prediction_date", &raw_date)?;

    check_unit_interval("probability", request.probability)?;
    check_unit_interval("confidence", request.confidence)?;
    for (field, value, max_len) in [
        ("event_type", &request.event_type, MAX_EVENT_TYPE_LEN),
        ("model_name", &request.model_name, MAX_MODEL_NAME_LEN),
        ("model_version", &request.model_version, MAX_MODEL_VERSION_LEN),
        ("location_name", &request.location_name, MAX_LOCATION_NAME_LEN),
    ] {
        if let Some(v) = value {
            check_tag(field, v, max_len)?;
        }
    }

    Ok(InsertPredictionParams {
        prediction_date,
        latitude: f64_to_decimal(coordinates.latitude),
        longitude: f64_to_decimal(coordinates.longitude),
        location_name: request.location_name,
        event_type: request.event_type,
        probability: opt_f64_to_decimal(request.probability),
        confidence: opt_f64_to_decimal(request.confidence),
        predicted_temperature: opt_f64_to_decimal(request.predicted_temperature),
        predicted_precipitation: opt_f64_to_decimal(request.predicted_precipitation),
        predicted_wind_speed: opt_f64_to_decimal(request.predicted_wind_speed),
        model_name: request.model_name,
        model_version: request.model_version,
        metadata: request.metadata,
    })
}
