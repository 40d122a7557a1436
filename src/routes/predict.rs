//! Forecast endpoint.
//!
//! - POST /api/predict: 5-day forecast, one representative entry per day

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{FixedOffset, Local, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use utoipa::ToSchema;

use super::AppState;
use crate::config::DayBoundary;
use crate::errors::{AppError, ErrorResponse};
use crate::services::forecast::{aggregate_daily, format_clock, DailyForecastSummary};
use crate::services::owm::OwmForecastResponse;
use crate::services::validation::{validate_location, CoordinateInput, ValidatedLocation};

const PREDICT_FAILED: &str = "Failed to generate predictions";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PredictRequest {
    /// Latitude in degrees, number or numeric string
    pub latitude: Option<CoordinateInput>,
    /// Longitude in degrees, number or numeric string
    pub longitude: Option<CoordinateInput>,
    /// Display label for the location
    pub location_name: Option<String>,
}

/// Location block of the forecast response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    /// City name reported by the provider, else the caller's label
    pub name: String,
    /// ISO 3166 country code, empty when unknown
    pub country: String,
    /// Local sunrise "HH:MM:SS", or "N/A"
    pub sunrise: String,
    /// Local sunset "HH:MM:SS", or "N/A"
    pub sunset: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictResponse {
    pub success: bool,
    pub location: LocationInfo,
    /// At most 5 entries, `day_offset` ascending from 0
    pub predictions: Vec<DailyForecastSummary>,
    /// Response generation time (RFC 3339)
    pub generated_at: String,
}

/// Generate a simplified 5-day forecast for a coordinate.
///
/// Fetches the OpenWeatherMap 3-hour feed and keeps one sample per calendar
/// day, preferring the 12:00 sample.
#[utoipa::path(
    post,
    path = "/api/predict",
    tag = "Forecasts",
    request_body = PredictRequest,
    responses(
        (status = 200, description = "Daily forecast", body = PredictResponse),
        (status = 400, description = "Missing or out-of-range coordinates", body = ErrorResponse),
        (status = 500, description = "API key not configured or weather provider failure", body = ErrorResponse),
    )
)]
pub(crate) async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let Json(request) = payload?;
    let location = validate_location(
        request.latitude.as_ref(),
        request.longitude.as_ref(),
        request.location_name.as_deref(),
    )?;

    let forecast = state
        .owm_client
        .fetch_forecast(
            location.coordinates.latitude,
            location.coordinates.longitude,
        )
        .await
        .map_err(|e| e.or_generic(PREDICT_FAILED))?;

    let response = match state.config.day_boundary {
        DayBoundary::ServerLocal => build_response(&location, &forecast, &Local),
        DayBoundary::Location => {
            let offset = forecast
                .city
                .timezone
                .and_then(FixedOffset::east_opt)
                .unwrap_or_else(|| Utc.fix());
            build_response(&location, &forecast, &offset)
        }
    };

    tracing::info!("Generated forecast for {}", location.label);
    Ok(Json(response))
}

fn build_response<Tz>(
    location: &ValidatedLocation,
    forecast: &OwmForecastResponse,
    tz: &Tz,
) -> PredictResponse
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let city = &forecast.city;
    PredictResponse {
        success: true,
        location: LocationInfo {
            latitude: location.coordinates.latitude,
            longitude: location.coordinates.longitude,
            name: city
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| location.label.clone()),
            country: city.country.clone().unwrap_or_default(),
            sunrise: format_clock(city.sunrise, tz),
            sunset: format_clock(city.sunset, tz),
        },
        predictions: aggregate_daily(&forecast.list, tz),
        generated_at: Utc::now().to_rfc3339(),
    }
}
