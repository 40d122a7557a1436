//! Weather observation endpoints.
//!
//! - GET  /api/weather/current?latitude=&longitude=
//! - GET  /api/weather/historical?latitude=&longitude=&start_date=&end_date=
//! - POST /api/weather/observations

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::AppState;
use crate::db::models;
use crate::db::queries::{self, BoundingBox, InsertObservationParams};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{dec_to_f64, f64_to_decimal, number_to_decimal, opt_dec_to_f64, opt_f64_to_decimal};
use crate::services::owm::OwmCurrentResponse;
use crate::services::validation::{
    check_tag, parse_datetime_param, parse_time_window, validate_coordinates, CoordinateInput,
    Coordinates,
};

const CURRENT_FAILED: &str = "Failed to fetch weather data";
const HISTORICAL_FAILED: &str = "Failed to fetch historical data";
const OBSERVATION_FAILED: &str = "Failed to store observation";

/// Source tag for observations recorded from current-weather lookups.
const OWM_SOURCE: &str = "OpenWeatherMap";
const MAX_SOURCE_LEN: usize = 50;
const MAX_LOCATION_NAME_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Query parameter / request structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoordinateQuery {
    /// Latitude in degrees (-90..=90)
    pub latitude: Option<String>,
    /// Longitude in degrees (-180..=180)
    pub longitude: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoricalQuery {
    /// Latitude in degrees (-90..=90)
    pub latitude: Option<String>,
    /// Longitude in degrees (-180..=180)
    pub longitude: Option<String>,
    /// Inclusive lower bound, ISO 8601 date or datetime
    pub start_date: Option<String>,
    /// Inclusive upper bound, ISO 8601 date or datetime
    pub end_date: Option<String>,
}

/// A new observation from any data source.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ObservationRequest {
    /// Observation time, ISO 8601. Defaults to now.
    pub timestamp: Option<String>,
    pub latitude: Option<CoordinateInput>,
    pub longitude: Option<CoordinateInput>,
    pub location_name: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub visibility: Option<f64>,
    /// Data provider, e.g. "NOAA"
    pub source: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherData {
    /// Lookup time (RFC 3339)
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Station / city name reported by the provider, may be empty
    pub location_name: String,
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    #[schema(value_type = f64)]
    pub humidity: serde_json::Number,
    /// Pressure in hPa
    #[schema(value_type = f64)]
    pub pressure: serde_json::Number,
    /// Wind speed in m/s
    pub wind_speed: f64,
    pub weather_description: String,
    pub weather_icon: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherResponse {
    pub success: bool,
    pub data: CurrentWeatherData,
}

/// A stored weather observation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ObservationResponse {
    pub id: Uuid,
    /// Observation time (RFC 3339)
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub visibility: Option<f64>,
    pub source: String,
}

impl From<models::WeatherObservation> for ObservationResponse {
    fn from(o: models::WeatherObservation) -> Self {
        Self {
            id: o.id,
            timestamp: o.timestamp.to_rfc3339(),
            latitude: dec_to_f64(o.latitude),
            longitude: dec_to_f64(o.longitude),
            location_name: o.location_name,
            temperature: opt_dec_to_f64(o.temperature),
            humidity: opt_dec_to_f64(o.humidity),
            pressure: opt_dec_to_f64(o.pressure),
            wind_speed: opt_dec_to_f64(o.wind_speed),
            wind_direction: opt_dec_to_f64(o.wind_direction),
            precipitation: opt_dec_to_f64(o.precipitation),
            cloud_cover: opt_dec_to_f64(o.cloud_cover),
            visibility: opt_dec_to_f64(o.visibility),
            source: o.source,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoricalWeatherResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<ObservationResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObservationCreatedResponse {
    pub success: bool,
    pub data: ObservationResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Get current conditions for a coordinate.
///
/// When observation recording is enabled the lookup is also stored in
/// `weather_data`; a storage failure is logged and does not fail the request.
#[utoipa::path(
    get,
    path = "/api/weather/current",
    tag = "Weather",
    params(CoordinateQuery),
    responses(
        (status = 200, description = "Current conditions", body = CurrentWeatherResponse),
        (status = 400, description = "Missing or invalid coordinates", body = ErrorResponse),
        (status = 500, description = "Weather provider failure", body = ErrorResponse),
    )
)]
pub(crate) async fn get_current_weather(
    State(state): State<AppState>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> Result<Json<CurrentWeatherResponse>, AppError> {
    let Query(params) = query?;
    let coordinates = validate_coordinates(
        params.latitude.map(CoordinateInput::from).as_ref(),
        params.longitude.map(CoordinateInput::from).as_ref(),
    )?;

    let current = state
        .owm_client
        .fetch_current(coordinates.latitude, coordinates.longitude)
        .await
        .map_err(|e| e.or_generic(CURRENT_FAILED))?;

    if state.config.record_observations {
        let params = observation_from_current(&coordinates, &current);
        let pool = state.pool.clone();
        // Detached: the response never waits on the database.
        tokio::spawn(async move {
            if let Err(e) = queries::insert_observation(&pool, params).await {
                tracing::warn!("Failed to record current-weather observation: {}", e);
            }
        });
    }

    let (description, icon) = current
        .weather
        .first()
        .map(|w| (w.description.clone(), w.icon.clone()))
        .unwrap_or_default();

    Ok(Json(CurrentWeatherResponse {
        success: true,
        data: CurrentWeatherData {
            timestamp: Utc::now().to_rfc3339(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            location_name: current.name.unwrap_or_default(),
            temperature: current.main.temp,
            humidity: current.main.humidity,
            pressure: current.main.pressure,
            wind_speed: current.wind.speed,
            weather_description: description,
            weather_icon: icon,
        },
    }))
}

/// Map a current-weather payload to an observation row.
fn observation_from_current(
    coordinates: &Coordinates,
    current: &OwmCurrentResponse,
) -> InsertObservationParams {
    let rain = current.rain.as_ref().and_then(|r| r.one_hour);
    let snow = current.snow.as_ref().and_then(|s| s.one_hour);
    let precipitation = match (rain, snow) {
        (None, None) => None,
        (r, s) => Some(r.unwrap_or(0.0) + s.unwrap_or(0.0)),
    };

    InsertObservationParams {
        timestamp: Utc::now(),
        latitude: f64_to_decimal(coordinates.latitude),
        longitude: f64_to_decimal(coordinates.longitude),
        location_name: current.name.clone().filter(|n| !n.is_empty()),
        temperature: Some(f64_to_decimal(current.main.temp)),
        humidity: number_to_decimal(&current.main.humidity),
        pressure: number_to_decimal(&current.main.pressure),
        wind_speed: Some(f64_to_decimal(current.wind.speed)),
        wind_direction: current.wind.deg.as_ref().and_then(number_to_decimal),
        precipitation: opt_f64_to_decimal(precipitation),
        cloud_cover: current.clouds.as_ref().and_then(|c| number_to_decimal(&c.all)),
        visibility: current.visibility.as_ref().and_then(number_to_decimal),
        source: OWM_SOURCE.to_string(),
    }
}

/// Get stored observations within ±0.5° of a coordinate, newest first (max 1000).
#[utoipa::path(
    get,
    path = "/api/weather/historical",
    tag = "Weather",
    params(HistoricalQuery),
    responses(
        (status = 200, description = "Stored observations", body = HistoricalWeatherResponse),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub(crate) async fn get_historical_weather(
    State(state): State<AppState>,
    query: Result<Query<HistoricalQuery>, QueryRejection>,
) -> Result<Json<HistoricalWeatherResponse>, AppError> {
    let Query(params) = query?;
    let coordinates = validate_coordinates(
        params.latitude.map(CoordinateInput::from).as_ref(),
        params.longitude.map(CoordinateInput::from).as_ref(),
    )?;
    let (start, end) = parse_time_window(params.start_date.as_deref(), params.end_date.as_deref())?;

    let bbox = BoundingBox::around(
        f64_to_decimal(coordinates.latitude),
        f64_to_decimal(coordinates.longitude),
    );
    let rows = queries::get_observations_near(&state.pool, bbox, start, end)
        .await
        .map_err(|e| AppError::from(e).or_generic(HISTORICAL_FAILED))?;

    let data: Vec<ObservationResponse> = rows.into_iter().map(ObservationResponse::from).collect();
    Ok(Json(HistoricalWeatherResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Store an observation from any data source.
#[utoipa::path(
    post,
    path = "/api/weather/observations",
    tag = "Weather",
    request_body = ObservationRequest,
    responses(
        (status = 201, description = "Observation stored", body = ObservationCreatedResponse),
        (status = 400, description = "Invalid observation", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub(crate) async fn create_observation(
    State(state): State<AppState>,
    payload: Result<Json<ObservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ObservationCreatedResponse>), AppError> {
    let Json(request) = payload?;
    let params = validate_observation(request)?;

    let stored = queries::insert_observation(&state.pool, params)
        .await
        .map_err(|e| AppError::from(e).or_generic(OBSERVATION_FAILED))?;

    tracing::info!("Stored observation {} from {}", stored.id, stored.source);
    Ok((
        StatusCode::CREATED,
        Json(ObservationCreatedResponse {
            success: true,
            data: stored.into(),
        }),
    ))
}

fn validate_observation(request: ObservationRequest) -> Result<InsertObservationParams, AppError> {
    let coordinates = validate_coordinates(request.latitude.as_ref(), request.longitude.as_ref())?;
    let source = request
        .source
        .ok_or_else(|| AppError::MissingField(vec!["source"]))?;
    check_tag("source", &source, MAX_SOURCE_LEN)?;
    if let Some(name) = &request.location_name {
        check_tag("location_name", name, MAX_LOCATION_NAME_LEN)?;
    }
    let timestamp = request
        .timestamp
        .as_deref()
        .map(|t| parse_datetime_param("timestamp", t))
        .transpose()?
        .unwrap_or_else(Utc::now);

    Ok(InsertObservationParams {
        timestamp,
        latitude: f64_to_decimal(coordinates.latitude),
        longitude: f64_to_decimal(coordinates.longitude),
        location_name: request.location_name,
        temperature: opt_f64_to_decimal(request.temperature),
        humidity: opt_f64_to_decimal(request.humidity),
        pressure: opt_f64_to_decimal(request.pressure),
        wind_speed: opt_f64_to_decimal(request.wind_speed),
        wind_direction: opt_f64_to_decimal(request.wind_direction),
        precipitation: opt_f64_to_decimal(request.precipitation),
        cloud_cover: opt_f64_to_decimal(request.cloud_cover),
        visibility: opt_f64_to_decimal(request.visibility),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{
        get, post_json, send, test_config, test_router, test_router_with_acquire_timeout,
    };
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body() -> serde_json::Value {
        serde_json::json!({
            "name": "Zurich",
            "main": {
                "temp": 4.2, "feels_like": 1.0, "temp_min": 3.0,
                "temp_max": 5.1, "humidity": 70, "pressure": 1020
            },
            "wind": { "speed": 3.6, "deg": 250 },
            "clouds": { "all": 20 },
            "visibility": 10000,
            "weather": [{ "description": "few clouds", "icon": "02d" }],
            "rain": { "1h": 0.2 },
            "snow": { "1h": 0.1 }
        })
    }

    fn observation_request(body: serde_json::Value) -> ObservationRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_current_weather_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "47.37"))
            .and(query_param("lon", "8.54"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .mount(&server)
            .await;

        let router = test_router(test_config(&server.uri(), Some("key")));
        let (status, body) = send(
            router,
            get("/api/weather/current?latitude=47.37&longitude=8.54"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["location_name"], "Zurich");
        assert_eq!(body["data"]["temperature"], 4.2);
        assert_eq!(body["data"]["humidity"], 70);
        assert_eq!(body["data"]["weather_description"], "few clouds");
        assert_eq!(body["data"]["weather_icon"], "02d");
    }

    #[tokio::test]
    async fn test_current_weather_does_not_wait_for_recording() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri(), Some("key"));
        config.record_observations = true;
        let router = test_router_with_acquire_timeout(config, Duration::from_secs(30));

        let started = Instant::now();
        let (status, body) = send(
            router,
            get("/api/weather/current?latitude=47.37&longitude=8.54"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["location_name"], "Zurich");
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "response took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_current_weather_rejects_bad_coordinates() {
        let router = test_router(test_config("http://127.0.0.1:1", Some("key")));
        let (status, body) = send(
            router,
            get("/api/weather/current?latitude=abc&longitude=8.54"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("latitude"));
    }

    #[tokio::test]
    async fn test_current_weather_missing_coordinates() {
        let router = test_router(test_config("http://127.0.0.1:1", Some("key")));
        let (status, body) = send(router, get("/api/weather/current")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: latitude, longitude");
    }

    #[tokio::test]
    async fn test_current_weather_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let router = test_router(test_config(&server.uri(), Some("key")));
        let (status, body) = send(
            router,
            get("/api/weather/current?latitude=1&longitude=2"),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Weather API error: Could not retrieve weather data");
    }

    #[tokio::test]
    async fn test_historical_requires_coordinates() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, body) = send(router, get("/api/weather/historical?latitude=10")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: longitude");
    }

    #[tokio::test]
    async fn test_historical_rejects_bad_dates() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, body) = send(
            router,
            get("/api/weather/historical?latitude=10&longitude=10&start_date=last-week"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("start_date"));
    }

    #[tokio::test]
    async fn test_create_observation_rejects_out_of_range() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, _) = send(
            router,
            post_json(
                "/api/weather/observations",
                serde_json::json!({ "latitude": 0, "longitude": 200, "source": "NOAA" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_observation_from_current() {
        let current: OwmCurrentResponse = serde_json::from_value(current_body()).unwrap();
        let coords = Coordinates {
            latitude: 47.37,
            longitude: 8.54,
        };
        let params = observation_from_current(&coords, &current);

        assert_eq!(params.source, "OpenWeatherMap");
        assert_eq!(params.location_name.as_deref(), Some("Zurich"));
        assert_eq!(params.latitude, Decimal::from_str("47.37").unwrap());
        assert_eq!(params.humidity, Some(Decimal::from(70)));
        assert_eq!(params.wind_direction, Some(Decimal::from(250)));
        assert_eq!(params.visibility, Some(Decimal::from(10000)));
        let precip = params.precipitation.unwrap();
        assert!((dec_to_f64(precip) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_observation_from_current_without_precipitation() {
        let mut body = current_body();
        body.as_object_mut().unwrap().remove("rain");
        body.as_object_mut().unwrap().remove("snow");
        let current: OwmCurrentResponse = serde_json::from_value(body).unwrap();
        let coords = Coordinates {
            latitude: 0.0,
            longitude: 0.0,
        };
        assert_eq!(observation_from_current(&coords, &current).precipitation, None);
    }

    #[test]
    fn test_validate_observation_requires_source() {
        let err = validate_observation(observation_request(serde_json::json!({
            "latitude": 1.0, "longitude": 2.0
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: source");
    }

    #[test]
    fn test_validate_observation_parses_timestamp() {
        let params = validate_observation(observation_request(serde_json::json!({
            "timestamp": "2026-03-01T06:00:00Z",
            "latitude": "51.5", "longitude": -0.12,
            "temperature": 7.5,
            "source": "NOAA"
        })))
        .unwrap();
        assert_eq!(params.timestamp.to_rfc3339(), "2026-03-01T06:00:00+00:00");
        assert_eq!(params.temperature, Some(Decimal::from_str("7.5").unwrap()));
        assert_eq!(params.source, "NOAA");
    }
}
