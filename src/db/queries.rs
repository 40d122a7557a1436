use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{ModelPerformance, Prediction, PredictionMetadata, WeatherObservation};

/// Half width of the bounding box used for location lookups, in degrees.
const BOUNDING_BOX_HALF_WIDTH: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
/// Maximum rows returned by the historical observation query.
pub const MAX_OBSERVATION_ROWS: i64 = 1000;
/// Maximum rows returned by the model performance query.
pub const MAX_PERFORMANCE_ROWS: i64 = 50;

const OBSERVATION_COLUMNS: &str = r#"id, "timestamp", latitude, longitude, location_name,
    temperature, humidity, pressure, wind_speed, wind_direction,
    precipitation, cloud_cover, visibility, source"#;

const PREDICTION_COLUMNS: &str = r#"id, created_at, prediction_date, latitude, longitude, location_name,
    event_type, probability, confidence,
    predicted_temperature, predicted_precipitation, predicted_wind_speed,
    model_name, model_version, metadata"#;

const PERFORMANCE_COLUMNS: &str = r#"id, "timestamp", model_name, model_version,
    accuracy, "precision", recall, f1_score, rmse, mae, event_type,
    validation_samples, validation_period_start, validation_period_end"#;

/// A ±0.5° square around a coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: Decimal,
    pub max_latitude: Decimal,
    pub min_longitude: Decimal,
    pub max_longitude: Decimal,
}

impl BoundingBox {
    pub fn around(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            min_latitude: latitude - BOUNDING_BOX_HALF_WIDTH,
            max_latitude: latitude + BOUNDING_BOX_HALF_WIDTH,
            min_longitude: longitude - BOUNDING_BOX_HALF_WIDTH,
            max_longitude: longitude + BOUNDING_BOX_HALF_WIDTH,
        }
    }
}

/// Parameters for inserting a new observation.
#[derive(Debug)]
pub struct InsertObservationParams {
    pub timestamp: DateTime<Utc>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub location_name: Option<String>,
    pub temperature: Option<Decimal>,
    pub humidity: Option<Decimal>,
    pub pressure: Option<Decimal>,
    pub wind_speed: Option<Decimal>,
    pub wind_direction: Option<Decimal>,
    pub precipitation: Option<Decimal>,
    pub cloud_cover: Option<Decimal>,
    pub visibility: Option<Decimal>,
    pub source: String,
}

/// Parameters for inserting a new prediction.
#[derive(Debug)]
pub struct InsertPredictionParams {
    pub prediction_date: DateTime<Utc>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub location_name: Option<String>,
    pub event_type: Option<String>,
    pub probability: Option<Decimal>,
    pub confidence: Option<Decimal>,
    pub predicted_temperature: Option<Decimal>,
    pub predicted_precipitation: Option<Decimal>,
    pub predicted_wind_speed: Option<Decimal>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub metadata: PredictionMetadata,
}

/// Parameters for inserting a model performance record.
#[derive(Debug)]
pub struct InsertModelPerformanceParams {
    pub timestamp: Option<DateTime<Utc>>,
    pub model_name: String,
    pub model_version: Option<String>,
    pub accuracy: Option<Decimal>,
    pub precision: Option<Decimal>,
    pub recall: Option<Decimal>,
    pub f1_score: Option<Decimal>,
    pub rmse: Option<Decimal>,
    pub mae: Option<Decimal>,
    pub event_type: Option<String>,
    pub validation_samples: Option<i32>,
    pub validation_period_start: Option<DateTime<Utc>>,
    pub validation_period_end: Option<DateTime<Utc>>,
}

/// Insert a new observation (append-only).
pub async fn insert_observation(
    pool: &PgPool,
    params: InsertObservationParams,
) -> Result<WeatherObservation, sqlx::Error> {
    let sql = format!(
        r#"INSERT INTO weather_data (
            id, "timestamp", latitude, longitude, location_name,
            temperature, humidity, pressure, wind_speed, wind_direction,
            precipitation, cloud_cover, visibility, source
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {}"#,
        OBSERVATION_COLUMNS
    );
    sqlx::query_as::<_, WeatherObservation>(&sql)
        .bind(Uuid::new_v4())
        .bind(params.timestamp)
        .bind(params.latitude)
        .bind(params.longitude)
        .bind(&params.location_name)
        .bind(params.temperature)
        .bind(params.humidity)
        .bind(params.pressure)
        .bind(params.wind_speed)
        .bind(params.wind_direction)
        .bind(params.precipitation)
        .bind(params.cloud_cover)
        .bind(params.visibility)
        .bind(&params.source)
        .fetch_one(pool)
        .await
}

/// Observations inside `bbox`, optionally within `[start, end]`, newest first.
pub async fn get_observations_near(
    pool: &PgPool,
    bbox: BoundingBox,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<WeatherObservation>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {}
         FROM weather_data
         WHERE latitude BETWEEN $1 AND $2
           AND longitude BETWEEN $3 AND $4
           AND ($5::timestamptz IS NULL OR "timestamp" >= $5)
           AND ($6::timestamptz IS NULL OR "timestamp" <= $6)
         ORDER BY "timestamp" DESC
         LIMIT $7"#,
        OBSERVATION_COLUMNS
    );
    sqlx::query_as::<_, WeatherObservation>(&sql)
        .bind(bbox.min_latitude)
        .bind(bbox.max_latitude)
        .bind(bbox.min_longitude)
        .bind(bbox.max_longitude)
        .bind(start)
        .bind(end)
        .bind(MAX_OBSERVATION_ROWS)
        .fetch_all(pool)
        .await
}

/// Insert a new prediction (append-only).
pub async fn insert_prediction(
    pool: &PgPool,
    params: InsertPredictionParams,
) -> Result<Prediction, sqlx::Error> {
    let sql = format!(
        r#"INSERT INTO predictions (
            id, created_at, prediction_date, latitude, longitude, location_name,
            event_type, probability, confidence,
            predicted_temperature, predicted_precipitation, predicted_wind_speed,
            model_name, model_version, metadata
        ) VALUES ($1, NOW(), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {}"#,
        PREDICTION_COLUMNS
    );
    sqlx::query_as::<_, Prediction>(&sql)
        .bind(Uuid::new_v4())
        .bind(params.prediction_date)
        .bind(params.latitude)
        .bind(params.longitude)
        .bind(&params.location_name)
        .bind(&params.event_type)
        .bind(params.probability)
        .bind(params.confidence)
        .bind(params.predicted_temperature)
        .bind(params.predicted_precipitation)
        .bind(params.predicted_wind_speed)
        .bind(&params.model_name)
        .bind(&params.model_version)
        .bind(Json(params.metadata))
        .fetch_one(pool)
        .await
}

/// Predictions newest first, optionally restricted to `bbox`.
pub async fn get_prediction_history(
    pool: &PgPool,
    bbox: Option<BoundingBox>,
    limit: i64,
) -> Result<Vec<Prediction>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {}
         FROM predictions
         WHERE ($1::numeric IS NULL OR latitude BETWEEN $1 AND $2)
           AND ($3::numeric IS NULL OR longitude BETWEEN $3 AND $4)
         ORDER BY created_at DESC
         LIMIT $5"#,
        PREDICTION_COLUMNS
    );
    sqlx::query_as::<_, Prediction>(&sql)
        .bind(bbox.map(|b| b.min_latitude))
        .bind(bbox.map(|b| b.max_latitude))
        .bind(bbox.map(|b| b.min_longitude))
        .bind(bbox.map(|b| b.max_longitude))
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Insert a model performance record (append-only).
pub async fn insert_model_performance(
    pool: &PgPool,
    params: InsertModelPerformanceParams,
) -> Result<ModelPerformance, sqlx::Error> {
    let sql = format!(
        r#"INSERT INTO model_performance (
            id, "timestamp", model_name, model_version,
            accuracy, "precision", recall, f1_score, rmse, mae, event_type,
            validation_samples, validation_period_start, validation_period_end
        ) VALUES ($1, COALESCE($2, NOW()), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {}"#,
        PERFORMANCE_COLUMNS
    );
    sqlx::query_as::<_, ModelPerformance>(&sql)
        .bind(Uuid::new_v4())
        .bind(params.timestamp)
        .bind(&params.model_name)
        .bind(&params.model_version)
        .bind(params.accuracy)
        .bind(params.precision)
        .bind(params.recall)
        .bind(params.f1_score)
        .bind(params.rmse)
        .bind(params.mae)
        .bind(&params.event_type)
        .bind(params.validation_samples)
        .bind(params.validation_period_start)
        .bind(params.validation_period_end)
        .fetch_one(pool)
        .await
}

/// Latest performance records, optionally for one model only.
pub async fn get_model_performance(
    pool: &PgPool,
    model_name: Option<&str>,
) -> Result<Vec<ModelPerformance>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {}
         FROM model_performance
         WHERE ($1::text IS NULL OR model_name = $1)
         ORDER BY "timestamp" DESC
         LIMIT $2"#,
        PERFORMANCE_COLUMNS
    );
    sqlx::query_as::<_, ModelPerformance>(&sql)
        .bind(model_name)
        .bind(MAX_PERFORMANCE_ROWS)
        .fetch_all(pool)
        .await
}
