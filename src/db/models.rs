use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A stored weather observation (`weather_data`). Append-only.
#[derive(Debug, Clone, FromRow)]
pub struct WeatherObservation {
    pub id: Uuid,
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

    /// Data provider, e.g. "OpenWeatherMap", "NOAA", "ECMWF".
    pub source: String,
}

/// Documented keys of the free-form part of a prediction.
///
/// Unknown keys are rejected on ingestion so the stored JSON cannot drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PredictionMetadata {
    /// Input features the model was evaluated on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Length of the training window in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_window_days: Option<u32>,
    /// Decision threshold applied to `probability`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Free-text remarks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A stored event prediction (`predictions`).
#[derive(Debug, Clone, FromRow)]
pub struct Prediction {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub prediction_date: DateTime<Utc>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub location_name: Option<String>,

    /// Free-form tag such as "heatwave", "storm" or "flood".
    pub event_type: Option<String>,
    pub probability: Option<Decimal>,
    pub confidence: Option<Decimal>,

    pub predicted_temperature: Option<Decimal>,
    pub predicted_precipitation: Option<Decimal>,
    pub predicted_wind_speed: Option<Decimal>,

    pub model_name: Option<String>,
    pub model_version: Option<String>,

    pub metadata: Json<PredictionMetadata>,
}

/// A model evaluation record (`model_performance`).
#[derive(Debug, Clone, FromRow)]
pub struct ModelPerformance {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
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
