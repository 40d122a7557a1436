//! Request validation shared by all endpoints.
//!
//! Coordinates arrive either as JSON numbers/strings (request bodies) or as
//! strings (query parameters); both go through [`validate_coordinates`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::AppError;

pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Default number of rows returned by the prediction history endpoint.
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
/// Upper bound for any caller-supplied row limit.
pub const MAX_HISTORY_LIMIT: i64 = 1000;

/// A latitude or longitude as sent by the client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CoordinateInput {
    Number(f64),
    Text(String),
}

impl From<String> for CoordinateInput {
    fn from(s: String) -> Self {
        CoordinateInput::Text(s)
    }
}

impl CoordinateInput {
    fn to_f64(&self, field: &str) -> Result<f64, AppError> {
        match self {
            CoordinateInput::Number(v) => Ok(*v),
            CoordinateInput::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                AppError::Validation(format!("Invalid {}: '{}' is not a number", field, s))
            }),
        }
    }
}

/// A validated (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Label used when the caller does not name the location.
    pub fn default_label(&self) -> String {
        format!("Lat: {:?}, Lon: {:?}", self.latitude, self.longitude)
    }
}

/// Validated coordinates plus a display label for the location.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLocation {
    pub coordinates: Coordinates,
    pub label: String,
}

/// Check presence, numeric conversion and range of a coordinate pair.
pub fn validate_coordinates(
    latitude: Option<&CoordinateInput>,
    longitude: Option<&CoordinateInput>,
) -> Result<Coordinates, AppError> {
    let (latitude, longitude) = match (latitude, longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        (None, Some(_)) => return Err(AppError::MissingField(vec!["latitude"])),
        (Some(_), None) => return Err(AppError::MissingField(vec!["longitude"])),
        (None, None) => return Err(AppError::MissingField(vec!["latitude", "longitude"])),
    };

    let latitude = latitude.to_f64("latitude")?;
    let longitude = longitude.to_f64("longitude")?;
    check_range(latitude, longitude)?;

    Ok(Coordinates {
        latitude,
        longitude,
    })
}

/// Range check for already-numeric coordinates.
pub fn check_range(latitude: f64, longitude: f64) -> Result<(), AppError> {
    // NaN fails `contains`, so it is rejected here too.
    if !LATITUDE_RANGE.contains(&latitude) {
        return Err(AppError::Validation(
            "Invalid latitude. Must be between -90 and 90".to_string(),
        ));
    }
    if !LONGITUDE_RANGE.contains(&longitude) {
        return Err(AppError::Validation(
            "Invalid longitude. Must be between -180 and 180".to_string(),
        ));
    }
    Ok(())
}

/// Validate coordinates and attach the caller's label, or a generated one.
pub fn validate_location(
    latitude: Option<&CoordinateInput>,
    longitude: Option<&CoordinateInput>,
    location_name: Option<&str>,
) -> Result<ValidatedLocation, AppError> {
    let coordinates = validate_coordinates(latitude, longitude)?;
    let label = location_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| coordinates.default_label());
    Ok(ValidatedLocation { coordinates, label })
}

/// Require a value in [0, 1] when present.
pub fn check_unit_interval(field: &str, value: Option<f64>) -> Result<(), AppError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(AppError::Validation(format!(
            "Invalid {}. Must be between 0 and 1",
            field
        ))),
        _ => Ok(()),
    }
}

/// Require a non-blank tag of at most `max_len` characters.
pub fn check_tag(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

/// Parse a date or datetime query parameter.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (read as UTC) or a
/// bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_datetime_param(field: &str, raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(AppError::Validation(format!(
        "Invalid {}: '{}' is not an ISO 8601 date or datetime",
        field, raw
    )))
}

/// Parse an optional `[start, end]` window, rejecting inverted ranges.
pub fn parse_time_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    let start = start
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_datetime_param("start_date", s))
        .transpose()?;
    let end = end
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_datetime_param("end_date", s))
        .transpose()?;

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(AppError::Validation(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }
    Ok((start, end))
}

/// Resolve the row limit for history queries.
pub fn resolve_limit(limit: Option<i64>) -> Result<i64, AppError> {
    match limit {
        None => Ok(DEFAULT_HISTORY_LIMIT),
        Some(n) if n < 1 => Err(AppError::Validation(
            "limit must be a positive integer".to_string(),
        )),
        Some(n) => Ok(n.min(MAX_HISTORY_LIMIT)),
    }
}
