//! Daily forecast aggregation.
//!
//! Collapses the OpenWeatherMap 3-hour feed (~40 samples over 5 days) into at
//! most one representative sample per calendar day. The first sample of a day
//! is kept unless a sample at exactly 12:00 shows up later for the same day,
//! in which case the noon sample replaces it.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use utoipa::ToSchema;

use crate::helpers::round_1dp;
use crate::services::owm::OwmSample;

/// Number of days returned to clients.
pub const MAX_FORECAST_DAYS: usize = 5;

/// Hour of day preferred as the representative sample.
const PREFERRED_HOUR: u32 = 12;

/// Placeholder for values the provider did not send.
pub const NOT_AVAILABLE: &str = "N/A";

/// One representative forecast entry per calendar day.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyForecastSummary {
    /// Zero-based day index, 0 = soonest
    pub day_offset: usize,
    /// e.g. "Sunday, Mar 01"
    pub date: String,
    /// e.g. "Sunday, Mar 01 12:00"
    pub full_datetime: String,
    /// Temperature in °C, 1 decimal
    pub temperature: f64,
    /// Feels-like temperature in °C, 1 decimal
    pub feels_like: f64,
    /// Minimum temperature in °C, 1 decimal
    pub temp_min: f64,
    /// Maximum temperature in °C, 1 decimal
    pub temp_max: f64,
    /// Relative humidity in %, as reported
    #[schema(value_type = f64)]
    pub humidity: serde_json::Number,
    /// Sea-level pressure in hPa, as reported
    #[schema(value_type = f64)]
    pub pressure: serde_json::Number,
    /// Wind speed in m/s, 1 decimal
    pub wind_speed: f64,
    /// Wind direction in degrees, as reported
    #[schema(value_type = Option<f64>)]
    pub wind_deg: Option<serde_json::Number>,
    /// Cloud cover in %, as reported
    #[schema(value_type = f64)]
    pub cloudiness: serde_json::Number,
    /// Visibility in metres, or "N/A"
    #[schema(value_type = Object)]
    pub visibility: serde_json::Value,
    /// Title-cased condition text, e.g. "Light Rain"
    pub weather_description: String,
    /// OpenWeatherMap icon code, e.g. "10d"
    pub weather_icon: String,
    /// Rain + snow over the 3-hour step, in mm
    pub precipitation: f64,
}

/// Pick one sample per calendar day in `tz`, ordered by time and capped at
/// [`MAX_FORECAST_DAYS`].
pub fn select_daily_samples<'a, Tz: TimeZone>(
    samples: &'a [OwmSample],
    tz: &Tz,
) -> Vec<(DateTime<Tz>, &'a OwmSample)> {
    let mut by_date: HashMap<NaiveDate, (DateTime<Tz>, &'a OwmSample)> = HashMap::new();

    for sample in samples {
        let Some(local) = tz.timestamp_opt(sample.dt, 0).single() else {
            tracing::warn!("Skipping forecast sample with out-of-range timestamp {}", sample.dt);
            continue;
        };
        let date = local.date_naive();
        if !by_date.contains_key(&date) || local.hour() == PREFERRED_HOUR {
            by_date.insert(date, (local, sample));
        }
    }

    let mut selected: Vec<(DateTime<Tz>, &'a OwmSample)> = by_date.into_values().collect();
    selected.sort_by_key(|(_, sample)| sample.dt);
    selected.truncate(MAX_FORECAST_DAYS);
    selected
}

/// Aggregate a forecast feed into per-day summaries.
///
/// Returns an empty vector for an empty feed and never pads to
/// [`MAX_FORECAST_DAYS`].
pub fn aggregate_daily<Tz>(samples: &[OwmSample], tz: &Tz) -> Vec<DailyForecastSummary>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    select_daily_samples(samples, tz)
        .into_iter()
        .enumerate()
        .map(|(day_offset, (local, sample))| summarize(day_offset, &local, sample))
        .collect()
}

fn summarize<Tz>(day_offset: usize, local: &DateTime<Tz>, sample: &OwmSample) -> DailyForecastSummary
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let (description, icon) = sample
        .weather
        .first()
        .map(|w| (title_case(&w.description), w.icon.clone()))
        .unwrap_or_default();

    DailyForecastSummary {
        day_offset,
        date: local.format("%A, %b %d").to_string(),
        full_datetime: local.format("%A, %b %d %H:%M").to_string(),
        temperature: round_1dp(sample.main.temp),
        feels_like: round_1dp(sample.main.feels_like),
        temp_min: round_1dp(sample.main.temp_min),
        temp_max: round_1dp(sample.main.temp_max),
        humidity: sample.main.humidity.clone(),
        pressure: sample.main.pressure.clone(),
        wind_speed: round_1dp(sample.wind.speed),
        wind_deg: sample.wind.deg.clone(),
        cloudiness: sample.clouds.all.clone(),
        visibility: sample
            .visibility
            .clone()
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(NOT_AVAILABLE.to_string())),
        weather_description: description,
        weather_icon: icon,
        precipitation: precipitation_3h(sample),
    }
}

/// Rain plus snow over the 3-hour step; a missing part counts as zero.
pub fn precipitation_3h(sample: &OwmSample) -> f64 {
    let rain = sample.rain.as_ref().and_then(|r| r.three_hours).unwrap_or(0.0);
    let snow = sample.snow.as_ref().and_then(|s| s.three_hours).unwrap_or(0.0);
    rain + snow
}

/// Capitalise the first letter of every word and lowercase the rest.
///
/// A word starts after any non-alphabetic character, so "light rain" becomes
/// "Light Rain" and "thunderstorm/drizzle" becomes "Thunderstorm/Drizzle".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Format an epoch timestamp as "HH:MM:SS" in `tz`.
///
/// Returns [`NOT_AVAILABLE`] when the timestamp is missing or zero.
pub fn format_clock<Tz>(epoch_secs: Option<i64>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    epoch_secs
        .filter(|&secs| secs != 0)
        .and_then(|secs| tz.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
