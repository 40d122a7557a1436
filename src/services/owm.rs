//! OpenWeatherMap 2.5 client.
//!
//! Two endpoints are used: `/forecast` (5 days in 3-hour steps) and
//! `/weather` (current conditions). Both take `lat`, `lon`, `appid` and
//! `units=metric`.
//! See: https://openweathermap.org/forecast5 and https://openweathermap.org/current

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::AppError;

const FORECAST_FALLBACK_MESSAGE: &str = "Could not retrieve forecast data";
const CURRENT_FALLBACK_MESSAGE: &str = "Could not retrieve weather data";

/// Client for the OpenWeatherMap API.
#[derive(Debug, Clone)]
pub struct OwmClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

// --- OpenWeatherMap JSON response types ---

/// Response of `GET /forecast`.
#[derive(Debug, Clone, Deserialize)]
pub struct OwmForecastResponse {
    #[serde(default)]
    pub city: OwmCity,
    #[serde(default)]
    pub list: Vec<OwmSample>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwmCity {
    pub name: Option<String>,
    pub country: Option<String>,
    /// Sunrise, epoch seconds (UTC).
    pub sunrise: Option<i64>,
    /// Sunset, epoch seconds (UTC).
    pub sunset: Option<i64>,
    /// Shift in seconds from UTC for the forecast location.
    pub timezone: Option<i32>,
}

/// One 3-hour forecast step.
#[derive(Debug, Clone, Deserialize)]
pub struct OwmSample {
    /// Forecast time, epoch seconds (UTC).
    pub dt: i64,
    pub main: OwmMain,
    pub wind: OwmWind,
    pub clouds: OwmClouds,
    pub visibility: Option<serde_json::Number>,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
    pub rain: Option<OwmAccumulation>,
    pub snow: Option<OwmAccumulation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Kept as the provider's JSON number so it is echoed back unchanged.
    pub humidity: serde_json::Number,
    pub pressure: serde_json::Number,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmWind {
    pub speed: f64,
    pub deg: Option<serde_json::Number>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmClouds {
    pub all: serde_json::Number,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmCondition {
    pub description: String,
    pub icon: String,
}

/// Rain or snow volume. The forecast feed reports `3h`, current weather `1h`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwmAccumulation {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
    #[serde(rename = "3h")]
    pub three_hours: Option<f64>,
}

/// Response of `GET /weather`.
#[derive(Debug, Clone, Deserialize)]
pub struct OwmCurrentResponse {
    pub name: Option<String>,
    pub main: OwmMain,
    pub wind: OwmWind,
    pub clouds: Option<OwmClouds>,
    pub visibility: Option<serde_json::Number>,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
    pub rain: Option<OwmAccumulation>,
    pub snow: Option<OwmAccumulation>,
}

#[derive(Debug, Deserialize)]
struct OwmErrorBody {
    message: Option<String>,
}

impl OwmClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the 5-day / 3-hour forecast for a location.
    pub async fn fetch_forecast(&self, lat: f64, lon: f64) -> Result<OwmForecastResponse, AppError> {
        self.get("forecast", lat, lon, FORECAST_FALLBACK_MESSAGE)
            .await
    }

    /// Fetch current conditions for a location.
    pub async fn fetch_current(&self, lat: f64, lon: f64) -> Result<OwmCurrentResponse, AppError> {
        self.get("weather", lat, lon, CURRENT_FALLBACK_MESSAGE).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        lat: f64,
        lon: f64,
        fallback_message: &str,
    ) -> Result<T, AppError> {
        let api_key = self.api_key.as_deref().ok_or(AppError::UpstreamConfig)?;
        let url = format!("{}/{}", self.base_url, endpoint);

        tracing::debug!("GET {} lat={} lon={}", url, lat, lon);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamUnavailable(format!("OpenWeatherMap request failed: {}", e))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // The provider puts a human-readable reason in `message`; the body
            // may also be empty or not JSON at all.
            let message = response
                .json::<OwmErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| fallback_message.to_string());
            tracing::warn!("OpenWeatherMap returned HTTP {}: {}", status, message);
            return Err(AppError::Upstream(message));
        }

        let body = response.bytes().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("OpenWeatherMap body read failed: {}", e))
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            AppError::UpstreamPayload(format!("OpenWeatherMap response structure error: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: Option<&str>) -> OwmClient {
        OwmClient::new(
            &server.uri(),
            key.map(str::to_string),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "cod": "200",
            "city": {
                "name": "London",
                "country": "GB",
                "sunrise": 1772348400,
                "sunset": 1772388000,
                "timezone": 0
            },
            "list": [
                {
                    "dt": 1772366400,
                    "main": {
                        "temp": 9.34, "feels_like": 7.1, "temp_min": 8.9,
                        "temp_max": 9.8, "humidity": 81, "pressure": 1012
                    },
                    "wind": { "speed": 4.12, "deg": 230 },
                    "clouds": { "all": 75 },
                    "visibility": 10000,
                    "weather": [{ "description": "light rain", "icon": "10d" }],
                    "rain": { "3h": 0.42 }
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_fetch_forecast_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .and(query_param("lat", "51.5"))
            .and(query_param("lon", "-0.12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("test-key"));
        let forecast = client.fetch_forecast(51.5, -0.12).await.unwrap();

        assert_eq!(forecast.city.name.as_deref(), Some("London"));
        assert_eq!(forecast.list.len(), 1);
        let sample = &forecast.list[0];
        assert_eq!(sample.main.humidity.to_string(), "81");
        assert_eq!(sample.rain.as_ref().and_then(|r| r.three_hours), Some(0.42));
        assert!(sample.snow.is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let server = MockServer::start().await;
        let client = client_for(&server, None);

        let err = client.fetch_forecast(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamConfig));
    }

    #[tokio::test]
    async fn test_non_200_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401,
                "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("bad-key"));
        let err = client.fetch_forecast(10.0, 10.0).await.unwrap_err();

        match err {
            AppError::Upstream(msg) => assert!(msg.starts_with("Invalid API key"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_200_without_message_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        let err = client.fetch_current(10.0, 10.0).await.unwrap_err();

        match err {
            AppError::Upstream(msg) => assert_eq!(msg, CURRENT_FALLBACK_MESSAGE),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(forecast_body())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        let err = client.fetch_forecast(10.0, 10.0).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Nowhere"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        let err = client.fetch_current(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamPayload(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_current_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Zurich",
                "main": {
                    "temp": 4.2, "feels_like": 1.0, "temp_min": 3.0,
                    "temp_max": 5.1, "humidity": 70, "pressure": 1020
                },
                "wind": { "speed": 3.6, "deg": 250 },
                "clouds": { "all": 20 },
                "visibility": 10000,
                "weather": [{ "description": "few clouds", "icon": "02d" }],
                "snow": { "1h": 0.3 }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        let current = client.fetch_current(47.37, 8.54).await.unwrap();

        assert_eq!(current.name.as_deref(), Some("Zurich"));
        assert_eq!(current.main.temp, 4.2);
        assert_eq!(current.snow.and_then(|s| s.one_hour), Some(0.3));
    }
}
