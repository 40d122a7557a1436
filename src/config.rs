use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/weather_forecast";
const DEFAULT_OWM_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which clock decides where one forecast day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBoundary {
    /// Local time of the machine running the service.
    ServerLocal,
    /// UTC offset of the forecast location, as reported by OpenWeatherMap.
    Location,
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" | "local" => Ok(DayBoundary::ServerLocal),
            "location" => Ok(DayBoundary::Location),
            other => Err(format!("expected 'server' or 'location', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{}'", other)),
        }
    }
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// OpenWeatherMap API key. Upstream calls fail with a config error when unset.
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    pub upstream_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub day_boundary: DayBoundary,
    /// Append every successful current-weather lookup to `weather_data`.
    pub record_observations: bool,
    pub model_path: PathBuf,
    pub data_path: PathBuf,
    pub logs_path: PathBuf,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            openweather_api_key: var("OPENWEATHER_API_KEY"),
            openweather_base_url: var("OPENWEATHER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OWM_BASE_URL.to_string()),
            upstream_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                var("UPSTREAM_TIMEOUT_SECS"),
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", var("PORT"), 5000)?,
            day_boundary: parse_or(
                "FORECAST_TIMEZONE",
                var("FORECAST_TIMEZONE"),
                DayBoundary::ServerLocal,
            )?,
            record_observations: parse_or("RECORD_OBSERVATIONS", var("RECORD_OBSERVATIONS"), true)?,
            model_path: var("MODEL_PATH")
                .unwrap_or_else(|| "./models/saved_models".to_string())
                .into(),
            data_path: var("DATA_PATH").unwrap_or_else(|| "./data".to_string()).into(),
            logs_path: var("LOGS_PATH").unwrap_or_else(|| "./logs".to_string()).into(),
            log_format: parse_or("LOG_FORMAT", var("LOG_FORMAT"), LogFormat::Pretty)?,
        })
    }

    /// Directories created at start-up if missing.
    pub fn working_directories(&self) -> Vec<PathBuf> {
        vec![
            self.model_path.clone(),
            self.data_path.clone(),
            self.data_path.join("raw"),
            self.data_path.join("processed"),
            self.logs_path.clone(),
        ]
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name,
                value: value.clone(),
                reason: e.to_string(),
            }),
    }
}
