//! Tracing setup: console output plus a plain-text `app.log` under `LOGS_PATH`.

use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, LogFormat};

const LOG_FILE_NAME: &str = "app.log";
const DEFAULT_FILTER: &str = "climate_forecast_api=debug,tower_http=debug";

/// Install the global subscriber.
///
/// The returned guard flushes the file sink on drop and must be held for the
/// lifetime of the process. When the log file cannot be opened, logging
/// continues on the console only.
pub fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (file_layer, guard, file_error) = match log_file_writer(&config.logs_path) {
        Ok((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
            None,
        ),
        Err(e) => (None, None, Some(e)),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    if let Some(e) = file_error {
        tracing::warn!(
            "Could not open {} in {}: {}",
            LOG_FILE_NAME,
            config.logs_path.display(),
            e
        );
    }
    guard
}

/// Non-blocking writer appending to `dir/app.log`, creating `dir` if needed.
pub fn log_file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_writer_appends_to_app_log() {
        let tmp = tempfile::tempdir().unwrap();
        let logs = tmp.path().join("logs");

        let (mut writer, guard) = log_file_writer(&logs).unwrap();
        writer.write_all(b"Application started\n").unwrap();
        drop(guard);

        let contents = std::fs::read_to_string(logs.join("app.log")).unwrap();
        assert!(contents.contains("Application started"));
    }

    #[test]
    fn test_log_file_writer_keeps_existing_lines() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app.log"), "earlier run\n").unwrap();

        let (mut writer, guard) = log_file_writer(tmp.path()).unwrap();
        writer.write_all(b"second run\n").unwrap();
        drop(guard);

        let contents = std::fs::read_to_string(tmp.path().join("app.log")).unwrap();
        assert!(contents.starts_with("earlier run\n"));
        assert!(contents.contains("second run"));
    }
}
