use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{}", missing_fields_message(.0))]
    MissingField(Vec<&'static str>),

    #[error("{0}")]
    Validation(String),

    #[error("OpenWeatherMap API key not configured")]
    UpstreamConfig,

    #[error("Weather API error: {0}")]
    Upstream(String),

    #[error("Weather API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unexpected weather API response: {0}")]
    UpstreamPayload(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn missing_fields_message(fields: &[&'static str]) -> String {
    let noun = if fields.len() == 1 { "field" } else { "fields" };
    format!("Missing required {}: {}", noun, fields.join(", "))
}

impl AppError {
    /// Replace server-side failure detail with a fixed user-facing message.
    ///
    /// Client errors, configuration errors and upstream errors that carry the
    /// provider's own message pass through unchanged; everything else is
    /// logged and collapsed into `Internal(message)`.
    pub fn or_generic(self, message: &str) -> Self {
        match self {
            AppError::MissingField(_)
            | AppError::Validation(_)
            | AppError::UpstreamConfig
            | AppError::Upstream(_)
            | AppError::Internal(_) => self,
            other => {
                tracing::error!("{}: {}", message, other);
                AppError::Internal(message.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::MissingField(_) | AppError::Validation(_) => {
                tracing::warn!("Rejected request: {}", self);
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::UpstreamConfig | AppError::Upstream(_) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::UpstreamUnavailable(_) | AppError::UpstreamPayload(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Weather service unavailable".to_string(),
                )
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}
