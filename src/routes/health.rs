use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("healthy", or "degraded" when the DB is unreachable)
    pub status: String,
    /// Server time in RFC 3339 format
    pub timestamp: String,
    /// API version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
}

/// Health check endpoint.
///
/// Verifies database connectivity with a simple query. Returns status
/// "degraded" (still 200) if the DB is unreachable, so load balancers can
/// distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub(crate) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    if !db_ok {
        tracing::warn!("Health check: database unreachable");
    }

    Json(HealthResponse {
        status: if db_ok {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, send, test_config, test_router};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_degraded_without_database() {
        let router = test_router(test_config("http://127.0.0.1:1", None));
        let (status, body) = send(router, get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], false);
        assert!(body["timestamp"].as_str().is_some());
    }
}
