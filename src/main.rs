// Climate Forecast API v0.1
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod logging;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::owm::OwmClient;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;
/// How long a request waits for a pooled connection before failing.
const DB_POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// OpenAPI document for the Climate Forecast API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Climate Forecast API",
        version = "0.1.0",
        description = "Simplified 5-day forecasts and current conditions from OpenWeatherMap, \
            plus storage and retrieval of weather observations, event predictions and \
            model evaluation metrics.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Forecasts", description = "Daily forecast generation"),
        (name = "Weather", description = "Current conditions and stored observations"),
        (name = "Predictions", description = "Stored event predictions"),
        (name = "Models", description = "Model metrics and training requests"),
    ),
    paths(
        routes::health::health_check,
        routes::predict::predict,
        routes::weather::get_current_weather,
        routes::weather::get_historical_weather,
        routes::weather::create_observation,
        routes::predictions::get_prediction_history,
        routes::predictions::create_prediction,
        routes::models::get_model_performance,
        routes::models::create_model_performance,
        routes::models::train_model,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::predict::PredictRequest,
            routes::predict::LocationInfo,
            routes::predict::PredictResponse,
            services::forecast::DailyForecastSummary,
            services::validation::CoordinateInput,
            routes::weather::ObservationRequest,
            routes::weather::CurrentWeatherData,
            routes::weather::CurrentWeatherResponse,
            routes::weather::ObservationResponse,
            routes::weather::HistoricalWeatherResponse,
            routes::weather::ObservationCreatedResponse,
            routes::predictions::PredictionRequest,
            routes::predictions::PredictionResponse,
            routes::predictions::PredictionHistoryResponse,
            routes::predictions::PredictionCreatedResponse,
            db::models::PredictionMetadata,
            routes::models::PerformanceRequest,
            routes::models::PerformanceResponse,
            routes::models::PerformanceListResponse,
            routes::models::PerformanceCreatedResponse,
            routes::models::TrainRequest,
            routes::models::TrainResponse,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = logging::init_tracing(&config);
    tracing::info!("Application started");
    create_directories(&config);

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .acquire_timeout(DB_POOL_ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    if config.openweather_api_key.is_none() {
        tracing::warn!("OPENWEATHER_API_KEY is not set; weather endpoints will return errors");
    }
    let owm_client = OwmClient::new(
        &config.openweather_base_url,
        config.openweather_api_key.clone(),
        config.upstream_timeout,
    )
    .expect("Failed to build OpenWeatherMap client");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("HOST and PORT must form a valid socket address");
    let port = config.port;

    let app_state = AppState {
        pool,
        owm_client,
        config: Arc::new(config),
    };

    // CORS: the API is read/write JSON, GET and POST only
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let app = routes::api_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("API server listening on {}", addr);
    tracing::info!("Swagger UI available at http://localhost:{}/swagger-ui/", port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}

/// Create the model, data and log directories. Failures are logged only.
fn create_directories(config: &AppConfig) {
    for dir in config.working_directories() {
        if dir.is_dir() {
            continue;
        }
        match std::fs::create_dir_all(&dir) {
            Ok(()) => tracing::info!("Created directory {}", dir.display()),
            Err(e) => tracing::warn!("Could not create directory {}: {}", dir.display(), e),
        }
    }
}
