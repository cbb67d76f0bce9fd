use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::time::Instant;
use utoipa::ToSchema;

use crate::{ApiResponse, AppState};

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_latency_ms: Option<u64>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusReport {
    pub service: String,
    pub version: String,
    pub environment: String,
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// Liveness plus a database ping; 503 when the database is unreachable.
#[utoipa::path(
    get,
    path = "/health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthReport>),
        (status = 503, description = "Database unreachable", body = ApiResponse<HealthReport>),
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthReport>>) {
    let started = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let latency = started.elapsed().as_millis() as u64;

    let (code, status, database, latency) = match db_result {
        Ok(()) => (StatusCode::OK, "healthy", "up", Some(latency)),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "down", None),
    };

    (
        code,
        Json(ApiResponse::success(HealthReport {
            status: status.to_string(),
            database: database.to_string(),
            database_latency_ms: latency,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// Build and runtime information.
#[utoipa::path(
    get,
    path = "/status",
    summary = "API status",
    responses((status = 200, description = "Status", body = ApiResponse<StatusReport>)),
    tag = "System"
)]
pub async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<StatusReport>> {
    Json(ApiResponse::success(StatusReport {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        uptime_secs: uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Public routes, mounted outside authentication.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(api_status))
}
