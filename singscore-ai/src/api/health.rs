//! Health check and service banner

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::config::MODULE_NAME;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the live path is available, "degraded" when reports are simulated
    pub status: String,
    /// Module name ("singscore-ai")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub storage_live: bool,
    pub transcription_live: bool,
    /// Git commit the binary was built from
    pub git_hash: String,
    pub build_timestamp: String,
}

/// Service banner response
#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub service: String,
    pub version: String,
    pub mode: String,
    pub endpoints: Vec<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let status = if state.capabilities.live_path() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: MODULE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        storage_live: state.capabilities.storage_live,
        transcription_live: state.capabilities.transcription_live,
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
    })
}

/// GET /
pub async fn banner(State(state): State<AppState>) -> Json<BannerResponse> {
    let mode = if state.capabilities.live_path() {
        "live"
    } else {
        "simulated"
    };

    Json(BannerResponse {
        service: "SingScore singing analysis".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: mode.to_string(),
        endpoints: vec![
            "POST /api/analyze".to_string(),
            "POST /api/upload-audio".to_string(),
            "GET /analysis/events".to_string(),
            "GET /health".to_string(),
        ],
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
}
