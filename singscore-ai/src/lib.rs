//! singscore-ai library interface
//!
//! Exposes the analysis pipeline and HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use singscore_common::events::EventBus;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Capabilities;
use crate::services::AnalysisOrchestrator;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Transport-level body limit; leaves room for multipart framing so that
/// oversize files reach the handler and get a JSON 413
const BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Resolved once at startup
    pub capabilities: Capabilities,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        let event_bus = orchestrator.event_bus().clone();
        let capabilities = orchestrator.capabilities();
        Self {
            orchestrator: Arc::new(orchestrator),
            event_bus,
            capabilities,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .merge(api::event_routes())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
