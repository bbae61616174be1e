//! HTTP API handlers for singscore-ai
//!
//! - `POST /api/analyze`, `POST /api/upload-audio`: multipart upload → report
//! - `GET /health`, `GET /`: liveness and service banner
//! - `GET /analysis/events`: SSE stream of pipeline stage events

pub mod analyze;
pub mod health;
pub mod sse;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use sse::event_routes;
