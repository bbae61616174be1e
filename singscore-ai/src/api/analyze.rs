//! Analysis upload handlers
//!
//! POST /api/analyze and POST /api/upload-audio (same handler)

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bytes::BytesMut;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::models::{AudioBlob, PerformanceReport, UserLevel};
use crate::{AppState, MAX_UPLOAD_BYTES};

/// Accepted upload extensions (lowercase, no dot)
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "ogg", "mpeg"];

/// Multipart field names carrying the recording
const FILE_FIELDS: [&str; 2] = ["file", "audio_file"];

/// POST /api/analyze response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub message: String,
    pub filename: String,
    pub size: usize,
    pub analysis: PerformanceReport,
}

struct Upload {
    filename: String,
    extension: String,
    content_type: Option<String>,
    bytes: bytes::Bytes,
}

/// POST /api/analyze
///
/// Multipart fields: `file` (or `audio_file`) and optional `user_level`.
/// Always answers 200 with a report once the upload is accepted.
pub async fn analyze_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<AnalyzeResponse>> {
    let mut upload: Option<Upload> = None;
    let mut level = UserLevel::default();

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if FILE_FIELDS.contains(&name.as_str()) {
            upload = Some(read_upload(field).await?);
        } else if name == "user_level" {
            let value = field.text().await.map_err(map_multipart_error)?;
            level = UserLevel::parse(&value).ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown user_level: {}", value.trim()))
            })?;
        }
    }

    let upload = upload.ok_or_else(|| {
        ApiError::BadRequest("Missing audio file (field 'file' or 'audio_file')".to_string())
    })?;

    if upload.bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    tracing::info!(
        filename = %upload.filename,
        size_bytes = upload.bytes.len(),
        user_level = ?level,
        "Audio upload accepted"
    );

    let size = upload.bytes.len();
    let mut blob = AudioBlob::new(upload.bytes).with_extension(upload.extension);
    if let Some(content_type) = upload.content_type {
        blob = blob.with_content_type(content_type);
    }

    // Cancels the pipeline if the client goes away and this future is dropped
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let report = state.orchestrator.run(blob, level, &cancel).await;
    guard.disarm();

    Ok(Json(AnalyzeResponse {
        status: "success",
        message: format!("Analysis complete ({})", report.provenance().as_str()),
        filename: upload.filename,
        size,
        analysis: report,
    }))
}

async fn read_upload(mut field: Field<'_>) -> ApiResult<Upload> {
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Audio field has no filename".to_string()))?;

    let extension = file_extension(&filename)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Unsupported file type: {} (allowed: {})",
                filename,
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

    let content_type = field.content_type().map(str::to_string);

    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(map_multipart_error)? {
        if buffer.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(too_large());
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Upload {
        filename,
        extension,
        content_type,
        bytes: buffer.freeze(),
    })
}

/// Lowercase extension without the dot
fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn too_large() -> ApiError {
    ApiError::PayloadTooLarge(format!(
        "File exceeds the {} MB upload limit",
        MAX_UPLOAD_BYTES / (1024 * 1024)
    ))
}

fn map_multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(analyze_audio))
        .route("/api/upload-audio", post(analyze_audio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("take1.MP3").as_deref(), Some("mp3"));
        assert_eq!(file_extension("voice.memo.m4a").as_deref(), Some("m4a"));
        assert_eq!(file_extension("noext"), None);
    }

    #[test]
    fn test_allow_list() {
        for ext in ["mp3", "wav", "m4a", "ogg", "mpeg"] {
            assert!(ALLOWED_EXTENSIONS.contains(&ext));
        }
        assert!(!ALLOWED_EXTENSIONS.contains(&"flac"));
    }
}
