//! HTTP adapter for an asynchronous speech-recognition service
//!
//! DashScope-style task API:
//! - `POST {base}/api/v1/services/audio/asr/transcription` with
//!   `X-DashScope-Async: enable` → `output.task_id`
//! - `GET {base}/api/v1/tasks/{task_id}` → `output.task_status`
//! - On `SUCCEEDED`, `output.results[0].transcription_url` points at the
//!   transcript document, fetched with a plain GET

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::TranscriptionConfig;
use crate::models::{TranscriptSentence, TranscriptWord, TranscriptionResult};
use crate::services::transcription_client::{
    RemoteJobState, TranscriptionBackend, TranscriptionError, TranscriptionOptions,
};

const SUBMIT_PATH: &str = "/api/v1/services/audio/asr/transcription";
const TASKS_PATH: &str = "/api/v1/tasks";
const USER_AGENT: &str = concat!("singscore-ai/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    model: &'a str,
    input: SubmitInput<'a>,
    parameters: SubmitParameters,
}

#[derive(Debug, Serialize)]
struct SubmitInput<'a> {
    file_urls: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct SubmitParameters {
    punctuation_prediction_enabled: bool,
    disfluency_removal_enabled: bool,
    timestamp_alignment_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    #[serde(default)]
    output: Option<TaskOutput>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskOutput {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    results: Vec<TaskResult>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    transcription_url: Option<String>,
    #[serde(default)]
    subtask_status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Transcript document at `transcription_url`
#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    #[serde(default)]
    transcripts: Vec<ChannelTranscript>,
}

#[derive(Debug, Deserialize)]
struct ChannelTranscript {
    #[serde(default)]
    sentences: Vec<WireSentence>,
}

#[derive(Debug, Deserialize)]
struct WireSentence {
    /// Milliseconds
    begin_time: u64,
    /// Milliseconds
    end_time: u64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<WireWord>,
}

#[derive(Debug, Deserialize)]
struct WireWord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// reqwest-backed [`TranscriptionBackend`]
pub struct AsrHttpBackend {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AsrHttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let api_key = config.api_key.clone().unwrap_or_default();
        Self::new(&config.base_url, api_key, config.request_timeout())
    }

    async fn fetch_transcript(&self, url: &str) -> Result<TranscriptionResult, TranscriptionError> {
        tracing::debug!("Fetching transcript document");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Transport(format!(
                "transcript download returned HTTP {}",
                status.as_u16()
            )));
        }

        let document: TranscriptDocument = response
            .json()
            .await
            .map_err(|e| TranscriptionError::MalformedPayload(e.to_string()))?;

        parse_transcript(document)
    }
}

#[async_trait]
impl TranscriptionBackend for AsrHttpBackend {
    async fn submit(
        &self,
        audio_url: &str,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscriptionError> {
        let body = SubmitRequest {
            model: &options.model,
            input: SubmitInput {
                file_urls: [audio_url],
            },
            parameters: SubmitParameters {
                punctuation_prediction_enabled: options.punctuation,
                disfluency_removal_enabled: options.disfluency_removal,
                timestamp_alignment_enabled: options.timestamp_alignment,
            },
        };

        tracing::debug!(model = %options.model, "Submitting transcription task");

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, SUBMIT_PATH))
            .bearer_auth(&self.api_key)
            .header("X-DashScope-Async", "enable")
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscriptionError::SubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::SubmissionFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&text, 200)
            )));
        }

        let envelope: TaskEnvelope = response
            .json()
            .await
            .map_err(|e| TranscriptionError::SubmissionFailed(format!("unreadable response: {}", e)))?;

        envelope
            .output
            .and_then(|o| o.task_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                TranscriptionError::SubmissionFailed(format!(
                    "no task_id in response ({})",
                    envelope.message.as_deref().unwrap_or("no message")
                ))
            })
    }

    async fn get_status(&self, job_id: &str) -> Result<RemoteJobState, TranscriptionError> {
        let response = self
            .http_client
            .get(format!("{}{}/{}", self.base_url, TASKS_PATH, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Transport(format!(
                "task query returned HTTP {}",
                status.as_u16()
            )));
        }

        let envelope: TaskEnvelope = response
            .json()
            .await
            .map_err(|e| TranscriptionError::MalformedPayload(e.to_string()))?;

        let output = envelope.output.ok_or_else(|| {
            TranscriptionError::MalformedPayload(format!(
                "task query carried no output (code {})",
                envelope.code.as_deref().unwrap_or("none")
            ))
        })?;

        match output.task_status.as_deref().unwrap_or("UNKNOWN") {
            "PENDING" | "RUNNING" => Ok(RemoteJobState::Pending),
            "SUCCEEDED" => {
                let url = succeeded_transcription_url(&output)?;
                let result = self.fetch_transcript(&url).await?;
                Ok(RemoteJobState::Succeeded(result))
            }
            "FAILED" | "CANCELED" => Ok(RemoteJobState::Failed(failure_reason(&output))),
            other => Err(TranscriptionError::MalformedPayload(format!(
                "unknown task_status '{}'",
                other
            ))),
        }
    }
}

/// First successful subtask's transcript URL
fn succeeded_transcription_url(output: &TaskOutput) -> Result<String, TranscriptionError> {
    let first = output
        .results
        .first()
        .ok_or_else(|| TranscriptionError::MalformedPayload("no results in task output".into()))?;

    if let Some(sub) = first.subtask_status.as_deref() {
        if sub != "SUCCEEDED" {
            return Err(TranscriptionError::JobFailed {
                job_id: output.task_id.clone().unwrap_or_default(),
                reason: first
                    .message
                    .clone()
                    .or_else(|| first.code.clone())
                    .unwrap_or_else(|| format!("subtask {}", sub)),
            });
        }
    }

    first
        .transcription_url
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| TranscriptionError::MalformedPayload("missing transcription_url".into()))
}

fn failure_reason(output: &TaskOutput) -> String {
    output
        .message
        .clone()
        .or_else(|| output.code.clone())
        .or_else(|| output.results.first().and_then(|r| r.message.clone()))
        .unwrap_or_else(|| "task failed without a reason".to_string())
}

/// Convert the wire document; words without a confidence value are dropped
///
/// A non-empty transcript in which no word carries a confidence is malformed.
fn parse_transcript(document: TranscriptDocument) -> Result<TranscriptionResult, TranscriptionError> {
    let mut sentences = Vec::new();
    let mut words_seen = 0usize;

    for channel in document.transcripts {
        for s in channel.sentences {
            words_seen += s.words.len();
            let words = s
                .words
                .into_iter()
                .filter_map(|w| {
                    w.confidence.map(|confidence| TranscriptWord {
                        text: w.text,
                        confidence,
                    })
                })
                .collect();

            sentences.push(TranscriptSentence {
                begin_seconds: s.begin_time as f64 / 1000.0,
                end_seconds: s.end_time as f64 / 1000.0,
                text: s.text,
                words,
            });
        }
    }

    let result = TranscriptionResult::new(sentences);
    if words_seen > 0 && result.mean_confidence().is_none() {
        return Err(TranscriptionError::MalformedPayload(
            "transcript words carry no confidence values".into(),
        ));
    }

    Ok(result)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
