//! Transcription job client
//!
//! Submits a transcription job for a stored audio URL and polls the backend
//! until the job reaches a terminal state or the poll budget runs out.
//!
//! # State Progression
//! SUBMITTED → RUNNING → SUCCEEDED | FAILED, or budget exhausted → TIMED_OUT
//!
//! # Polling
//! - Fixed interval before each attempt (default 3 s), bounded attempt count
//!   (default 30, ~90 s ceiling)
//! - Transport errors on a non-final attempt are logged and retried
//! - Cancellation is observed at every wait, so an abandoned request stops
//!   polling at the next iteration boundary

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::TranscriptionConfig;
use crate::models::{JobStatus, StoredAudioRef, TranscriptionJob, TranscriptionResult};

/// Transcription errors
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Submission rejected, unreachable, or returned no job id
    #[error("Transcription submission failed: {0}")]
    SubmissionFailed(String),

    /// Backend reported the job as failed
    #[error("Transcription job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    /// Poll budget exhausted without a terminal status
    #[error("Transcription job {job_id} timed out after {attempts} poll attempts")]
    Timeout { job_id: String, attempts: u32 },

    /// Result payload present but unusable
    #[error("Malformed transcription payload: {0}")]
    MalformedPayload(String),

    /// Network or HTTP-level failure on a single request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Caller abandoned the request
    #[error("Transcription cancelled")]
    Cancelled,
}

/// Options sent with every submission
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOptions {
    pub model: String,
    pub punctuation: bool,
    pub disfluency_removal: bool,
    pub timestamp_alignment: bool,
}

impl TranscriptionOptions {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            punctuation: true,
            disfluency_removal: true,
            timestamp_alignment: true,
        }
    }
}

/// Backend view of a job's state
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteJobState {
    /// Queued or running
    Pending,
    Succeeded(TranscriptionResult),
    Failed(String),
}

/// Asynchronous transcription service contract
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Start a job; returns the backend job id
    async fn submit(
        &self,
        audio_url: &str,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscriptionError>;

    /// Fetch the current job state
    async fn get_status(&self, job_id: &str) -> Result<RemoteJobState, TranscriptionError>;
}

/// Poll loop bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 30,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts.max(1),
        }
    }
}

/// Submit-and-poll client over a [`TranscriptionBackend`]
#[derive(Clone)]
pub struct TranscriptionClient {
    backend: Arc<dyn TranscriptionBackend>,
    options: TranscriptionOptions,
    policy: PollPolicy,
}

impl TranscriptionClient {
    pub fn new(
        backend: Arc<dyn TranscriptionBackend>,
        options: TranscriptionOptions,
        policy: PollPolicy,
    ) -> Self {
        Self {
            backend,
            options,
            policy,
        }
    }

    /// Transcribe the stored audio
    ///
    /// **Returns:** the result payload once the job SUCCEEDS; every other
    /// outcome is a distinct [`TranscriptionError`].
    pub async fn transcribe(
        &self,
        audio: &StoredAudioRef,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if cancel.is_cancelled() {
            return Err(TranscriptionError::Cancelled);
        }

        let job_id = self
            .backend
            .submit(&audio.url, &self.options)
            .await
            .map_err(|e| match e {
                TranscriptionError::SubmissionFailed(_) => e,
                other => TranscriptionError::SubmissionFailed(other.to_string()),
            })?;

        if job_id.trim().is_empty() {
            return Err(TranscriptionError::SubmissionFailed(
                "response carried no job id".to_string(),
            ));
        }

        tracing::info!(job_id = %job_id, "Transcription job submitted");

        let job = self
            .poll_until_terminal(TranscriptionJob::submitted(job_id), cancel)
            .await?;

        let job_id = job.job_id.clone();
        let attempts = job.poll_attempts();
        job.into_result().ok_or_else(|| {
            TranscriptionError::MalformedPayload(format!(
                "job {} succeeded after {} attempts without a result",
                job_id, attempts
            ))
        })
    }

    async fn poll_until_terminal(
        &self,
        mut job: TranscriptionJob,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionJob, TranscriptionError> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(job_id = %job.job_id, attempt = attempt, "Transcription polling cancelled");
                    return Err(TranscriptionError::Cancelled);
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            job.record_attempt();

            match self.backend.get_status(&job.job_id).await {
                Ok(RemoteJobState::Pending) => {
                    job.mark_running();
                    tracing::debug!(
                        job_id = %job.job_id,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "Transcription job still running"
                    );
                }
                Ok(RemoteJobState::Succeeded(result)) => {
                    tracing::info!(
                        job_id = %job.job_id,
                        attempt = attempt,
                        sentences = result.sentences.len(),
                        "Transcription job succeeded"
                    );
                    job.mark_succeeded(result);
                    return Ok(job);
                }
                Ok(RemoteJobState::Failed(reason)) => {
                    tracing::warn!(job_id = %job.job_id, reason = %reason, "Transcription job failed");
                    job.mark_failed(reason.clone());
                    return Err(TranscriptionError::JobFailed {
                        job_id: job.job_id,
                        reason,
                    });
                }
                Err(TranscriptionError::Transport(e)) => {
                    tracing::warn!(
                        job_id = %job.job_id,
                        attempt = attempt,
                        error = %e,
                        "Transcription poll failed, will retry"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        job.mark_timed_out();
        debug_assert_eq!(job.status(), JobStatus::TimedOut);
        tracing::warn!(
            job_id = %job.job_id,
            attempts = job.poll_attempts(),
            "Transcription job did not finish within poll budget"
        );

        Err(TranscriptionError::Timeout {
            job_id: job.job_id,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StorageOrigin, TranscriptSentence, TranscriptWord};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Backend replaying scripted poll responses, then `Pending` forever
    struct ScriptedBackend {
        job_id: Option<String>,
        script: Mutex<VecDeque<Result<RemoteJobState, TranscriptionError>>>,
        polls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<RemoteJobState, TranscriptionError>>) -> Self {
            Self {
                job_id: Some("task-42".to_string()),
                script: Mutex::new(script.into()),
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscriptionBackend for ScriptedBackend {
        async fn submit(
            &self,
            _audio_url: &str,
            _options: &TranscriptionOptions,
        ) -> Result<String, TranscriptionError> {
            self.job_id
                .clone()
                .ok_or_else(|| TranscriptionError::SubmissionFailed("HTTP 500".into()))
        }

        async fn get_status(&self, _job_id: &str) -> Result<RemoteJobState, TranscriptionError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(RemoteJobState::Pending))
        }
    }

    fn stored() -> StoredAudioRef {
        StoredAudioRef {
            url: "https://bucket.example.com/audios/a.wav".to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            origin: StorageOrigin::Stored,
        }
    }

    fn one_sentence() -> TranscriptionResult {
        TranscriptionResult::new(vec![TranscriptSentence {
            begin_seconds: 0.0,
            end_seconds: 2.0,
            text: "hello".to_string(),
            words: vec![TranscriptWord {
                text: "hello".to_string(),
                confidence: 0.9,
            }],
        }])
    }

    fn client(backend: Arc<ScriptedBackend>) -> TranscriptionClient {
        TranscriptionClient::new(
            backend,
            TranscriptionOptions::for_model("paraformer-v2"),
            PollPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_running() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(RemoteJobState::Pending),
            Ok(RemoteJobState::Pending),
            Ok(RemoteJobState::Succeeded(one_sentence())),
        ]));

        let result = client(backend.clone())
            .transcribe(&stored(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, one_sentence());
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(TranscriptionError::Transport("connection reset".into())),
            Err(TranscriptionError::Transport("timed out".into())),
            Ok(RemoteJobState::Succeeded(one_sentence())),
        ]));

        let result = client(backend.clone())
            .transcribe(&stored(), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_failure_is_distinct() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(RemoteJobState::Failed(
            "FILE_DOWNLOAD_FAILED".into(),
        ))]));

        let err = client(backend)
            .transcribe(&stored(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::JobFailed { ref reason, .. } if reason == "FILE_DOWNLOAD_FAILED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_job_id_fails_submission() {
        let backend = Arc::new(ScriptedBackend {
            job_id: None,
            ..ScriptedBackend::new(vec![])
        });

        let err = client(backend.clone())
            .transcribe(&stored(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::SubmissionFailed(_)));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_exact_budget() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let start = tokio::time::Instant::now();

        let err = client(backend.clone())
            .transcribe(&stored(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::Timeout { attempts: 30, .. }));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 30);
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let cancel = CancellationToken::new();
        let client = client(backend.clone());

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { client.transcribe(&stored(), &cancel).await })
        };

        // Let a few polls happen, then cancel mid-wait
        tokio::time::sleep(Duration::from_millis(7_500)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, TranscriptionError::Cancelled));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 2);
    }
}
