//! Scripted storage and transcription backends

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use singscore_ai::config::StorageConfig;
use singscore_ai::models::{TranscriptSentence, TranscriptWord, TranscriptionResult};
use singscore_ai::services::{
    AnalysisOrchestrator, AudioNormalizer, ObjectStorageBackend, PollPolicy, RemoteJobState,
    ScoreDeriver, StorageError, StorageGateway, TranscriptionBackend, TranscriptionClient,
    TranscriptionError, TranscriptionOptions,
};
use singscore_common::events::EventBus;

/// Object store that accepts or rejects every upload
pub struct FakeStorage {
    pub accept_uploads: bool,
    pub puts: AtomicU32,
    pub stored: Mutex<Vec<(String, Bytes)>>,
}

impl FakeStorage {
    pub fn accepting() -> Self {
        Self {
            accept_uploads: true,
            puts: AtomicU32::new(0),
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept_uploads: false,
            ..Self::accepting()
        }
    }
}

#[async_trait]
impl ObjectStorageBackend for FakeStorage {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if !self.accept_uploads {
            return Err(StorageError::Upload("HTTP 503".to_string()));
        }
        self.stored.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }

    async fn sign(&self, key: &str, _ttl: Duration) -> Result<String, StorageError> {
        Ok(format!("https://bucket.example.com/{}?signature=abc", key))
    }

    async fn probe(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// How the fake transcription service answers submissions
#[derive(Debug, Clone)]
pub enum SubmitBehavior {
    Accept,
    /// Service answered with an HTTP 500
    ServerError,
}

/// Transcription service replaying scripted poll answers, then `Pending`
pub struct ScriptedTranscription {
    pub submit: SubmitBehavior,
    pub script: Mutex<VecDeque<Result<RemoteJobState, TranscriptionError>>>,
    pub submissions: AtomicU32,
    pub polls: AtomicU32,
    pub last_url: Mutex<Option<String>>,
}

impl ScriptedTranscription {
    pub fn new(script: Vec<Result<RemoteJobState, TranscriptionError>>) -> Self {
        Self {
            submit: SubmitBehavior::Accept,
            script: Mutex::new(script.into()),
            submissions: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            last_url: Mutex::new(None),
        }
    }

    /// Succeeds on the first poll with `sentences` at confidence `c`
    pub fn succeeding(sentences: usize, confidence: f64) -> Self {
        Self::new(vec![Ok(RemoteJobState::Succeeded(transcript(
            sentences, confidence,
        )))])
    }

    pub fn failing_submission() -> Self {
        Self {
            submit: SubmitBehavior::ServerError,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl TranscriptionBackend for ScriptedTranscription {
    async fn submit(
        &self,
        audio_url: &str,
        _options: &TranscriptionOptions,
    ) -> Result<String, TranscriptionError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(audio_url.to_string());
        match self.submit {
            SubmitBehavior::Accept => Ok("task-1".to_string()),
            SubmitBehavior::ServerError => Err(TranscriptionError::SubmissionFailed(
                "HTTP 500: internal error".to_string(),
            )),
        }
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

/// `sentences` two-word sentences, every word at `confidence`
pub fn transcript(sentences: usize, confidence: f64) -> TranscriptionResult {
    TranscriptionResult::new(
        (0..sentences)
            .map(|i| TranscriptSentence {
                begin_seconds: i as f64 * 3.0,
                end_seconds: i as f64 * 3.0 + 2.5,
                text: "twinkle twinkle".to_string(),
                words: vec![
                    TranscriptWord {
                        text: "twinkle".to_string(),
                        confidence,
                    },
                    TranscriptWord {
                        text: "twinkle".to_string(),
                        confidence,
                    },
                ],
            })
            .collect(),
    )
}

/// Millisecond poll interval so real-clock tests finish quickly
pub fn fast_policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(5),
        max_attempts,
    }
}

/// Orchestrator with no live path
pub fn simulated_orchestrator() -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(
        AudioNormalizer::default(),
        StorageGateway::simulated(&StorageConfig::default()),
        None,
        ScoreDeriver::default(),
        EventBus::new(64),
    )
}

/// Orchestrator with fake live storage and transcription
pub fn live_orchestrator(
    storage: Arc<FakeStorage>,
    transcription: Arc<ScriptedTranscription>,
    policy: PollPolicy,
    event_bus: EventBus,
) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(
        AudioNormalizer::default(),
        StorageGateway::live(storage, &StorageConfig::default()),
        Some(TranscriptionClient::new(
            transcription,
            TranscriptionOptions::for_model("paraformer-v2"),
            policy,
        )),
        ScoreDeriver::default(),
        event_bus,
    )
}
