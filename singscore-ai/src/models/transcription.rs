//! Transcription job lifecycle and transcript structure
//!
//! # State Progression
//! SUBMITTED → RUNNING → SUCCEEDED | FAILED, or poll budget exhausted → TIMED_OUT

use serde::{Deserialize, Serialize};

/// Transcription job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted by the backend, not yet observed running
    Submitted,
    /// Backend reports pending or running
    Running,
    /// Result payload available
    Succeeded,
    /// Backend reports failure
    Failed,
    /// Poll budget exhausted before a terminal status
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut)
    }
}

/// One asynchronous transcription request tracked by its backend identifier
///
/// Created on submission; mutated only by the poll loop. Once terminal, further
/// transitions are ignored.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub job_id: String,
    status: JobStatus,
    result: Option<TranscriptionResult>,
    failure: Option<String>,
    poll_attempts: u32,
}

impl TranscriptionJob {
    pub fn submitted(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Submitted,
            result: None,
            failure: None,
            poll_attempts: 0,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Count one poll attempt (successful or not)
    pub fn record_attempt(&mut self) {
        self.poll_attempts += 1;
    }

    pub fn mark_running(&mut self) {
        self.transition(JobStatus::Running);
    }

    pub fn mark_succeeded(&mut self, result: TranscriptionResult) {
        if self.transition(JobStatus::Succeeded) {
            self.result = Some(result);
        }
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        if self.transition(JobStatus::Failed) {
            self.failure = Some(reason.into());
        }
    }

    pub fn mark_timed_out(&mut self) {
        self.transition(JobStatus::TimedOut);
    }

    /// Take the result payload; present only when SUCCEEDED
    pub fn into_result(self) -> Option<TranscriptionResult> {
        match self.status {
            JobStatus::Succeeded => self.result,
            _ => None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() {
            tracing::debug!(
                job_id = %self.job_id,
                current = ?self.status,
                ignored = ?next,
                "Ignoring transition on terminal job"
            );
            return false;
        }
        self.status = next;
        true
    }
}

/// Single recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    /// Recognition confidence, 0.0-1.0
    pub confidence: f64,
}

/// Timestamped sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSentence {
    /// Start offset in seconds
    pub begin_seconds: f64,
    /// End offset in seconds
    pub end_seconds: f64,
    pub text: String,
    pub words: Vec<TranscriptWord>,
}

/// Parsed transcription payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub sentences: Vec<TranscriptSentence>,
}

impl TranscriptionResult {
    pub fn new(sentences: Vec<TranscriptSentence>) -> Self {
        Self { sentences }
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Latest sentence end time
    pub fn duration_seconds(&self) -> f64 {
        self.sentences
            .iter()
            .map(|s| s.end_seconds)
            .fold(0.0, f64::max)
    }

    pub fn word_count(&self) -> usize {
        self.sentences.iter().map(|s| s.words.len()).sum()
    }

    /// Mean per-word confidence, clamped to [0, 1]; `None` when there are no words
    pub fn mean_confidence(&self) -> Option<f64> {
        let count = self.word_count();
        if count == 0 {
            return None;
        }
        let total: f64 = self
            .sentences
            .iter()
            .flat_map(|s| s.words.iter())
            .map(|w| w.confidence.clamp(0.0, 1.0))
            .sum();
        Some(total / count as f64)
    }

    /// Sentence texts joined with single spaces
    pub fn text(&self) -> String {
        self.sentences
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(begin: f64, end: f64, confidences: &[f64]) -> TranscriptSentence {
        TranscriptSentence {
            begin_seconds: begin,
            end_seconds: end,
            text: "la la la".to_string(),
            words: confidences
                .iter()
                .map(|c| TranscriptWord {
                    text: "la".to_string(),
                    confidence: *c,
                })
                .collect(),
        }
    }

    #[test]
    fn test_result_aggregates() {
        let result = TranscriptionResult::new(vec![
            sentence(0.0, 4.5, &[0.8, 1.0]),
            sentence(4.5, 9.25, &[0.9]),
        ]);

        assert_eq!(result.word_count(), 3);
        assert!((result.duration_seconds() - 9.25).abs() < 1e-9);
        assert!((result.mean_confidence().unwrap() - 0.9).abs() < 1e-9);
        assert_eq!(result.text(), "la la la la la la");
    }

    #[test]
    fn test_mean_confidence_without_words() {
        let result = TranscriptionResult::new(vec![sentence(0.0, 1.0, &[])]);
        assert_eq!(result.mean_confidence(), None);
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = TranscriptionJob::submitted("task-1");
        assert_eq!(job.status(), JobStatus::Submitted);

        job.record_attempt();
        job.mark_running();
        assert_eq!(job.status(), JobStatus::Running);

        job.record_attempt();
        job.mark_succeeded(TranscriptionResult::default());
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert_eq!(job.poll_attempts(), 2);
        assert!(job.into_result().is_some());
    }

    #[test]
    fn test_terminal_job_ignores_transitions() {
        let mut job = TranscriptionJob::submitted("task-2");
        job.mark_failed("backend error");
        job.mark_running();
        job.mark_succeeded(TranscriptionResult::default());

        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.failure(), Some("backend error"));
        assert!(job.into_result().is_none());
    }
}
