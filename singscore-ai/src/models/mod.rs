//! Data models for singscore-ai
//!
//! - Audio inputs and storage references
//! - Transcription job lifecycle and transcript structure
//! - Performance report returned to callers

pub mod audio;
pub mod report;
pub mod transcription;

pub use audio::{AudioBlob, StorageOrigin, StoredAudioRef};
pub use report::{
    ImprovementPlan, PerformanceReport, Provenance, ScoringStrategy, TechnicalScores,
    TranscriptSummary, UserLevel,
};
pub use transcription::{
    JobStatus, TranscriptSentence, TranscriptWord, TranscriptionJob, TranscriptionResult,
};
