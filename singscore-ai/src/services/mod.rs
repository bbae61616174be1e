//! Pipeline stage services
//!
//! - Audio normalization (decode, mono, 16 kHz, truncate)
//! - Object storage gateway with presigned URLs
//! - Transcription submit-and-poll client plus its HTTP adapter
//! - Score derivation and the orchestrator that sequences all stages

pub mod analysis_orchestrator;
pub mod asr_http_backend;
pub mod audio_normalizer;
pub mod score_deriver;
pub mod storage_gateway;
pub mod transcription_client;

pub use analysis_orchestrator::AnalysisOrchestrator;
pub use asr_http_backend::AsrHttpBackend;
pub use audio_normalizer::{AudioNormalizer, NormalizationOutcome, NormalizedAudio};
pub use score_deriver::ScoreDeriver;
pub use storage_gateway::{ObjectStorageBackend, S3ObjectStorage, StorageError, StorageGateway};
pub use transcription_client::{
    PollPolicy, RemoteJobState, TranscriptionBackend, TranscriptionClient, TranscriptionError,
    TranscriptionOptions,
};
