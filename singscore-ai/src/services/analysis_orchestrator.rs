//! Analysis pipeline orchestrator
//!
//! # Stage Progression
//! NORMALIZE → STORE → TRANSCRIBE → SCORE
//!
//! Stages run strictly in sequence. Each stage boundary is logged and emitted
//! on the [`EventBus`]. A run always ends in a [`PerformanceReport`]:
//!
//! - Live path unavailable at startup → simulated report, `enhanced_simulation`
//! - Live stage abandoned mid-run (placeholder URL, transcription error, empty
//!   or unscored transcript, cancellation) → simulated report, `simulated_fallback`
//! - Grounded transcript → `real_api`

use chrono::Utc;
use singscore_common::events::{AnalysisEvent, AnalysisStage, EventBus};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{Capabilities, ServiceConfig};
use crate::models::{AudioBlob, PerformanceReport, Provenance, TranscriptionResult, UserLevel};
use crate::services::asr_http_backend::AsrHttpBackend;
use crate::services::audio_normalizer::{AudioNormalizer, NormalizationOutcome};
use crate::services::score_deriver::ScoreDeriver;
use crate::services::storage_gateway::StorageGateway;
use crate::services::transcription_client::{
    PollPolicy, TranscriptionClient, TranscriptionOptions,
};

/// Sequential pipeline over injected stage services
pub struct AnalysisOrchestrator {
    normalizer: AudioNormalizer,
    storage: StorageGateway,
    transcription: Option<TranscriptionClient>,
    deriver: ScoreDeriver,
    capabilities: Capabilities,
    event_bus: EventBus,
}

impl AnalysisOrchestrator {
    pub fn new(
        normalizer: AudioNormalizer,
        storage: StorageGateway,
        transcription: Option<TranscriptionClient>,
        deriver: ScoreDeriver,
        event_bus: EventBus,
    ) -> Self {
        let capabilities = Capabilities {
            storage_live: storage.is_live(),
            transcription_live: transcription.is_some(),
        };

        Self {
            normalizer,
            storage,
            transcription,
            deriver,
            capabilities,
            event_bus,
        }
    }

    /// Build every stage from configuration, resolving capabilities once
    pub async fn connect(config: &ServiceConfig, event_bus: EventBus) -> Self {
        let storage = StorageGateway::connect(&config.storage).await;

        let transcription = if config.transcription.has_credentials() {
            match AsrHttpBackend::from_config(&config.transcription) {
                Ok(backend) => Some(TranscriptionClient::new(
                    Arc::new(backend),
                    TranscriptionOptions::for_model(&config.transcription.model),
                    PollPolicy::from_config(&config.transcription),
                )),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build transcription client, scoring runs simulated");
                    None
                }
            }
        } else {
            None
        };

        let orchestrator = Self::new(
            AudioNormalizer::new(config.analysis.max_duration_secs),
            storage,
            transcription,
            ScoreDeriver::new(config.analysis.scoring_strategy),
            event_bus,
        );

        tracing::info!(
            storage_live = orchestrator.capabilities.storage_live,
            transcription_live = orchestrator.capabilities.transcription_live,
            strategy = ?config.analysis.scoring_strategy,
            "Analysis pipeline ready"
        );

        orchestrator
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run one analysis; never fails
    pub async fn run(
        &self,
        audio: AudioBlob,
        level: UserLevel,
        cancel: &CancellationToken,
    ) -> PerformanceReport {
        let analysis_id = Uuid::new_v4();
        let started = Instant::now();
        let live_path = self.capabilities.live_path();

        tracing::info!(
            analysis_id = %analysis_id,
            size_bytes = audio.size(),
            live_path = live_path,
            user_level = ?level,
            "Analysis started"
        );
        self.event_bus.emit_lossy(AnalysisEvent::AnalysisStarted {
            analysis_id,
            size_bytes: audio.size(),
            live_path,
            timestamp: Utc::now(),
        });

        let transcript = match (&self.transcription, live_path) {
            (Some(client), true) => match self.run_live(analysis_id, audio, client, cancel).await {
                Ok(result) => Some(result),
                Err(reason) => {
                    tracing::warn!(analysis_id = %analysis_id, reason = %reason, "Live path abandoned");
                    None
                }
            },
            _ => None,
        };

        let fallback = if live_path {
            Provenance::SimulatedFallback
        } else {
            Provenance::EnhancedSimulation
        };

        let stage_start = self.stage_started(analysis_id, AnalysisStage::Score);
        let report = self
            .deriver
            .derive(analysis_id, transcript.as_ref(), level, fallback);
        self.stage_completed(analysis_id, AnalysisStage::Score, stage_start);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            analysis_id = %analysis_id,
            provenance = report.provenance().as_str(),
            overall_score = report.overall_score(),
            elapsed_ms = elapsed_ms,
            "Analysis completed"
        );
        self.event_bus.emit_lossy(AnalysisEvent::AnalysisCompleted {
            analysis_id,
            provenance: report.provenance().as_str().to_string(),
            overall_score: report.overall_score(),
            elapsed_ms,
            timestamp: Utc::now(),
        });

        report
    }

    /// Normalize, store and transcribe; `Err` carries the degradation reason
    async fn run_live(
        &self,
        analysis_id: Uuid,
        audio: AudioBlob,
        client: &TranscriptionClient,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, String> {
        // NORMALIZE
        let stage_start = self.stage_started(analysis_id, AnalysisStage::Normalize);
        let normalized = self
            .normalizer
            .normalize_async(audio.bytes, audio.extension)
            .await;
        match &normalized.outcome {
            NormalizationOutcome::PassedThrough { reason } => {
                // Original bytes still go to storage
                self.stage_degraded(analysis_id, AnalysisStage::Normalize, reason.clone());
            }
            _ => self.stage_completed(analysis_id, AnalysisStage::Normalize, stage_start),
        }

        self.check_cancelled(analysis_id, AnalysisStage::Store, cancel)?;

        // STORE
        let stage_start = self.stage_started(analysis_id, AnalysisStage::Store);
        let stored = self.storage.store(normalized.bytes).await;
        if stored.is_placeholder() {
            return Err(self.stage_degraded(
                analysis_id,
                AnalysisStage::Store,
                "storage returned a placeholder reference".to_string(),
            ));
        }
        self.stage_completed(analysis_id, AnalysisStage::Store, stage_start);

        self.check_cancelled(analysis_id, AnalysisStage::Transcribe, cancel)?;

        // TRANSCRIBE
        let stage_start = self.stage_started(analysis_id, AnalysisStage::Transcribe);
        let result = client
            .transcribe(&stored, cancel)
            .await
            .map_err(|e| self.stage_degraded(analysis_id, AnalysisStage::Transcribe, e.to_string()))?;

        if result.is_empty() {
            return Err(self.stage_degraded(
                analysis_id,
                AnalysisStage::Transcribe,
                "transcript contains no sentences".to_string(),
            ));
        }
        if result.mean_confidence().is_none() {
            return Err(self.stage_degraded(
                analysis_id,
                AnalysisStage::Transcribe,
                "transcript contains no scored words".to_string(),
            ));
        }
        self.stage_completed(analysis_id, AnalysisStage::Transcribe, stage_start);

        Ok(result)
    }

    fn check_cancelled(
        &self,
        analysis_id: Uuid,
        next: AnalysisStage,
        cancel: &CancellationToken,
    ) -> Result<(), String> {
        if cancel.is_cancelled() {
            Err(self.stage_degraded(analysis_id, next, "request cancelled".to_string()))
        } else {
            Ok(())
        }
    }

    fn stage_started(&self, analysis_id: Uuid, stage: AnalysisStage) -> Instant {
        tracing::debug!(analysis_id = %analysis_id, stage = %stage, "Stage started");
        self.event_bus.emit_lossy(AnalysisEvent::StageStarted {
            analysis_id,
            stage,
            timestamp: Utc::now(),
        });
        Instant::now()
    }

    fn stage_completed(&self, analysis_id: Uuid, stage: AnalysisStage, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            analysis_id = %analysis_id,
            stage = %stage,
            elapsed_ms = elapsed_ms,
            "Stage completed"
        );
        self.event_bus.emit_lossy(AnalysisEvent::StageCompleted {
            analysis_id,
            stage,
            elapsed_ms,
            timestamp: Utc::now(),
        });
    }

    /// Log and emit a degradation; returns the reason for propagation
    fn stage_degraded(&self, analysis_id: Uuid, stage: AnalysisStage, reason: String) -> String {
        tracing::warn!(
            analysis_id = %analysis_id,
            stage = %stage,
            reason = %reason,
            "Stage degraded"
        );
        self.event_bus.emit_lossy(AnalysisEvent::StageDegraded {
            analysis_id,
            stage,
            reason: reason.clone(),
            timestamp: Utc::now(),
        });
        reason
    }
}
