//! Event types for the SingScore event system
//!
//! Provides the analysis stage events and the EventBus used to publish them.
//! Events are emitted at stage boundaries and consumed by observers (SSE
//! clients, log forwarders); emission never influences pipeline control flow.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline stage identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Audio normalization (decode, mono, 16 kHz, truncate)
    Normalize,
    /// Upload to object storage and URL signing
    Store,
    /// Transcription job submission and polling
    Transcribe,
    /// Score derivation
    Score,
}

impl AnalysisStage {
    /// Stable lowercase name used in logs and SSE payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Normalize => "normalize",
            AnalysisStage::Store => "store",
            AnalysisStage::Transcribe => "transcribe",
            AnalysisStage::Score => "score",
        }
    }
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SingScore event types
///
/// Broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// A pipeline run was accepted
    AnalysisStarted {
        analysis_id: Uuid,
        /// Uploaded size in bytes
        size_bytes: usize,
        /// Whether the live path will be attempted
        live_path: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage began
    StageStarted {
        analysis_id: Uuid,
        stage: AnalysisStage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage fell back to its degraded behavior
    StageDegraded {
        analysis_id: Uuid,
        stage: AnalysisStage,
        /// Human-readable cause
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage finished normally
    StageCompleted {
        analysis_id: Uuid,
        stage: AnalysisStage,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A report was produced
    AnalysisCompleted {
        analysis_id: Uuid,
        /// Report provenance tag (real_api, enhanced_simulation, simulated_fallback)
        provenance: String,
        overall_score: f64,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AnalysisEvent {
    /// Event type name for SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            AnalysisEvent::AnalysisStarted { .. } => "AnalysisStarted",
            AnalysisEvent::StageStarted { .. } => "StageStarted",
            AnalysisEvent::StageDegraded { .. } => "StageDegraded",
            AnalysisEvent::StageCompleted { .. } => "StageCompleted",
            AnalysisEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
        }
    }

    /// Analysis run this event belongs to
    pub fn analysis_id(&self) -> Uuid {
        match self {
            AnalysisEvent::AnalysisStarted { analysis_id, .. }
            | AnalysisEvent::StageStarted { analysis_id, .. }
            | AnalysisEvent::StageDegraded { analysis_id, .. }
            | AnalysisEvent::StageCompleted { analysis_id, .. }
            | AnalysisEvent::AnalysisCompleted { analysis_id, .. } => *analysis_id,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Cloning is cheap; all clones
/// share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalysisEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use singscore_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AnalysisEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_stage_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.emit_lossy(AnalysisEvent::StageStarted {
            analysis_id: id,
            stage: AnalysisStage::Transcribe,
            timestamp: chrono::Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "StageStarted");
        assert_eq!(event.analysis_id(), id);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);

        // Lossy emission never panics
        bus.emit_lossy(AnalysisEvent::StageCompleted {
            analysis_id: Uuid::new_v4(),
            stage: AnalysisStage::Normalize,
            elapsed_ms: 3,
            timestamp: chrono::Utc::now(),
        });

        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = AnalysisEvent::StageDegraded {
            analysis_id: Uuid::nil(),
            stage: AnalysisStage::Store,
            reason: "bucket unreachable".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StageDegraded");
        assert_eq!(json["stage"], "store");
    }
}
