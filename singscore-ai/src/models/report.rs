//! Performance report returned to callers
//!
//! A report is assembled once by the score deriver and never mutated afterwards;
//! fields are read through accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Singer self-reported skill level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl UserLevel {
    /// Parse a form value; `None` for unknown levels
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(UserLevel::Beginner),
            "intermediate" => Some(UserLevel::Intermediate),
            "advanced" => Some(UserLevel::Advanced),
            _ => None,
        }
    }

    /// Daily practice minutes per exercise
    pub fn practice_minutes(&self) -> u32 {
        match self {
            UserLevel::Beginner => 10,
            UserLevel::Intermediate => 15,
            UserLevel::Advanced => 20,
        }
    }
}

/// Whether a report's scores are grounded in transcription data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Derived from a successful live transcription
    RealApi,
    /// Live path not configured at startup; scores simulated
    EnhancedSimulation,
    /// Live path attempted and abandoned mid-request; scores simulated
    SimulatedFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::RealApi => "real_api",
            Provenance::EnhancedSimulation => "enhanced_simulation",
            Provenance::SimulatedFallback => "simulated_fallback",
        }
    }
}

/// How `overall_score` is derived from a grounded transcription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// 0.30 pitch + 0.25 rhythm + 0.25 completeness + 0.20 fluency
    #[default]
    Weighted,
    /// Linear in mean word confidence, independent of the sub-scores
    ConfidenceLinear,
}

/// Sub-scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalScores {
    pub pitch_accuracy: f64,
    pub rhythm_accuracy: f64,
    pub completeness: f64,
    pub fluency: f64,
}

impl TechnicalScores {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.pitch_accuracy,
            self.rhythm_accuracy,
            self.completeness,
            self.fluency,
        ]
    }
}

/// Practice recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementPlan {
    pub daily_exercises: Vec<String>,
    pub recommended_songs: Vec<String>,
}

/// Transcript statistics behind a grounded report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub text: String,
    pub sentence_count: usize,
    pub word_count: usize,
    pub duration_seconds: f64,
    pub mean_confidence: f64,
}

/// Terminal artifact of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    analysis_id: Uuid,
    technical_scores: TechnicalScores,
    overall_score: f64,
    personalized_feedback: Vec<String>,
    improvement_plan: ImprovementPlan,
    provenance: Provenance,
    scoring_strategy: ScoringStrategy,
    user_level: UserLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<TranscriptSummary>,
    generated_at: DateTime<Utc>,
}

impl PerformanceReport {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        analysis_id: Uuid,
        technical_scores: TechnicalScores,
        overall_score: f64,
        personalized_feedback: Vec<String>,
        improvement_plan: ImprovementPlan,
        provenance: Provenance,
        scoring_strategy: ScoringStrategy,
        user_level: UserLevel,
        transcript: Option<TranscriptSummary>,
    ) -> Self {
        Self {
            analysis_id,
            technical_scores,
            overall_score,
            personalized_feedback,
            improvement_plan,
            provenance,
            scoring_strategy,
            user_level,
            transcript,
            generated_at: Utc::now(),
        }
    }

    pub fn analysis_id(&self) -> Uuid {
        self.analysis_id
    }

    pub fn technical_scores(&self) -> &TechnicalScores {
        &self.technical_scores
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn personalized_feedback(&self) -> &[String] {
        &self.personalized_feedback
    }

    pub fn improvement_plan(&self) -> &ImprovementPlan {
        &self.improvement_plan
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn scoring_strategy(&self) -> ScoringStrategy {
        self.scoring_strategy
    }

    pub fn user_level(&self) -> UserLevel {
        self.user_level
    }

    pub fn transcript(&self) -> Option<&TranscriptSummary> {
        self.transcript.as_ref()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_level_parse() {
        assert_eq!(UserLevel::parse("Advanced"), Some(UserLevel::Advanced));
        assert_eq!(UserLevel::parse(" intermediate "), Some(UserLevel::Intermediate));
        assert_eq!(UserLevel::parse("expert"), None);
        assert_eq!(UserLevel::default(), UserLevel::Beginner);
    }

    #[test]
    fn test_provenance_serializes_snake_case() {
        let json = serde_json::to_string(&Provenance::SimulatedFallback).unwrap();
        assert_eq!(json, "\"simulated_fallback\"");
        assert_eq!(Provenance::RealApi.as_str(), "real_api");
    }
}
