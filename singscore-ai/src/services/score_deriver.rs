//! Score derivation
//!
//! Turns a transcription result (or its absence) into a [`PerformanceReport`].
//!
//! # Grounded scoring
//! Requires at least one sentence with at least one scored word. With mean
//! word confidence `c`:
//! - pitch = 70 + 25c
//! - rhythm = 75 + 20c
//! - completeness = 80 + 15c
//! - fluency = 65 + 30c
//!
//! Each sub-score is clamped to [0, 100]. The overall score follows the
//! configured [`ScoringStrategy`].
//!
//! # Simulated scoring
//! Used when no usable result exists. Sub-scores are drawn uniformly from fixed
//! ranges and the overall score is always weighted.

use rand::Rng;
use uuid::Uuid;

use crate::models::{
    ImprovementPlan, PerformanceReport, Provenance, ScoringStrategy, TechnicalScores,
    TranscriptSummary, TranscriptionResult, UserLevel,
};

const WEIGHT_PITCH: f64 = 0.30;
const WEIGHT_RHYTHM: f64 = 0.25;
const WEIGHT_COMPLETENESS: f64 = 0.25;
const WEIGHT_FLUENCY: f64 = 0.20;

const SIM_PITCH: (f64, f64) = (70.0, 95.0);
const SIM_RHYTHM: (f64, f64) = (65.0, 90.0);
const SIM_COMPLETENESS: (f64, f64) = (75.0, 98.0);
const SIM_FLUENCY: (f64, f64) = (65.0, 92.0);

const ADVANCED_SONGS: [&str; 3] = ["Bubbles", "A Song Not for Anyone", "Qinghai-Tibet Plateau"];
const INTERMEDIATE_SONGS: [&str; 3] = [
    "The Moon Represents My Heart",
    "Chengdu",
    "Blue and White Porcelain",
];
const BEGINNER_SONGS: [&str; 3] = ["Twinkle Twinkle Little Star", "Ode to Joy", "Childhood"];

/// Report builder for grounded and simulated analyses
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreDeriver {
    strategy: ScoringStrategy,
}

impl ScoreDeriver {
    pub fn new(strategy: ScoringStrategy) -> Self {
        Self { strategy }
    }

    /// Build a report
    ///
    /// A usable `result` yields a grounded `real_api` report. Otherwise the
    /// report is simulated and carries `fallback` as its provenance.
    pub fn derive(
        &self,
        analysis_id: Uuid,
        result: Option<&TranscriptionResult>,
        level: UserLevel,
        fallback: Provenance,
    ) -> PerformanceReport {
        match result.and_then(|r| self.derive_grounded(analysis_id, r, level)) {
            Some(report) => report,
            None => {
                let provenance = match fallback {
                    Provenance::RealApi => Provenance::SimulatedFallback,
                    other => other,
                };
                self.derive_simulated(analysis_id, level, provenance, &mut rand::thread_rng())
            }
        }
    }

    /// Grounded report; `None` when the result has no sentence or no scored word
    pub fn derive_grounded(
        &self,
        analysis_id: Uuid,
        result: &TranscriptionResult,
        level: UserLevel,
    ) -> Option<PerformanceReport> {
        if result.is_empty() {
            return None;
        }
        let c = result.mean_confidence()?;

        let scores = TechnicalScores {
            pitch_accuracy: clamp_score(70.0 + 25.0 * c),
            rhythm_accuracy: clamp_score(75.0 + 20.0 * c),
            completeness: clamp_score(80.0 + 15.0 * c),
            fluency: clamp_score(65.0 + 30.0 * c),
        };

        let overall = match self.strategy {
            ScoringStrategy::Weighted => weighted_overall(&scores),
            ScoringStrategy::ConfidenceLinear => clamp_score(70.0 + 25.0 * c),
        };

        let summary = TranscriptSummary {
            text: result.text(),
            sentence_count: result.sentences.len(),
            word_count: result.word_count(),
            duration_seconds: result.duration_seconds(),
            mean_confidence: c,
        };

        tracing::debug!(
            analysis_id = %analysis_id,
            mean_confidence = c,
            overall = overall,
            "Derived grounded scores"
        );

        Some(PerformanceReport::assemble(
            analysis_id,
            scores,
            overall,
            grounded_feedback(&scores),
            improvement_plan(&scores, overall, level),
            Provenance::RealApi,
            self.strategy,
            level,
            Some(summary),
        ))
    }

    /// Simulated report with the given provenance
    pub fn derive_simulated<R: Rng>(
        &self,
        analysis_id: Uuid,
        level: UserLevel,
        provenance: Provenance,
        rng: &mut R,
    ) -> PerformanceReport {
        let scores = TechnicalScores {
            pitch_accuracy: sample(rng, SIM_PITCH),
            rhythm_accuracy: sample(rng, SIM_RHYTHM),
            completeness: sample(rng, SIM_COMPLETENESS),
            fluency: sample(rng, SIM_FLUENCY),
        };
        let overall = round1(weighted_overall(&scores));

        PerformanceReport::assemble(
            analysis_id,
            scores,
            overall,
            banded_feedback(&scores, overall),
            improvement_plan(&scores, overall, level),
            provenance,
            ScoringStrategy::Weighted,
            level,
            None,
        )
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn sample<R: Rng>(rng: &mut R, (low, high): (f64, f64)) -> f64 {
    round1(rng.gen_range(low..=high))
}

fn weighted_overall(scores: &TechnicalScores) -> f64 {
    clamp_score(
        WEIGHT_PITCH * scores.pitch_accuracy
            + WEIGHT_RHYTHM * scores.rhythm_accuracy
            + WEIGHT_COMPLETENESS * scores.completeness
            + WEIGHT_FLUENCY * scores.fluency,
    )
}

fn grounded_feedback(scores: &TechnicalScores) -> Vec<String> {
    let mut feedback = Vec::new();

    if scores.pitch_accuracy < 70.0 {
        feedback.push("Pitch needs work; practice scales daily".to_string());
    }
    if scores.rhythm_accuracy < 75.0 {
        feedback.push("Rhythm is unsteady; practice along with a metronome".to_string());
    }
    if feedback.is_empty() {
        feedback.push("Nice performance! Keep practicing".to_string());
    }

    feedback
}

fn banded_feedback(scores: &TechnicalScores, overall: f64) -> Vec<String> {
    let pitch = if scores.pitch_accuracy >= 85.0 {
        "Excellent pitch control, notes are steady"
    } else if scores.pitch_accuracy >= 75.0 {
        "Good pitch; a few high notes could be steadier"
    } else {
        "Pitch needs work; practice scales daily"
    };

    let rhythm = if scores.rhythm_accuracy >= 80.0 {
        "Strong sense of rhythm, beats land accurately"
    } else if scores.rhythm_accuracy >= 70.0 {
        "Rhythm is mostly steady; complex patterns need practice"
    } else {
        "Rhythm needs training; practice with a metronome"
    };

    let overall = if overall >= 85.0 {
        "Outstanding overall performance! Keep it up"
    } else if overall >= 75.0 {
        "Good performance with room to grow"
    } else {
        "Plenty of potential; steady practice will show progress"
    };

    vec![pitch.to_string(), rhythm.to_string(), overall.to_string()]
}

fn improvement_plan(scores: &TechnicalScores, overall: f64, level: UserLevel) -> ImprovementPlan {
    let minutes = level.practice_minutes();
    let mut exercises = Vec::new();

    if scores.pitch_accuracy < 80.0 {
        exercises.push(format!("Basic scale practice - {} minutes daily", minutes));
        exercises.push("Single-note echo singing with a piano app".to_string());
    }
    if scores.rhythm_accuracy < 75.0 {
        exercises.push(format!("Metronome drills in 4/4 - {} minutes daily", minutes));
        exercises.push("Imitate varied rhythm patterns".to_string());
    }
    if exercises.is_empty() {
        exercises.push(format!("Full-song run-through - {} minutes daily", minutes));
        exercises.push("Expressive phrasing practice".to_string());
    }

    let songs: &[&str] = if overall >= 85.0 {
        &ADVANCED_SONGS
    } else if overall >= 75.0 {
        &INTERMEDIATE_SONGS
    } else {
        &BEGINNER_SONGS
    };

    ImprovementPlan {
        daily_exercises: exercises,
        recommended_songs: songs.iter().map(|s| s.to_string()).collect(),
    }
}
