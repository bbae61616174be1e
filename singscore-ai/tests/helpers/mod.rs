//! Test Helper Utilities
//!
//! Shared utilities for testing singscore-ai

#![allow(dead_code)]

pub mod audio_generator;
pub mod fake_backends;

pub use audio_generator::{generate_wav_bytes, AudioConfig};
pub use fake_backends::{
    fast_policy, live_orchestrator, simulated_orchestrator, FakeStorage, ScriptedTranscription,
};
