//! Audio Test Fixture Generator
//!
//! In-memory WAV recordings with a simple tone

use std::io::Cursor;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency_hz: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 2.0,
            sample_rate: 44100,
            channels: 2,
            frequency_hz: 440.0,
        }
    }
}

impl AudioConfig {
    /// Mono 16 kHz 16-bit, the pipeline's normalized shape
    pub fn canonical(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            sample_rate: 16000,
            channels: 1,
            ..Default::default()
        }
    }
}

/// Generate a 16-bit PCM WAV file in memory
pub fn generate_wav_bytes(config: &AudioConfig) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total_frames = (config.duration_seconds * config.sample_rate as f64) as usize;

        for i in 0..total_frames {
            let t = i as f64 / config.sample_rate as f64;
            let sample = (t * config.frequency_hz * 2.0 * std::f64::consts::PI).sin() * 0.5;
            let amplitude = (sample * i16::MAX as f64) as i16;
            for _ in 0..config.channels {
                writer.write_sample(amplitude).unwrap();
            }
        }

        writer.finalize().unwrap();
    }

    cursor.into_inner()
}
