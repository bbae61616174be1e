//! Audio normalization
//!
//! **Purpose:** Convert uploaded audio into the canonical transcription input:
//! mono, 16 kHz, 16-bit PCM WAV, at most `max_duration` seconds from offset 0.
//!
//! Uses symphonia for format-agnostic decoding (MP3, AAC/M4A, OGG, WAV, ...),
//! rubato for resampling, and hound for WAV encoding.
//!
//! Normalization is an optimization, not a correctness requirement: any failure
//! returns the original bytes unchanged. Canonical input is returned
//! byte-for-byte, so `normalize(normalize(x)) == normalize(x)`.

use bytes::Bytes;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Canonical output sample rate
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Default duration cap in seconds
pub const DEFAULT_MAX_DURATION_SECS: u32 = 45;

/// Normalization failure (never escapes [`AudioNormalizer::normalize`])
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("No audio samples decoded")]
    NoAudio,

    #[error("Resample failed: {0}")]
    Resample(String),

    #[error("WAV encode failed: {0}")]
    Encode(#[from] hound::Error),
}

/// What normalization did to the input
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizationOutcome {
    /// Input was already canonical; bytes untouched
    AlreadyCanonical,
    /// Input was decoded and re-encoded
    Converted {
        source_sample_rate: u32,
        source_channels: usize,
        truncated: bool,
    },
    /// Conversion failed; original bytes passed through
    PassedThrough { reason: String },
}

/// Normalizer output
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub bytes: Bytes,
    pub outcome: NormalizationOutcome,
    /// Duration of the canonical audio; `None` when passed through
    pub duration_seconds: Option<f64>,
}

/// Converts arbitrary audio into canonical transcription input
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    max_duration_secs: u32,
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DURATION_SECS)
    }
}

impl AudioNormalizer {
    pub fn new(max_duration_secs: u32) -> Self {
        Self { max_duration_secs }
    }

    /// Normalize on the blocking pool (decode and resample are CPU-bound)
    pub async fn normalize_async(
        &self,
        bytes: Bytes,
        extension_hint: Option<String>,
    ) -> NormalizedAudio {
        let normalizer = self.clone();
        let original = bytes.clone();
        match tokio::task::spawn_blocking(move || {
            normalizer.normalize(bytes, extension_hint.as_deref())
        })
        .await
        {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::warn!(error = %e, "Normalization task aborted, passing audio through");
                NormalizedAudio {
                    bytes: original,
                    outcome: NormalizationOutcome::PassedThrough {
                        reason: e.to_string(),
                    },
                    duration_seconds: None,
                }
            }
        }
    }

    /// Normalize audio bytes; never fails
    pub fn normalize(&self, bytes: Bytes, extension_hint: Option<&str>) -> NormalizedAudio {
        match self.try_normalize(&bytes, extension_hint) {
            Ok(Some((converted, outcome, duration))) => NormalizedAudio {
                bytes: converted,
                outcome,
                duration_seconds: Some(duration),
            },
            Ok(None) => {
                let duration = canonical_duration(&bytes);
                NormalizedAudio {
                    bytes,
                    outcome: NormalizationOutcome::AlreadyCanonical,
                    duration_seconds: duration,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, size = bytes.len(), "Normalization failed, passing audio through");
                NormalizedAudio {
                    bytes,
                    outcome: NormalizationOutcome::PassedThrough {
                        reason: e.to_string(),
                    },
                    duration_seconds: None,
                }
            }
        }
    }

    fn max_frames(&self, sample_rate: u32) -> usize {
        self.max_duration_secs as usize * sample_rate as usize
    }

    /// `Ok(None)` means the input is already canonical
    fn try_normalize(
        &self,
        bytes: &[u8],
        extension_hint: Option<&str>,
    ) -> Result<Option<(Bytes, NormalizationOutcome, f64)>, NormalizationError> {
        if let Some(fast) = self.canonical_fast_path(bytes)? {
            return Ok(fast);
        }

        let decoded = decode_to_mono(bytes, extension_hint, self.max_duration_secs)?;
        if decoded.samples.is_empty() {
            return Err(NormalizationError::NoAudio);
        }

        tracing::debug!(
            source_sample_rate = decoded.sample_rate,
            source_channels = decoded.channels,
            frames = decoded.samples.len(),
            truncated = decoded.truncated,
            "Decoded audio for normalization"
        );

        let mut mono = if decoded.sample_rate == TARGET_SAMPLE_RATE {
            decoded.samples
        } else {
            resample_mono(decoded.samples, decoded.sample_rate, TARGET_SAMPLE_RATE)?
        };
        // Resampler rounding can overshoot the cap by a few frames
        mono.truncate(self.max_frames(TARGET_SAMPLE_RATE));

        let pcm: Vec<i16> = mono.iter().map(|s| f32_to_i16(*s)).collect();
        let duration = pcm.len() as f64 / TARGET_SAMPLE_RATE as f64;
        let encoded = encode_canonical_wav(&pcm)?;

        Ok(Some((
            encoded,
            NormalizationOutcome::Converted {
                source_sample_rate: decoded.sample_rate,
                source_channels: decoded.channels,
                truncated: decoded.truncated,
            },
            duration,
        )))
    }

    /// Handle canonical-format WAV without resampling
    ///
    /// Returns `Ok(None)` when the input is not canonical WAV (use the full
    /// decode path), `Ok(Some(None))` when it is canonical and short enough
    /// to pass through, `Ok(Some(Some(..)))` when it was only truncated.
    #[allow(clippy::type_complexity)]
    fn canonical_fast_path(
        &self,
        bytes: &[u8],
    ) -> Result<Option<Option<(Bytes, NormalizationOutcome, f64)>>, NormalizationError> {
        let Ok(reader) = hound::WavReader::new(Cursor::new(bytes)) else {
            return Ok(None);
        };
        if !is_canonical_spec(&reader.spec()) {
            return Ok(None);
        }

        let max_frames = self.max_frames(TARGET_SAMPLE_RATE);
        if reader.duration() as usize <= max_frames {
            return Ok(Some(None));
        }

        let pcm = reader
            .into_samples::<i16>()
            .take(max_frames)
            .collect::<Result<Vec<i16>, _>>()?;
        let duration = pcm.len() as f64 / TARGET_SAMPLE_RATE as f64;
        let encoded = encode_canonical_wav(&pcm)?;

        tracing::debug!(frames = pcm.len(), "Truncated canonical WAV");

        Ok(Some(Some((
            encoded,
            NormalizationOutcome::Converted {
                source_sample_rate: TARGET_SAMPLE_RATE,
                source_channels: 1,
                truncated: true,
            },
            duration,
        ))))
    }
}

fn is_canonical_spec(spec: &hound::WavSpec) -> bool {
    spec.channels == 1
        && spec.sample_rate == TARGET_SAMPLE_RATE
        && spec.bits_per_sample == 16
        && spec.sample_format == hound::SampleFormat::Int
}

fn canonical_duration(bytes: &[u8]) -> Option<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Decoded mono PCM
struct DecodedMono {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
    truncated: bool,
}

/// Decode to mono f32, stopping after `max_duration_secs`
///
/// **Algorithm:**
/// 1. Probe format (extension hint when available)
/// 2. Find default audio track and create its decoder
/// 3. Decode packets, averaging channels to mono
/// 4. Stop once the duration cap is reached
fn decode_to_mono(
    bytes: &[u8],
    extension_hint: Option<&str>,
    max_duration_secs: u32,
) -> Result<DecodedMono, NormalizationError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_hint {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| NormalizationError::Decode(format!("probe: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| NormalizationError::Decode("no audio track".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| NormalizationError::Decode("sample rate unknown".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| NormalizationError::Decode(format!("codec: {}", e)))?;

    let max_frames = max_duration_secs as usize * sample_rate as usize;
    let mut samples: Vec<f32> = Vec::new();
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let mut truncated = false;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(NormalizationError::Decode(format!("packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame; skip it and keep going
                tracing::debug!(error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(NormalizationError::Decode(format!("decode: {}", e))),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        for frame in buffer.samples().chunks(channels) {
            if samples.len() >= max_frames {
                truncated = true;
                break;
            }
            samples.push(frame.iter().sum::<f32>() / channels as f32);
        }

        if truncated {
            break;
        }
    }

    Ok(DecodedMono {
        samples,
        sample_rate,
        channels,
        truncated,
    })
}

/// Resample mono PCM with rubato sinc interpolation
///
/// Single-pass: the chunk size equals the input length.
fn resample_mono(
    samples: Vec<f32>,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, NormalizationError> {
    let num_frames = samples.len();

    let params = SincInterpolationParameters {
        sinc_len: 64,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, num_frames, 1)
        .map_err(|e| NormalizationError::Resample(e.to_string()))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| NormalizationError::Resample(e.to_string()))?;

    Ok(output.pop().unwrap_or_default())
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn encode_canonical_wav(pcm: &[i16]) -> Result<Bytes, NormalizationError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in pcm {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(Bytes::from(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_wav(sample_rate: u32, channels: u16, seconds: f64) -> Bytes {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * sample_rate as f64) as usize;
            for i in 0..frames {
                let t = i as f32 / sample_rate as f32;
                let s = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * i16::MAX as f32) as i16;
                for _ in 0..channels {
                    writer.write_sample(s).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    fn wav_spec_and_frames(bytes: &[u8]) -> (hound::WavSpec, u32) {
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        (reader.spec(), reader.duration())
    }

    #[test]
    fn test_canonical_input_passes_through_untouched() {
        let input = tone_wav(16_000, 1, 2.0);
        let normalized = AudioNormalizer::default().normalize(input.clone(), Some("wav"));

        assert_eq!(normalized.outcome, NormalizationOutcome::AlreadyCanonical);
        assert_eq!(normalized.bytes, input);
        assert_eq!(normalized.duration_seconds, Some(2.0));
    }

    #[test]
    fn test_stereo_44k_is_converted() {
        let input = tone_wav(44_100, 2, 1.5);
        let normalized = AudioNormalizer::default().normalize(input, Some("wav"));

        match normalized.outcome {
            NormalizationOutcome::Converted {
                source_sample_rate,
                source_channels,
                truncated,
            } => {
                assert_eq!(source_sample_rate, 44_100);
                assert_eq!(source_channels, 2);
                assert!(!truncated);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let (spec, frames) = wav_spec_and_frames(&normalized.bytes);
        assert!(is_canonical_spec(&spec));
        assert!(frames <= 24_100);
        assert!(frames > 20_000, "expected ~1.5s of audio, got {} frames", frames);
    }

    #[test]
    fn test_garbage_passes_through() {
        let input = Bytes::from_static(b"definitely not audio data at all");
        let normalized = AudioNormalizer::default().normalize(input.clone(), Some("mp3"));

        assert!(matches!(
            normalized.outcome,
            NormalizationOutcome::PassedThrough { .. }
        ));
        assert_eq!(normalized.bytes, input);
        assert_eq!(normalized.duration_seconds, None);
    }

    #[test]
    fn test_long_canonical_input_is_truncated() {
        let input = tone_wav(16_000, 1, 47.0);
        let normalized = AudioNormalizer::default().normalize(input, None);

        let (spec, frames) = wav_spec_and_frames(&normalized.bytes);
        assert!(is_canonical_spec(&spec));
        assert_eq!(frames, 45 * 16_000);
        assert_eq!(normalized.duration_seconds, Some(45.0));
    }

    #[test]
    fn test_long_stereo_44k_is_resampled_and_capped() {
        let input = tone_wav(44_100, 2, 47.0);
        let normalizer = AudioNormalizer::default();
        let normalized = normalizer.normalize(input, Some("wav"));

        match normalized.outcome {
            NormalizationOutcome::Converted {
                source_sample_rate,
                source_channels,
                truncated,
            } => {
                assert_eq!(source_sample_rate, 44_100);
                assert_eq!(source_channels, 2);
                assert!(truncated);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let (spec, frames) = wav_spec_and_frames(&normalized.bytes);
        assert!(is_canonical_spec(&spec));
        assert!(frames <= 45 * 16_000, "capped output has {} frames", frames);
        assert!(frames > 44 * 16_000, "expected ~45s of audio, got {} frames", frames);

        // Converted output is already canonical on a second pass
        let again = normalizer.normalize(normalized.bytes.clone(), Some("wav"));
        assert_eq!(again.outcome, NormalizationOutcome::AlreadyCanonical);
        assert_eq!(again.bytes, normalized.bytes);
    }

    #[test]
    fn test_f32_to_i16_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[tokio::test]
    async fn test_normalize_async_matches_sync() {
        let input = tone_wav(16_000, 1, 0.5);
        let normalizer = AudioNormalizer::default();
        let normalized = normalizer.normalize_async(input.clone(), None).await;
        assert_eq!(normalized.bytes, input);
    }
}
