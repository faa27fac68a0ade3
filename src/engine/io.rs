//! Audio file I/O for Rampdeck
//!
//! Decoding is the only way a buffer enters a session. WAV is the bundled
//! format; any other decoder plugs in through [`Decoder`].

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{RampdeckError, Result};

/// Turns encoded bytes into a decoded buffer
pub trait Decoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer>;
}

/// RIFF/WAVE decoder
///
/// Integer PCM of 8/16/24/32 bits and 32-bit float are accepted and
/// normalized to `f32` in `[-1.0, 1.0)`. The file's sample rate is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| RampdeckError::DecodeFailure {
            reason: format!("Failed to parse WAV header: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(RampdeckError::UnsupportedFormat {
                format: "0-channel audio".to_string(),
            });
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        if interleaved.len() < channels {
            return Err(RampdeckError::EmptyAudio);
        }

        tracing::debug!(
            channels,
            sample_rate = spec.sample_rate,
            frames = interleaved.len() / channels,
            "decoded WAV"
        );
        AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
    }
}

/// Read a whole file into memory for decoding
pub fn read_audio_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RampdeckError::FileNotFound {
                path: path.display().to_string(),
                source: Some(e),
            }
        } else {
            RampdeckError::Io(e)
        }
    })
}

/// Read and decode a file in one step
pub fn import_audio<D: Decoder + ?Sized>(decoder: &D, path: &Path) -> Result<AudioBuffer> {
    let bytes = read_audio_file(path)?;
    decoder.decode(&bytes)
}

/// Encode a buffer as 16-bit PCM WAV bytes
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_io_error)?;
    for sample in buffer.to_interleaved() {
        let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(scaled).map_err(wav_io_error)?;
    }
    writer.finalize().map_err(wav_io_error)?;

    Ok(cursor.into_inner())
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let samples = (0..num_samples)
        .map(|i| 0.5 * (angular_freq * i as f32).sin())
        .collect();

    AudioBuffer::from_planar(vec![samples], sample_rate.max(1))
        .unwrap_or_else(|_| AudioBuffer::new(0, 1, sample_rate.max(1)))
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_io_error(e: hound::Error) -> RampdeckError {
    match e {
        hound::Error::IoError(io) => RampdeckError::Io(io),
        other => RampdeckError::Io(std::io::Error::other(other.to_string())),
    }
}

fn decode_error(bits: u16) -> impl Fn(hound::Error) -> RampdeckError {
    move |e| RampdeckError::DecodeFailure {
        reason: format!("Failed to read {}-bit samples: {}", bits, e),
        source: Some(Box::new(e)),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error(bits_per_sample)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(RampdeckError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits_per_sample),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_error(bits_per_sample))
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
