//! Audio Buffer Management
//!
//! Decoded audio is stored planar (one `Vec<f32>` per channel) at the
//! sample rate it was decoded with. Once handed to a session the buffer is
//! shared read-only.

use crate::error::{RampdeckError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns `-f32::INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the RMS level of samples in dB
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt() as f32;
    linear_to_db(rms)
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio samples plus sample rate and channel count
///
/// # Example
/// ```
/// use rampdeck::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(44100, 2, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_samples: usize, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; channels],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// All channels must have the same length.
    pub fn from_planar(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(RampdeckError::UnsupportedFormat {
                format: "0-channel audio".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(RampdeckError::UnsupportedFormat {
                format: "0 Hz sample rate".to_string(),
            });
        }

        let expected = samples[0].len();
        if let Some(bad) = samples.iter().position(|ch| ch.len() != expected) {
            return Err(RampdeckError::DecodeFailure {
                reason: format!(
                    "channel {} has {} samples, expected {}",
                    bad,
                    samples[bad].len(),
                    expected
                ),
                source: None,
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(RampdeckError::UnsupportedFormat {
                format: "0-channel audio".to_string(),
            });
        }

        if interleaved.len() % channels != 0 {
            return Err(RampdeckError::DecodeFailure {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_planar(samples, sample_rate)
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for frame in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Read a channel at a fractional frame position with linear interpolation
    ///
    /// Positions past the last frame read as silence.
    pub fn sample_at(&self, channel: usize, position: f64) -> f32 {
        let Some(data) = self.samples.get(channel) else {
            return 0.0;
        };
        if position < 0.0 {
            return 0.0;
        }

        let index = position.floor() as usize;
        let frac = (position - index as f64) as f32;
        match (data.get(index), data.get(index + 1)) {
            (Some(&a), Some(&b)) => a + (b - a) * frac,
            (Some(&a), None) => a * (1.0 - frac),
            _ => 0.0,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interleave_roundtrip_keeps_channel_order() {
        let interleaved = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 48000).unwrap();
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), interleaved.to_vec());
    }

    #[test]
    fn test_from_interleaved_rejects_ragged_data() {
        let err = AudioBuffer::from_interleaved(&[0.0; 5], 2, 48000).unwrap_err();
        assert!(err.is_decode_failure());
    }

    #[test]
    fn test_from_planar_rejects_mismatched_channels() {
        let err = AudioBuffer::from_planar(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_FAILURE");
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(AudioBuffer::from_planar(vec![vec![0.0; 4]], 0).is_err());
    }

    #[test]
    fn test_sample_at_interpolates() {
        let buffer = AudioBuffer::from_planar(vec![vec![0.0, 1.0, 0.0]], 10).unwrap();
        assert_relative_eq!(buffer.sample_at(0, 0.5), 0.5);
        assert_relative_eq!(buffer.sample_at(0, 1.0), 1.0);
        assert_relative_eq!(buffer.sample_at(0, 1.25), 0.75);
        assert_eq!(buffer.sample_at(0, 3.0), 0.0);
        assert_eq!(buffer.sample_at(1, 0.0), 0.0);
    }

    #[test]
    fn test_level_helpers() {
        assert_eq!(calculate_rms(&[]), f32::NEG_INFINITY);
        assert_relative_eq!(calculate_rms(&[0.5, -0.5, 0.5, -0.5]), linear_to_db(0.5));
        assert_relative_eq!(linear_to_db(1.0), 0.0);
    }
}
