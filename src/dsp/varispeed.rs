//! Varispeed buffer playback
//!
//! The bundled stand-in for a time/pitch processor: it walks the decoded
//! buffer at `tempo` frames per output frame (corrected for any sample rate
//! difference) with linear interpolation. Pitch follows speed.

use std::sync::Arc;

use crate::engine::AudioBuffer;

/// Plays one buffer once at a variable rate
#[derive(Debug, Clone)]
pub struct BufferPlayer {
    buffer: Arc<AudioBuffer>,
    position: f64,
    tempo: f64,
    rate_ratio: f64,
    finished: bool,
}

impl BufferPlayer {
    pub fn new(buffer: Arc<AudioBuffer>, output_sample_rate: u32) -> Self {
        let rate_ratio = buffer.sample_rate() as f64 / output_sample_rate.max(1) as f64;
        let finished = buffer.is_empty();
        Self {
            buffer,
            position: 0.0,
            tempo: 1.0,
            rate_ratio,
            finished,
        }
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Set the playback rate; non-positive or non-finite values are ignored
    pub fn set_tempo(&mut self, tempo: f64) {
        if tempo.is_finite() && tempo > 0.0 {
            self.tempo = tempo;
        }
    }

    /// Read position in source frames
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Render `frames` interleaved frames with `channels` output channels
    ///
    /// Returns the block and whether the end of the buffer was reached during
    /// this call. Output after the end is silence.
    pub fn render(&mut self, frames: usize, channels: usize) -> (Vec<f32>, bool) {
        let mut block = vec![0.0_f32; frames * channels];
        if self.finished {
            return (block, false);
        }

        let source_channels = self.buffer.channels();
        let len = self.buffer.len() as f64;
        let step = self.tempo * self.rate_ratio;
        let mut just_finished = false;

        for frame in block.chunks_mut(channels) {
            if self.position >= len {
                self.finished = true;
                just_finished = true;
                break;
            }
            for (ch, sample) in frame.iter_mut().enumerate() {
                let source = ch.min(source_channels - 1);
                *sample = self.buffer.sample_at(source, self.position);
            }
            self.position += step;
        }

        if !self.finished && self.position >= len {
            self.finished = true;
            just_finished = true;
        }

        (block, just_finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(frames: usize, sample_rate: u32) -> Arc<AudioBuffer> {
        let data = (0..frames).map(|i| i as f32).collect();
        Arc::new(AudioBuffer::from_planar(vec![data], sample_rate).unwrap())
    }

    #[test]
    fn test_unity_tempo_copies_source() {
        let mut player = BufferPlayer::new(ramp_buffer(8, 100), 100);
        let (block, ended) = player.render(4, 1);
        assert_eq!(block, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(!ended);
    }

    #[test]
    fn test_ends_exactly_once() {
        let mut player = BufferPlayer::new(ramp_buffer(6, 100), 100);
        let (_, first) = player.render(4, 1);
        let (tail, second) = player.render(4, 1);
        let (_, third) = player.render(4, 1);
        assert!(!first);
        assert!(second);
        assert!(!third);
        assert_eq!(&tail[..2], &[4.0, 5.0]);
        assert_eq!(&tail[2..], &[0.0, 0.0]);
    }

    #[test]
    fn test_double_tempo_skips_frames() {
        let mut player = BufferPlayer::new(ramp_buffer(16, 100), 100);
        player.set_tempo(2.0);
        let (block, _) = player.render(3, 1);
        assert_eq!(block, vec![0.0, 2.0, 4.0]);
        assert_eq!(player.position(), 6.0);
    }

    #[test]
    fn test_mono_source_fills_every_output_channel() {
        let mut player = BufferPlayer::new(ramp_buffer(4, 100), 100);
        let (block, _) = player.render(2, 2);
        assert_eq!(block, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sample_rate_correction() {
        let mut player = BufferPlayer::new(ramp_buffer(16, 200), 100);
        let (block, _) = player.render(2, 1);
        assert_eq!(block, vec![0.0, 2.0]);
    }

    #[test]
    fn test_invalid_tempo_ignored() {
        let mut player = BufferPlayer::new(ramp_buffer(4, 100), 100);
        player.set_tempo(0.0);
        player.set_tempo(f64::NAN);
        assert_eq!(player.tempo(), 1.0);
    }
}
