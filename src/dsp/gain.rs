//! Gain stage
//!
//! Linear volume, as driven by the volume control. Unity gain is a no-op.

use crate::engine::buffer::linear_to_db;

/// Linear gain over interleaved blocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainStage {
    gain: f32,
}

impl GainStage {
    /// Create a gain stage; negative or non-finite values are treated as silence
    pub fn new(gain: f32) -> Self {
        let mut stage = Self { gain: 1.0 };
        stage.set_gain(gain);
        stage
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = if gain.is_finite() { gain.max(0.0) } else { 0.0 };
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Current gain in decibels (for display)
    pub fn gain_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    pub fn process(&self, block: &mut [f32]) {
        // Unity gain optimization
        if (self.gain - 1.0).abs() < f32::EPSILON {
            return;
        }

        for sample in block.iter_mut() {
            *sample *= self.gain;
        }
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_samples() {
        let stage = GainStage::new(0.5);
        let mut block = [1.0, -0.5, 0.25];
        stage.process(&mut block);
        assert_eq!(block, [0.5, -0.25, 0.125]);
    }

    #[test]
    fn test_unity_passthrough() {
        let stage = GainStage::default();
        let mut block = [0.3, -0.3];
        stage.process(&mut block);
        assert_eq!(block, [0.3, -0.3]);
        assert_eq!(stage.gain_db(), 0.0);
    }

    #[test]
    fn test_invalid_gain_is_silence() {
        assert_eq!(GainStage::new(-2.0).gain(), 0.0);
        assert_eq!(GainStage::new(f32::NAN).gain(), 0.0);
        assert_eq!(GainStage::new(0.0).gain_db(), f32::NEG_INFINITY);
    }
}
