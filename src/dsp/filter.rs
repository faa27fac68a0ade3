//! Lowpass filter
//!
//! Second-order RBJ cookbook lowpass, one biquad state per channel.

use std::f64::consts::PI;

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate lowpass coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    fn lowpass(sample_rate: f64, frequency: f64, q: f64) -> Self {
        // Clamp frequency to valid range (below Nyquist); at very low rates
        // the floor wins
        let ceiling = (sample_rate / 2.0 - 1.0).max(10.0);
        let freq = frequency.clamp(10.0, ceiling);
        let q = q.clamp(0.0001, 1000.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        BiquadCoeffs {
            b0: ((1.0 - cos_w0) / 2.0) / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: ((1.0 - cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Resonant lowpass filter over interleaved blocks
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    cutoff: f64,
    q: f64,
    sample_rate: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl LowpassFilter {
    pub fn new(sample_rate: u32, channels: usize, cutoff: f64, q: f64) -> Self {
        let sample_rate = sample_rate.max(1) as f64;
        Self {
            cutoff,
            q,
            sample_rate,
            coeffs: BiquadCoeffs::lowpass(sample_rate, cutoff, q),
            states: vec![BiquadState::default(); channels.max(1)],
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn set_cutoff(&mut self, cutoff: f64) {
        self.cutoff = cutoff;
        self.coeffs = BiquadCoeffs::lowpass(self.sample_rate, self.cutoff, self.q);
    }

    pub fn set_q(&mut self, q: f64) {
        self.q = q;
        self.coeffs = BiquadCoeffs::lowpass(self.sample_rate, self.cutoff, self.q);
    }

    /// Filter an interleaved block in place
    pub fn process(&mut self, block: &mut [f32]) {
        let channels = self.states.len();
        for frame in block.chunks_mut(channels) {
            for (sample, state) in frame.iter_mut().zip(self.states.iter_mut()) {
                *sample = state.process(*sample as f64, &self.coeffs) as f32;
            }
        }
    }
}
