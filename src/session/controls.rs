//! Control values and their boundary validation
//!
//! Raw text from a control surface is parsed here into checked numbers;
//! the session itself only ever sees validated values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RampdeckError, Result};

/// Persisted control values, applied on the next play or toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Playback rate, 1.0 = original speed
    pub tempo: f64,
    /// Linear output gain
    pub gain: f64,
    pub filter_enabled: bool,
    /// Lowpass cutoff in Hz
    pub cutoff_frequency: f64,
    pub resonance_q: f64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            tempo: 1.0,
            gain: 1.0,
            filter_enabled: false,
            cutoff_frequency: 350.0,
            resonance_q: 1.0,
        }
    }
}

impl ControlSettings {
    pub fn validate(&self) -> Result<()> {
        ParamKind::Tempo.validate(self.tempo)?;
        ParamKind::Gain.validate(self.gain)?;
        ParamKind::CutoffFrequency.validate(self.cutoff_frequency)?;
        ParamKind::ResonanceQ.validate(self.resonance_q)?;
        Ok(())
    }
}

/// Which controls a surface should currently offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlState {
    pub play_enabled: bool,
    pub stop_enabled: bool,
    /// False while the tempo ramp owns the tempo
    pub tempo_editable: bool,
    /// False while the filter is bypassed
    pub filter_params_editable: bool,
    pub recording: bool,
}

/// A user-adjustable numeric parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Tempo,
    Gain,
    CutoffFrequency,
    ResonanceQ,
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Tempo => "tempo",
            ParamKind::Gain => "gain",
            ParamKind::CutoffFrequency => "cutoff_frequency",
            ParamKind::ResonanceQ => "resonance_q",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ParamKind::Gain => "a finite number >= 0",
            _ => "a finite number > 0",
        }
    }

    /// Check a numeric value against this parameter's range
    pub fn validate(&self, value: f64) -> Result<f64> {
        let in_range = match self {
            ParamKind::Gain => value >= 0.0,
            _ => value > 0.0,
        };
        if value.is_finite() && in_range {
            Ok(value)
        } else {
            Err(RampdeckError::InvalidParameter {
                param: self.name().to_string(),
                value: value.to_string(),
                expected: self.expected().to_string(),
            })
        }
    }

    /// Parse raw control text into a validated value
    ///
    /// # Example
    /// ```
    /// use rampdeck::session::ParamKind;
    ///
    /// assert_eq!(ParamKind::Tempo.parse(" 1.5 ").unwrap(), 1.5);
    /// assert!(ParamKind::Tempo.parse("fast").is_err());
    /// assert!(ParamKind::Gain.parse("-1").is_err());
    /// ```
    pub fn parse(&self, input: &str) -> Result<f64> {
        let value: f64 = input.trim().parse().map_err(|_| RampdeckError::InvalidParameter {
            param: self.name().to_string(),
            value: input.to_string(),
            expected: self.expected().to_string(),
        })?;
        self.validate(value)
    }

    /// Display text for a value
    pub fn format(&self, value: f64) -> String {
        match self {
            ParamKind::Tempo | ParamKind::Gain => format!("{:.3}", value),
            ParamKind::ResonanceQ => format!("{:.1}", value),
            ParamKind::CutoffFrequency => format!("{}", value),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
