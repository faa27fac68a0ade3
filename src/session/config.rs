//! Session configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;
use crate::error::{RampdeckError, Result};
use crate::session::controls::ControlSettings;

/// Timing, rendering and capture settings for a [`PlaybackSession`](super::PlaybackSession)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ramp tick cadence in milliseconds
    pub tick_interval_ms: u64,
    /// Ramp duration in milliseconds; 0 finishes on the first tick
    pub ramp_window_ms: u64,
    /// Ramp target as a multiple of the starting tempo
    pub ramp_factor: f64,
    /// Frames rendered per block by offline drivers
    pub block_size: usize,
    /// Control values the session starts with
    pub controls: ControlSettings,
    pub capture: CaptureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            ramp_window_ms: 30_000,
            ramp_factor: 1.25,
            block_size: 4096,
            controls: ControlSettings::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RampdeckError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(RampdeckError::InvalidConfig {
                reason: "tick_interval_ms must be at least 1".to_string(),
            });
        }
        if !self.ramp_factor.is_finite() || self.ramp_factor <= 0.0 {
            return Err(RampdeckError::InvalidConfig {
                reason: format!("ramp_factor must be a finite number > 0, got {}", self.ramp_factor),
            });
        }
        if self.block_size == 0 {
            return Err(RampdeckError::InvalidConfig {
                reason: "block_size must be at least 1".to_string(),
            });
        }
        self.controls.validate().map_err(|e| RampdeckError::InvalidConfig {
            reason: format!("controls: {}", e),
        })?;
        self.capture.validate()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn ramp_window(&self) -> Duration {
        Duration::from_millis(self.ramp_window_ms)
    }
}
