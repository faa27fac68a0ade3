//! Playback session
//!
//! The top-level controller: configuration, control settings and the
//! Idle/Loaded/Playing state machine that owns the pipeline, the tempo ramp
//! and the capture.

pub mod config;
pub mod controls;
pub mod playback;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::SessionConfig;
pub use controls::{ControlSettings, ControlState, ParamKind};
pub use playback::{PlayOutcome, PlaybackSession, PollReport};

/// Lifecycle state of a [`PlaybackSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No buffer loaded
    #[default]
    Idle,
    /// Buffer present, nothing playing
    Loaded,
    /// Processor, ramp and capture active
    Playing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Loaded => write!(f, "Loaded"),
            SessionState::Playing => write!(f, "Playing"),
        }
    }
}
