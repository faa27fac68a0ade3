//! Parameter automation
//!
//! Periodic cooperative timers and the tempo ramp built on them.

pub mod ramp;
pub mod timer;

pub use ramp::{RampState, RampTick, TempoRamp};
pub use timer::{TimerId, TimerQueue};
