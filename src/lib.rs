//! Rampdeck - Playback Session Controller
//!
//! Rampdeck loads a decoded buffer, routes it through a swappable chain of
//! stages and records what comes out:
//!
//! ```text
//! Processor (tempo) -> [Filter (lowpass)] -> Sink (gain) -> destination
//!                                                 \-> monitor tap -> capture
//! ```
//!
//! # Architecture
//!
//! - `engine`: buffers, decoding, the engine contract and a block renderer
//! - `pipeline`: stage handles and the Direct/Filtered topology controller
//! - `automation`: cooperative timers and the linear tempo ramp
//! - `capture`: the capture contract, its session adapter and WAV recording
//! - `session`: the Idle/Loaded/Playing state machine tying it together
//!
//! Everything runs on one thread. Time only moves when the caller polls the
//! session, which makes offline rendering and testing deterministic.

pub mod automation;
pub mod capture;
pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod session;

pub use error::{RampdeckError, Result};
pub use session::{PlayOutcome, PlaybackSession, SessionConfig, SessionState};
