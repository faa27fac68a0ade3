//! DSP building blocks executed by the bundled render engine
//!
//! All processors work on interleaved `f32` blocks so they can sit directly
//! on the engine's edges.

mod filter;
mod gain;
mod varispeed;

pub use filter::LowpassFilter;
pub use gain::GainStage;
pub use varispeed::BufferPlayer;
