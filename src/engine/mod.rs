//! Audio Engine Module
//!
//! Everything below the playback controller:
//! - Audio buffer management
//! - Decoding (file I/O)
//! - The engine collaborator contract and the bundled block renderer
//! - Time sources for the cooperative loop

pub mod backend;
pub mod buffer;
pub mod clock;
pub mod io;
pub mod render;

pub use backend::{AudioEngine, MonitorStream, NodeId, StageParam};
pub use buffer::AudioBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use io::{
    encode_wav, generate_test_tone, import_audio, read_audio_file, Decoder, WavDecoder,
};
pub use render::RenderEngine;
