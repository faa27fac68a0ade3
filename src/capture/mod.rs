//! Output capture
//!
//! A capture facility turns a live monitor stream into encoded chunks and,
//! when closed, into one exportable [`Artifact`]. [`CaptureSession`] is the
//! playback side of that contract.

pub mod session;
pub mod wav;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::engine::MonitorStream;
use crate::error::{RampdeckError, Result};

pub use session::{CaptureSession, CaptureStats};
pub use wav::WavCapture;

/// Handle to one open capture inside a facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureId(Uuid);

impl CaptureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaptureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture-{}", self.0)
    }
}

/// One encoded piece of a recording
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    /// Position of this chunk in the recording, starting at 0
    pub sequence: u64,
    /// Number of audio frames encoded in `data`
    pub frames: usize,
    pub data: Vec<u8>,
}

/// Callback receiving every chunk as it is encoded
pub type ChunkCallback = Box<dyn FnMut(&EncodedChunk)>;

/// Settings for the bundled capture facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// When false every `open` fails with `CaptureUnavailable`
    pub enabled: bool,
    /// Suggested filename without extension
    pub file_stem: String,
    /// 16 (integer PCM) or 32 (float)
    pub bit_depth: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_stem: "processed_audio".to_string(),
            bit_depth: 16,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.bit_depth, 16 | 32) {
            return Err(RampdeckError::InvalidConfig {
                reason: format!("capture.bit_depth must be 16 or 32, got {}", self.bit_depth),
            });
        }
        if self.file_stem.trim().is_empty() || self.file_stem.contains(|c: char| c == '/' || c == '\\') {
            return Err(RampdeckError::InvalidConfig {
                reason: format!("capture.file_stem '{}' is not a plain file name", self.file_stem),
            });
        }
        Ok(())
    }
}

/// Finalized recording ready for download or export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Suggested filename, including extension
    pub filename: String,
    /// Declared media type of `data`
    pub media_type: String,
    pub created_at: DateTime<Utc>,
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// SHA-256 of the encoded bytes, lowercase hex
    pub fn sha256_hex(&self) -> String {
        format!("{:x}", Sha256::digest(&self.data))
    }

    /// Write the artifact into `dir` under its suggested filename
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.data)?;
        Ok(path)
    }
}

/// Capture collaborator contract
pub trait CaptureFacility {
    /// Start recording a live stream
    fn open(&mut self, stream: MonitorStream) -> Result<CaptureId>;

    /// Register the callback receiving encoded chunks for `id`
    fn on_chunk(&mut self, id: CaptureId, callback: ChunkCallback) -> Result<()>;

    /// Move pending stream audio into encoded chunks
    fn pump(&mut self) -> Result<()>;

    /// Flush the remaining audio and finalize the recording
    fn close(&mut self, id: CaptureId) -> Result<Artifact>;

    /// Number of captures opened and not yet closed
    fn open_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(data: Vec<u8>) -> Artifact {
        Artifact {
            id: Uuid::new_v4(),
            data,
            filename: "processed_audio.wav".to_string(),
            media_type: "audio/wav".to_string(),
            created_at: Utc::now(),
            frames: 22050,
            sample_rate: 44100,
            channels: 2,
        }
    }

    #[test]
    fn test_checksum_is_stable() {
        let a = artifact(b"abc".to_vec());
        assert_eq!(
            a.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(a.duration_secs(), 0.5);
    }

    #[test]
    fn test_write_to_uses_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact(vec![1, 2, 3]);
        let path = a.write_to(dir.path()).unwrap();
        assert!(path.ends_with("processed_audio.wav"));
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_config_validation() {
        assert!(CaptureConfig::default().validate().is_ok());
        let bad_depth = CaptureConfig {
            bit_depth: 24,
            ..Default::default()
        };
        assert!(bad_depth.validate().is_err());
        let bad_stem = CaptureConfig {
            file_stem: "../escape".to_string(),
            ..Default::default()
        };
        assert!(bad_stem.validate().is_err());
    }
}
