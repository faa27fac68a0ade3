//! WAV capture facility
//!
//! Each pump turns the queued monitor blocks into PCM chunks. Closing drains
//! whatever is still queued, closes the stream and wraps every chunk of the
//! recording in a single RIFF/WAVE file.

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

use chrono::Utc;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capture::{Artifact, CaptureConfig, CaptureFacility, CaptureId, ChunkCallback, EncodedChunk};
use crate::engine::MonitorStream;
use crate::error::{RampdeckError, Result};

/// Declared media type of every artifact this facility produces
pub const WAV_MEDIA_TYPE: &str = "audio/wav";

struct Recording {
    stream: MonitorStream,
    chunks: Vec<EncodedChunk>,
    callback: Option<ChunkCallback>,
    frames: u64,
}

impl Recording {
    fn encode_pending(&mut self, bit_depth: u16) {
        let channels = self.stream.channels().max(1);
        for block in self.stream.drain() {
            let data: Vec<u8> = match bit_depth {
                32 => block.iter().flat_map(|s| s.to_le_bytes()).collect(),
                _ => block
                    .iter()
                    .flat_map(|s| ((s * 32767.0).clamp(-32768.0, 32767.0) as i16).to_le_bytes())
                    .collect(),
            };
            let chunk = EncodedChunk {
                sequence: self.chunks.len() as u64,
                frames: block.len() / channels,
                data,
            };

            if let Some(callback) = self.callback.as_mut() {
                callback(&chunk);
            }
            self.frames += chunk.frames as u64;
            self.chunks.push(chunk);
        }
    }
}

/// Records monitor streams into WAV artifacts
pub struct WavCapture {
    config: CaptureConfig,
    recordings: HashMap<CaptureId, Recording>,
    finalized: u64,
}

impl WavCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            recordings: HashMap::new(),
            finalized: 0,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Number of recordings closed over this facility's lifetime
    pub fn finalized(&self) -> u64 {
        self.finalized
    }

    fn finalize(&self, recording: &Recording) -> Result<Vec<u8>> {
        let sample_format = if self.config.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        };
        let spec = WavSpec {
            channels: recording.stream.channels() as u16,
            sample_rate: recording.stream.sample_rate(),
            bits_per_sample: self.config.bit_depth,
            sample_format,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(capture_failed)?;
        for chunk in &recording.chunks {
            if self.config.bit_depth == 32 {
                for bytes in chunk.data.chunks_exact(4) {
                    let sample = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    writer.write_sample(sample).map_err(capture_failed)?;
                }
            } else {
                for bytes in chunk.data.chunks_exact(2) {
                    let sample = i16::from_le_bytes([bytes[0], bytes[1]]);
                    writer.write_sample(sample).map_err(capture_failed)?;
                }
            }
        }
        writer.finalize().map_err(capture_failed)?;

        Ok(cursor.into_inner())
    }
}

impl fmt::Debug for WavCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WavCapture")
            .field("config", &self.config)
            .field("open", &self.recordings.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl Default for WavCapture {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

impl CaptureFacility for WavCapture {
    fn open(&mut self, stream: MonitorStream) -> Result<CaptureId> {
        if !self.config.enabled {
            return Err(RampdeckError::CaptureUnavailable {
                reason: "capture is disabled in the configuration".to_string(),
            });
        }
        if stream.is_closed() {
            return Err(RampdeckError::CaptureUnavailable {
                reason: "monitor stream is already closed".to_string(),
            });
        }
        if stream.channels() == 0 || stream.channels() > u16::MAX as usize {
            return Err(RampdeckError::CaptureUnavailable {
                reason: format!("cannot record a {}-channel stream", stream.channels()),
            });
        }

        let id = CaptureId::new();
        self.recordings.insert(
            id,
            Recording {
                stream,
                chunks: Vec::new(),
                callback: None,
                frames: 0,
            },
        );
        debug!(capture = %id, "recording started");
        Ok(id)
    }

    fn on_chunk(&mut self, id: CaptureId, callback: ChunkCallback) -> Result<()> {
        let recording = self
            .recordings
            .get_mut(&id)
            .ok_or_else(|| RampdeckError::CaptureFailed {
                reason: format!("{} is not open", id),
            })?;
        recording.callback = Some(callback);
        Ok(())
    }

    fn pump(&mut self) -> Result<()> {
        let bit_depth = self.config.bit_depth;
        for recording in self.recordings.values_mut() {
            recording.encode_pending(bit_depth);
        }
        Ok(())
    }

    fn close(&mut self, id: CaptureId) -> Result<Artifact> {
        let mut recording = self
            .recordings
            .remove(&id)
            .ok_or_else(|| RampdeckError::CaptureFailed {
                reason: format!("{} is not open", id),
            })?;

        recording.encode_pending(self.config.bit_depth);
        recording.stream.close();
        self.finalized += 1;

        if recording.frames == 0 {
            warn!(capture = %id, "closing a recording that captured no audio");
        }

        let data = self.finalize(&recording)?;
        Ok(Artifact {
            id: Uuid::new_v4(),
            data,
            filename: format!("{}.wav", self.config.file_stem),
            media_type: WAV_MEDIA_TYPE.to_string(),
            created_at: Utc::now(),
            frames: recording.frames,
            sample_rate: recording.stream.sample_rate(),
            channels: recording.stream.channels() as u16,
        })
    }

    fn open_count(&self) -> usize {
        self.recordings.len()
    }
}

fn capture_failed(e: hound::Error) -> RampdeckError {
    RampdeckError::CaptureFailed {
        reason: format!("WAV encoding failed: {}", e),
    }
}
