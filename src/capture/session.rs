//! Playback-side capture handle
//!
//! Opening registers a chunk listener; closing consumes the handle, so a
//! capture can be finalized at most once. The playback session is
//! responsible for closing it on every stop path.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::capture::{Artifact, CaptureFacility, CaptureId, EncodedChunk};
use crate::engine::MonitorStream;
use crate::error::Result;

/// Running totals of what a capture has encoded so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub chunks: u64,
    pub frames: u64,
    pub bytes: u64,
}

/// An open recording bound to one playback
#[derive(Debug)]
pub struct CaptureSession {
    id: CaptureId,
    opened_at: Duration,
    stats: Rc<RefCell<CaptureStats>>,
}

impl CaptureSession {
    /// Open a capture on `stream` and start collecting chunk statistics
    pub fn open<C: CaptureFacility + ?Sized>(
        facility: &mut C,
        stream: MonitorStream,
        now: Duration,
    ) -> Result<Self> {
        let id = facility.open(stream)?;
        let stats = Rc::new(RefCell::new(CaptureStats::default()));

        let listener = Rc::clone(&stats);
        let registered = facility.on_chunk(
            id,
            Box::new(move |chunk: &EncodedChunk| {
                let mut stats = listener.borrow_mut();
                stats.chunks += 1;
                stats.frames += chunk.frames as u64;
                stats.bytes += chunk.data.len() as u64;
            }),
        );

        if let Err(e) = registered {
            // Never leave an opened capture behind.
            if let Err(close_err) = facility.close(id) {
                warn!(capture = %id, error = %close_err, "failed to close capture after registration error");
            }
            return Err(e);
        }

        debug!(capture = %id, "capture opened");
        Ok(Self {
            id,
            opened_at: now,
            stats,
        })
    }

    pub fn id(&self) -> CaptureId {
        self.id
    }

    /// Clock reading when the capture was opened
    pub fn opened_at(&self) -> Duration {
        self.opened_at
    }

    pub fn stats(&self) -> CaptureStats {
        *self.stats.borrow()
    }

    /// Finalize the recording into an artifact
    pub fn close<C: CaptureFacility + ?Sized>(self, facility: &mut C) -> Result<Artifact> {
        let artifact = facility.close(self.id)?;
        debug!(
            capture = %self.id,
            bytes = artifact.len(),
            chunks = self.stats().chunks,
            "capture finalized"
        );
        Ok(artifact)
    }
}
