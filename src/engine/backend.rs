//! Engine collaborator contract
//!
//! The controller never touches samples. It creates nodes, wires them and
//! pokes parameters through [`AudioEngine`]; whatever executes the DSP sits
//! behind this trait.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::engine::AudioBuffer;
use crate::error::Result;

/// Opaque handle to a node living inside an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Role-specific mutable parameters exposed by stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageParam {
    /// Playback rate of a processor (1.0 = original speed)
    Tempo,
    /// Linear output gain of a sink
    Gain,
    /// Lowpass cutoff in Hz
    CutoffFrequency,
    /// Lowpass resonance
    ResonanceQ,
}

impl fmt::Display for StageParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageParam::Tempo => write!(f, "tempo"),
            StageParam::Gain => write!(f, "gain"),
            StageParam::CutoffFrequency => write!(f, "cutoff_frequency"),
            StageParam::ResonanceQ => write!(f, "resonance_q"),
        }
    }
}

/// Node graph operations a playback controller needs from an audio engine
pub trait AudioEngine {
    /// Output sample rate of the engine
    fn sample_rate(&self) -> u32;

    /// Output channel count of the engine
    fn channels(&self) -> usize;

    /// Create a time/pitch processor that plays `buffer` once
    fn create_processor(&mut self, buffer: Arc<AudioBuffer>) -> Result<NodeId>;

    /// Create a lowpass filter node
    fn create_filter(&mut self) -> Result<NodeId>;

    /// Create a gain sink feeding the destination
    fn create_sink(&mut self) -> Result<NodeId>;

    /// Add an edge `from -> to`
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()>;

    /// Remove every outgoing edge of `from`
    fn disconnect(&mut self, from: NodeId) -> Result<()>;

    /// Destroy a node and every edge touching it
    fn release(&mut self, node: NodeId) -> Result<()>;

    /// Set a role-specific parameter
    fn set_param(&mut self, node: NodeId, param: StageParam, value: f64) -> Result<()>;

    /// Open a new monitor tap receiving a copy of the sink output
    fn monitor_tap(&mut self, sink: NodeId) -> Result<MonitorStream>;

    /// Take the processors that reached end-of-stream since the last call
    ///
    /// Each processor appears at most once over its lifetime.
    fn drain_ended(&mut self) -> Vec<NodeId>;
}

#[derive(Debug)]
struct StreamInner {
    sample_rate: u32,
    channels: usize,
    pending: VecDeque<Vec<f32>>,
    closed: bool,
}

/// Live audio stream handle produced by a sink's monitor tap
///
/// Blocks are interleaved `f32`. Clones share the same queue; the engine
/// pushes, the capture side drains.
#[derive(Debug, Clone)]
pub struct MonitorStream {
    inner: Rc<RefCell<StreamInner>>,
}

impl MonitorStream {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StreamInner {
                sample_rate,
                channels,
                pending: VecDeque::new(),
                closed: false,
            })),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.borrow().sample_rate
    }

    pub fn channels(&self) -> usize {
        self.inner.borrow().channels
    }

    /// Queue a block; ignored once the stream is closed
    pub fn push(&self, block: &[f32]) {
        let mut inner = self.inner.borrow_mut();
        if !inner.closed && !block.is_empty() {
            inner.pending.push_back(block.to_vec());
        }
    }

    /// Take every queued block in arrival order
    pub fn drain(&self) -> Vec<Vec<f32>> {
        self.inner.borrow_mut().pending.drain(..).collect()
    }

    /// Number of queued blocks
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Stop accepting audio
    pub fn close(&self) {
        self.inner.borrow_mut().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_clones_share_queue() {
        let engine_side = MonitorStream::new(48000, 2);
        let capture_side = engine_side.clone();

        engine_side.push(&[0.1, 0.2]);
        engine_side.push(&[0.3, 0.4]);
        assert_eq!(capture_side.pending(), 2);

        let blocks = capture_side.drain();
        assert_eq!(blocks, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        assert_eq!(engine_side.pending(), 0);
    }

    #[test]
    fn test_closed_stream_drops_audio() {
        let stream = MonitorStream::new(44100, 1);
        stream.close();
        stream.push(&[1.0]);
        assert!(stream.is_closed());
        assert_eq!(stream.pending(), 0);
    }

    #[test]
    fn test_node_display() {
        assert_eq!(NodeId::new(7).to_string(), "node#7");
        assert_eq!(StageParam::ResonanceQ.to_string(), "resonance_q");
    }
}
