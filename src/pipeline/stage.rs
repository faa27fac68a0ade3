//! Pipeline stages
//!
//! A stage is a controller-side handle to an engine node plus the last value
//! written to each of its parameters.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::engine::{AudioBuffer, AudioEngine, MonitorStream, NodeId, StageParam};
use crate::error::Result;

/// Role of a stage in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    Processor,
    Filter,
    Sink,
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRole::Processor => write!(f, "Processor"),
            StageRole::Filter => write!(f, "Filter"),
            StageRole::Sink => write!(f, "Sink"),
        }
    }
}

/// Connect/disconnect capability shared by every stage
pub trait Stage {
    /// Engine node backing this stage
    fn node(&self) -> NodeId;

    fn role(&self) -> StageRole;

    /// Route this stage's output into `target`
    fn connect(&self, engine: &mut dyn AudioEngine, target: &dyn Stage) -> Result<()> {
        engine.connect(self.node(), target.node())
    }

    /// Drop every outgoing connection of this stage
    fn disconnect(&self, engine: &mut dyn AudioEngine) -> Result<()> {
        engine.disconnect(self.node())
    }
}

/// Time/pitch modifier bound to exactly one buffer
#[derive(Debug)]
pub struct Processor {
    node: NodeId,
    buffer: Arc<AudioBuffer>,
    tempo: f64,
}

impl Processor {
    /// Create the engine node and apply the starting tempo
    pub fn create(engine: &mut dyn AudioEngine, buffer: Arc<AudioBuffer>, tempo: f64) -> Result<Self> {
        let node = engine.create_processor(Arc::clone(&buffer))?;
        if let Err(e) = engine.set_param(node, StageParam::Tempo, tempo) {
            if let Err(release) = engine.release(node) {
                warn!(%node, error = %release, "failed to release processor after a rejected tempo");
            }
            return Err(e);
        }
        Ok(Self { node, buffer, tempo })
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn set_tempo(&mut self, engine: &mut dyn AudioEngine, tempo: f64) -> Result<()> {
        engine.set_param(self.node, StageParam::Tempo, tempo)?;
        self.tempo = tempo;
        Ok(())
    }

    /// The buffer this processor plays
    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    /// Disconnect and destroy the engine node
    pub fn release(self, engine: &mut dyn AudioEngine) -> Result<()> {
        let disconnected = self.disconnect(engine);
        engine.release(self.node)?;
        disconnected
    }
}

impl Stage for Processor {
    fn node(&self) -> NodeId {
        self.node
    }

    fn role(&self) -> StageRole {
        StageRole::Processor
    }
}

/// Lowpass filter stage; independent of any buffer
#[derive(Debug)]
pub struct Filter {
    node: NodeId,
    cutoff_frequency: f64,
    resonance_q: f64,
}

impl Filter {
    pub fn create(engine: &mut dyn AudioEngine, cutoff_frequency: f64, resonance_q: f64) -> Result<Self> {
        let node = engine.create_filter()?;
        engine.set_param(node, StageParam::CutoffFrequency, cutoff_frequency)?;
        engine.set_param(node, StageParam::ResonanceQ, resonance_q)?;
        Ok(Self {
            node,
            cutoff_frequency,
            resonance_q,
        })
    }

    pub fn cutoff_frequency(&self) -> f64 {
        self.cutoff_frequency
    }

    pub fn resonance_q(&self) -> f64 {
        self.resonance_q
    }

    pub fn set_cutoff_frequency(&mut self, engine: &mut dyn AudioEngine, hz: f64) -> Result<()> {
        engine.set_param(self.node, StageParam::CutoffFrequency, hz)?;
        self.cutoff_frequency = hz;
        Ok(())
    }

    pub fn set_resonance_q(&mut self, engine: &mut dyn AudioEngine, q: f64) -> Result<()> {
        engine.set_param(self.node, StageParam::ResonanceQ, q)?;
        self.resonance_q = q;
        Ok(())
    }
}

impl Stage for Filter {
    fn node(&self) -> NodeId {
        self.node
    }

    fn role(&self) -> StageRole {
        StageRole::Filter
    }
}

/// Terminal gain stage with a monitor tap for capture
#[derive(Debug)]
pub struct Sink {
    node: NodeId,
    gain: f64,
}

impl Sink {
    pub fn create(engine: &mut dyn AudioEngine, gain: f64) -> Result<Self> {
        let node = engine.create_sink()?;
        engine.set_param(node, StageParam::Gain, gain)?;
        Ok(Self { node, gain })
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn set_gain(&mut self, engine: &mut dyn AudioEngine, gain: f64) -> Result<()> {
        engine.set_param(self.node, StageParam::Gain, gain)?;
        self.gain = gain;
        Ok(())
    }

    /// Open a stream carrying a copy of everything this sink outputs
    pub fn monitor_tap(&self, engine: &mut dyn AudioEngine) -> Result<MonitorStream> {
        engine.monitor_tap(self.node)
    }
}

impl Stage for Sink {
    fn node(&self) -> NodeId {
        self.node
    }

    fn role(&self) -> StageRole {
        StageRole::Sink
    }
}
