//! Block renderer implementing [`AudioEngine`]
//!
//! Nodes live in an ordered map and are pulled from each sink once per block.
//! A node feeding several targets is rendered once and its output reused.
//! Sink output goes to the destination mix and to every open monitor tap.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::dsp::{BufferPlayer, GainStage, LowpassFilter};
use crate::engine::backend::{AudioEngine, MonitorStream, NodeId, StageParam};
use crate::engine::AudioBuffer;
use crate::error::{RampdeckError, Result};

/// Default filter settings for freshly created filter nodes
const DEFAULT_CUTOFF_HZ: f64 = 350.0;
const DEFAULT_Q: f64 = 1.0;

#[derive(Debug)]
enum RenderNode {
    Processor(BufferPlayer),
    Filter(LowpassFilter),
    Sink(GainStage),
}

impl RenderNode {
    fn kind(&self) -> &'static str {
        match self {
            RenderNode::Processor(_) => "processor",
            RenderNode::Filter(_) => "filter",
            RenderNode::Sink(_) => "sink",
        }
    }
}

/// Single-threaded engine that renders on demand
#[derive(Debug)]
pub struct RenderEngine {
    sample_rate: u32,
    channels: usize,
    next_id: u64,
    nodes: BTreeMap<NodeId, RenderNode>,
    edges: BTreeMap<NodeId, Vec<NodeId>>,
    taps: Vec<(NodeId, MonitorStream)>,
    ended: Vec<NodeId>,
    frames_rendered: u64,
    online: bool,
}

impl RenderEngine {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            next_id: 1,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            taps: Vec::new(),
            ended: Vec::new(),
            frames_rendered: 0,
            online: true,
        }
    }

    /// Current edge list, sorted by source node
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (*from, *to)))
            .collect()
    }

    /// Number of edges arriving at `node`
    pub fn incoming(&self, node: NodeId) -> usize {
        self.edges
            .values()
            .map(|targets| targets.iter().filter(|t| **t == node).count())
            .sum()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Number of monitor taps still held open by a consumer
    pub fn open_taps(&self) -> usize {
        self.taps.iter().filter(|(_, tap)| !tap.is_closed()).count()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Current tempo of a processor node
    pub fn processor_tempo(&self, node: NodeId) -> Option<f64> {
        match self.nodes.get(&node) {
            Some(RenderNode::Processor(player)) => Some(player.tempo()),
            _ => None,
        }
    }

    /// Current (cutoff, q) of a filter node
    pub fn filter_params(&self, node: NodeId) -> Option<(f64, f64)> {
        match self.nodes.get(&node) {
            Some(RenderNode::Filter(filter)) => Some((filter.cutoff(), filter.q())),
            _ => None,
        }
    }

    /// Current gain of a sink node
    pub fn sink_gain(&self, node: NodeId) -> Option<f32> {
        match self.nodes.get(&node) {
            Some(RenderNode::Sink(gain)) => Some(gain.gain()),
            _ => None,
        }
    }

    /// Simulate losing the output device; every later call fails
    pub fn shut_down(&mut self) {
        self.online = false;
    }

    /// Render one block and return the interleaved destination mix
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut destination = vec![0.0_f32; frames * self.channels];
        if !self.online || frames == 0 {
            return destination;
        }

        let sinks: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node, RenderNode::Sink(_)))
            .map(|(id, _)| *id)
            .collect();

        let mut cache = HashMap::new();
        for sink in sinks {
            let output = self.pull(sink, frames, &mut cache, 0);
            for (mixed, sample) in destination.iter_mut().zip(&output) {
                *mixed += sample;
            }
            for (tap_sink, tap) in &self.taps {
                if *tap_sink == sink {
                    tap.push(&output);
                }
            }
        }

        self.taps.retain(|(_, tap)| !tap.is_closed());
        self.frames_rendered += frames as u64;
        destination
    }

    fn pull(
        &mut self,
        id: NodeId,
        frames: usize,
        cache: &mut HashMap<NodeId, Vec<f32>>,
        depth: usize,
    ) -> Vec<f32> {
        if let Some(output) = cache.get(&id) {
            return output.clone();
        }

        let silence = vec![0.0_f32; frames * self.channels];
        if depth > self.nodes.len() {
            // Cycle in the graph; break it with silence.
            return silence;
        }

        let sources: Vec<NodeId> = self
            .edges
            .iter()
            .filter(|(_, targets)| targets.contains(&id))
            .map(|(from, _)| *from)
            .collect();

        let mut input = silence;
        for source in sources {
            let upstream = self.pull(source, frames, cache, depth + 1);
            for (mixed, sample) in input.iter_mut().zip(&upstream) {
                *mixed += sample;
            }
        }

        let channels = self.channels;
        let Some(node) = self.nodes.get_mut(&id) else {
            return input;
        };
        let (output, just_ended) = match node {
            RenderNode::Processor(player) => player.render(frames, channels),
            RenderNode::Filter(filter) => {
                filter.process(&mut input);
                (input, false)
            }
            RenderNode::Sink(gain) => {
                gain.process(&mut input);
                (input, false)
            }
        };

        if just_ended {
            debug!(node = %id, "processor reached end of stream");
            self.ended.push(id);
        }
        cache.insert(id, output.clone());
        output
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online {
            Ok(())
        } else {
            Err(RampdeckError::EngineUnavailable {
                reason: "render engine has been shut down".to_string(),
            })
        }
    }

    fn ensure_node(&self, node: NodeId) -> Result<()> {
        if self.nodes.contains_key(&node) {
            Ok(())
        } else {
            Err(RampdeckError::UnknownNode { node })
        }
    }

    fn insert(&mut self, node: RenderNode) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        debug!(node = %id, kind = node.kind(), "created node");
        self.nodes.insert(id, node);
        id
    }
}

impl AudioEngine for RenderEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn create_processor(&mut self, buffer: Arc<AudioBuffer>) -> Result<NodeId> {
        self.ensure_online()?;
        let player = BufferPlayer::new(buffer, self.sample_rate);
        Ok(self.insert(RenderNode::Processor(player)))
    }

    fn create_filter(&mut self) -> Result<NodeId> {
        self.ensure_online()?;
        let filter = LowpassFilter::new(self.sample_rate, self.channels, DEFAULT_CUTOFF_HZ, DEFAULT_Q);
        Ok(self.insert(RenderNode::Filter(filter)))
    }

    fn create_sink(&mut self) -> Result<NodeId> {
        self.ensure_online()?;
        Ok(self.insert(RenderNode::Sink(GainStage::default())))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.ensure_online()?;
        self.ensure_node(from)?;
        self.ensure_node(to)?;

        let targets = self.edges.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId) -> Result<()> {
        self.ensure_online()?;
        self.ensure_node(from)?;
        self.edges.remove(&from);
        Ok(())
    }

    fn release(&mut self, node: NodeId) -> Result<()> {
        self.ensure_online()?;
        if self.nodes.remove(&node).is_none() {
            return Err(RampdeckError::UnknownNode { node });
        }

        self.edges.remove(&node);
        for targets in self.edges.values_mut() {
            targets.retain(|t| *t != node);
        }
        self.edges.retain(|_, targets| !targets.is_empty());
        self.ended.retain(|n| *n != node);
        for (sink, tap) in &self.taps {
            if *sink == node {
                tap.close();
            }
        }
        debug!(node = %node, "released node");
        Ok(())
    }

    fn set_param(&mut self, node: NodeId, param: StageParam, value: f64) -> Result<()> {
        self.ensure_online()?;
        let entry = self
            .nodes
            .get_mut(&node)
            .ok_or(RampdeckError::UnknownNode { node })?;

        match (entry, param) {
            (RenderNode::Processor(player), StageParam::Tempo) => player.set_tempo(value),
            (RenderNode::Filter(filter), StageParam::CutoffFrequency) => filter.set_cutoff(value),
            (RenderNode::Filter(filter), StageParam::ResonanceQ) => filter.set_q(value),
            (RenderNode::Sink(gain), StageParam::Gain) => {
                gain.set_gain(value as f32);
                debug!(node = %node, gain_db = gain.gain_db(), "sink gain set");
            }
            (other, param) => {
                return Err(RampdeckError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: format!("a parameter supported by a {} node", other.kind()),
                })
            }
        }
        Ok(())
    }

    fn monitor_tap(&mut self, sink: NodeId) -> Result<MonitorStream> {
        self.ensure_online()?;
        match self.nodes.get(&sink) {
            Some(RenderNode::Sink(_)) => {
                let tap = MonitorStream::new(self.sample_rate, self.channels);
                self.taps.push((sink, tap.clone()));
                Ok(tap)
            }
            Some(other) => Err(RampdeckError::InvalidParameter {
                param: "monitor_tap".to_string(),
                value: sink.to_string(),
                expected: format!("a sink node, got a {}", other.kind()),
            }),
            None => Err(RampdeckError::UnknownNode { node: sink }),
        }
    }

    fn drain_ended(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.ended)
    }
}
