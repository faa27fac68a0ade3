//! Pipeline topology controller
//!
//! Owns the long-lived Filter and Sink, the current Processor (if any) and
//! the shape of the chain between them. Only two shapes exist:
//!
//! ```text
//! Direct:   Processor -> Sink
//! Filtered: Processor -> Filter -> Sink
//! ```

use std::fmt;

use tracing::debug;

use crate::engine::AudioEngine;
use crate::error::Result;
use crate::pipeline::stage::{Filter, Processor, Sink, Stage, StageRole};

/// Shape of the chain between Processor and Sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Direct,
    Filtered,
}

impl Topology {
    pub fn for_filter(filter_enabled: bool) -> Self {
        if filter_enabled {
            Topology::Filtered
        } else {
            Topology::Direct
        }
    }

    /// Role-level edges making up this shape
    pub fn edges(&self) -> Vec<(StageRole, StageRole)> {
        match self {
            Topology::Direct => vec![(StageRole::Processor, StageRole::Sink)],
            Topology::Filtered => vec![
                (StageRole::Processor, StageRole::Filter),
                (StageRole::Filter, StageRole::Sink),
            ],
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Direct => write!(f, "Processor->Sink"),
            Topology::Filtered => write!(f, "Processor->Filter->Sink"),
        }
    }
}

/// Stage instances and their current wiring
#[derive(Debug)]
pub struct PipelineGraph {
    processor: Option<Processor>,
    filter: Filter,
    sink: Sink,
    topology: Option<Topology>,
}

impl PipelineGraph {
    /// Build the long-lived stages; no processor is attached yet
    pub fn new(engine: &mut dyn AudioEngine, gain: f64, cutoff_frequency: f64, resonance_q: f64) -> Result<Self> {
        let sink = Sink::create(engine, gain)?;
        let filter = Filter::create(engine, cutoff_frequency, resonance_q)?;
        Ok(Self {
            processor: None,
            filter,
            sink,
            topology: None,
        })
    }

    /// Attach a processor; it is not wired until [`rewire`](Self::rewire)
    ///
    /// Returns the previously attached processor, which the caller must
    /// release.
    pub fn attach_processor(&mut self, processor: Processor) -> Option<Processor> {
        self.topology = None;
        self.processor.replace(processor)
    }

    /// Disconnect and destroy the processor
    ///
    /// The filter is disconnected too, leaving no edge into the sink.
    pub fn detach_processor(&mut self, engine: &mut dyn AudioEngine) -> Result<bool> {
        let Some(processor) = self.processor.take() else {
            return Ok(false);
        };
        self.topology = None;

        let filter_result = self.filter.disconnect(engine);
        processor.release(engine)?;
        filter_result?;
        Ok(true)
    }

    /// Route Processor -> (Filter?) -> Sink
    ///
    /// Every outgoing edge of Processor and Filter is dropped first, so the
    /// result depends only on `filter_enabled`. Without a processor there is
    /// nothing to wire and the call does nothing.
    pub fn rewire(&mut self, engine: &mut dyn AudioEngine, filter_enabled: bool) -> Result<()> {
        let Some(processor) = self.processor.as_ref() else {
            debug!("rewire skipped: no processor attached");
            return Ok(());
        };

        processor.disconnect(engine)?;
        self.filter.disconnect(engine)?;
        self.topology = None;

        let topology = Topology::for_filter(filter_enabled);
        match topology {
            Topology::Direct => processor.connect(engine, &self.sink)?,
            Topology::Filtered => {
                processor.connect(engine, &self.filter)?;
                self.filter.connect(engine, &self.sink)?;
            }
        }

        self.topology = Some(topology);
        debug!(%topology, "pipeline rewired");
        Ok(())
    }

    /// Current shape, `None` while no processor is wired
    pub fn topology(&self) -> Option<Topology> {
        self.topology
    }

    /// Current role-level edges
    pub fn edges(&self) -> Vec<(StageRole, StageRole)> {
        self.topology.map(|t| t.edges()).unwrap_or_default()
    }

    pub fn processor(&self) -> Option<&Processor> {
        self.processor.as_ref()
    }

    pub fn processor_mut(&mut self) -> Option<&mut Processor> {
        self.processor.as_mut()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut Sink {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioBuffer, RenderEngine};
    use std::sync::Arc;

    fn graph_with_processor(engine: &mut RenderEngine) -> PipelineGraph {
        let mut graph = PipelineGraph::new(engine, 1.0, 350.0, 1.0).unwrap();
        let buffer = Arc::new(AudioBuffer::new(1000, 1, 1000));
        let processor = Processor::create(engine, buffer, 1.0).unwrap();
        assert!(graph.attach_processor(processor).is_none());
        graph
    }

    #[test]
    fn test_rewire_without_processor_is_noop() {
        let mut engine = RenderEngine::new(1000, 1);
        let mut graph = PipelineGraph::new(&mut engine, 1.0, 350.0, 1.0).unwrap();

        graph.rewire(&mut engine, true).unwrap();
        assert_eq!(graph.topology(), None);
        assert!(engine.edges().is_empty());
    }

    #[test]
    fn test_rewire_shapes_match_engine_edges() {
        let mut engine = RenderEngine::new(1000, 1);
        let mut graph = graph_with_processor(&mut engine);
        let p = graph.processor().unwrap().node();
        let f = graph.filter().node();
        let s = graph.sink().node();

        graph.rewire(&mut engine, false).unwrap();
        assert_eq!(graph.topology(), Some(Topology::Direct));
        assert_eq!(engine.edges(), vec![(p, s)]);

        graph.rewire(&mut engine, true).unwrap();
        assert_eq!(graph.topology(), Some(Topology::Filtered));
        let mut edges = engine.edges();
        edges.sort();
        let mut expected = vec![(p, f), (f, s)];
        expected.sort();
        assert_eq!(edges, expected);
    }

    #[test]
    fn test_sink_has_one_incoming_edge_for_any_sequence() {
        let mut engine = RenderEngine::new(1000, 1);
        let mut graph = graph_with_processor(&mut engine);
        let sink = graph.sink().node();

        for flag in [true, true, false, false, true, false, true] {
            graph.rewire(&mut engine, flag).unwrap();
            assert_eq!(engine.incoming(sink), 1);
            assert_eq!(graph.topology(), Some(Topology::for_filter(flag)));
            assert_eq!(engine.edges().len(), graph.edges().len());
        }
    }

    #[test]
    fn test_rewire_is_idempotent() {
        let mut engine = RenderEngine::new(1000, 1);
        let mut graph = graph_with_processor(&mut engine);

        graph.rewire(&mut engine, true).unwrap();
        let once = engine.edges();
        graph.rewire(&mut engine, true).unwrap();
        assert_eq!(engine.edges(), once);
    }

    #[test]
    fn test_detach_leaves_sink_unfed() {
        let mut engine = RenderEngine::new(1000, 1);
        let mut graph = graph_with_processor(&mut engine);
        graph.rewire(&mut engine, true).unwrap();

        assert!(graph.detach_processor(&mut engine).unwrap());
        assert!(engine.edges().is_empty());
        assert_eq!(graph.topology(), None);
        assert!(graph.processor().is_none());
        assert!(!graph.detach_processor(&mut engine).unwrap());
        // Filter and sink survive for the next playback.
        assert_eq!(engine.node_count(), 2);
    }

    #[test]
    fn test_topology_display() {
        assert_eq!(Topology::Direct.to_string(), "Processor->Sink");
        assert_eq!(Topology::Filtered.to_string(), "Processor->Filter->Sink");
    }
}
