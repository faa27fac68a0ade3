//! Signal chain
//!
//! Stage handles and the topology controller that wires them.

pub mod graph;
pub mod stage;

pub use graph::{PipelineGraph, Topology};
pub use stage::{Filter, Processor, Sink, Stage, StageRole};
