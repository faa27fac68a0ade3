//! Playback session state machine
//!
//! ```text
//! Idle --load--> Loaded --play--> Playing
//!                  ^                 |
//!                  +---stop/ended----+
//! ```
//!
//! `play` builds in the order Processor, routing, ramp, capture; `stop` tears
//! down in the order ramp, capture, Processor so the capture is finalized
//! with every block the Sink produced.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::automation::{RampState, RampTick, TempoRamp, TimerQueue};
use crate::capture::{Artifact, CaptureFacility, CaptureSession, CaptureStats};
use crate::engine::{AudioBuffer, AudioEngine, Clock, Decoder};
use crate::error::{RampdeckError, Result};
use crate::pipeline::{PipelineGraph, Processor, Stage, StageRole, Topology};
use crate::session::config::SessionConfig;
use crate::session::controls::{ControlSettings, ControlState, ParamKind};
use crate::session::SessionState;

/// Result of a [`PlaybackSession::play`] request
#[derive(Debug)]
pub enum PlayOutcome {
    /// Playing with the capture recording
    Started,
    /// Playing, but the capture could not be opened
    StartedWithoutCapture(RampdeckError),
    /// Nothing happened; the session was not in `Loaded`, or the ramp
    /// target for the current tempo is out of range
    Ignored(RampdeckError),
}

impl PlayOutcome {
    pub fn is_started(&self) -> bool {
        !matches!(self, PlayOutcome::Ignored(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PlayOutcome::StartedWithoutCapture(_))
    }
}

/// What one [`PlaybackSession::poll`] did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollReport {
    /// Last ramp tick applied during this poll
    pub ramp_tick: Option<RampTick>,
    /// The Processor reported end of stream
    pub ended: bool,
    /// The session left `Playing` during this poll
    pub stopped: bool,
}

/// Owner of one pipeline and its playback lifecycle
pub struct PlaybackSession<E: AudioEngine, C: CaptureFacility> {
    engine: E,
    capture: C,
    clock: Box<dyn Clock>,
    config: SessionConfig,
    settings: ControlSettings,
    graph: PipelineGraph,
    timers: TimerQueue,
    state: SessionState,
    buffer: Option<Arc<AudioBuffer>>,
    ramp: Option<TempoRamp>,
    tempo_locked: bool,
    recording: Option<CaptureSession>,
    artifact: Option<Artifact>,
}

impl<E: AudioEngine, C: CaptureFacility> PlaybackSession<E, C> {
    /// Create a session; the Filter and Sink are built once here
    pub fn new(mut engine: E, capture: C, clock: Box<dyn Clock>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let settings = config.controls.clone();
        let graph = PipelineGraph::new(
            &mut engine,
            settings.gain,
            settings.cutoff_frequency,
            settings.resonance_q,
        )?;

        debug!(
            sample_rate = engine.sample_rate(),
            channels = engine.channels(),
            "playback session created"
        );
        Ok(Self {
            engine,
            capture,
            clock,
            config,
            settings,
            graph,
            timers: TimerQueue::new(),
            state: SessionState::Idle,
            buffer: None,
            ramp: None,
            tempo_locked: false,
            recording: None,
            artifact: None,
        })
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Replace the buffer, stopping any playback first
    ///
    /// The new buffer is applied even when teardown reported an error; that
    /// error is returned afterwards.
    pub fn load(&mut self, buffer: AudioBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Err(RampdeckError::EmptyAudio);
        }

        let stopped = self.stop();
        info!(
            channels = buffer.channels(),
            sample_rate = buffer.sample_rate(),
            duration_secs = buffer.duration_secs(),
            "buffer loaded"
        );
        self.buffer = Some(Arc::new(buffer));
        self.artifact = None;
        self.state = SessionState::Loaded;
        stopped
    }

    /// Decode `bytes` and load the result
    ///
    /// A decode failure leaves the session exactly as it was.
    pub fn load_encoded<D: Decoder + ?Sized>(&mut self, decoder: &D, bytes: &[u8]) -> Result<()> {
        let buffer = decoder.decode(bytes)?;
        self.load(buffer)
    }

    /// Start playback of the loaded buffer
    ///
    /// Requests outside `Loaded`, or whose ramp target would not be a valid
    /// tempo, are reported as [`PlayOutcome::Ignored`].
    /// An unavailable capture does not prevent playback. Only engine faults
    /// are returned as `Err`, after rolling back to `Loaded`.
    pub fn play(&mut self) -> Result<PlayOutcome> {
        let buffer = match (self.state, &self.buffer) {
            (SessionState::Loaded, Some(buffer)) => Arc::clone(buffer),
            (state, _) => {
                debug!(%state, "play ignored");
                return Ok(PlayOutcome::Ignored(RampdeckError::InvalidTransition {
                    operation: "play",
                    state,
                }));
            }
        };
        let initial = self.settings.tempo;
        let target = match ParamKind::Tempo.validate(initial * self.config.ramp_factor) {
            Ok(target) => target,
            Err(e) => {
                warn!(tempo = initial, error = %e, "play ignored, ramp target out of range");
                return Ok(PlayOutcome::Ignored(e));
            }
        };
        let now = self.clock.now();

        let processor = Processor::create(&mut self.engine, buffer, self.settings.tempo)?;
        let node = processor.node();
        if let Some(stale) = self.graph.attach_processor(processor) {
            warn!(node = %stale.node(), "releasing a processor left over from a previous playback");
            if let Err(e) = stale.release(&mut self.engine) {
                self.abort_play();
                return Err(e);
            }
        }
        if let Err(e) = self.graph.rewire(&mut self.engine, self.settings.filter_enabled) {
            self.abort_play();
            return Err(e);
        }
        debug!(%node, "watching processor for end of stream");

        self.ramp = Some(TempoRamp::start(
            &mut self.timers,
            now,
            initial,
            target,
            self.config.ramp_window(),
            self.config.tick_interval(),
        ));
        self.tempo_locked = true;

        let outcome = match self.open_capture(now) {
            Ok(recording) => {
                self.recording = Some(recording);
                PlayOutcome::Started
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "playing without capture");
                PlayOutcome::StartedWithoutCapture(e)
            }
            Err(e) => {
                self.abort_play();
                return Err(e);
            }
        };

        self.state = SessionState::Playing;
        info!(
            tempo = initial,
            ramp_target = target,
            topology = %Topology::for_filter(self.settings.filter_enabled),
            recording = self.recording.is_some(),
            "playback started"
        );
        Ok(outcome)
    }

    /// Stop playback; does nothing unless `Playing`
    ///
    /// Every teardown step runs even if an earlier one fails; the first
    /// error is returned once the session is back in `Loaded`.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Playing {
            return Ok(());
        }

        let mut first_error: Option<RampdeckError> = None;

        if let Some(mut ramp) = self.ramp.take() {
            ramp.cancel(&mut self.timers);
        }
        self.tempo_locked = false;

        if let Some(recording) = self.recording.take() {
            match recording.close(&mut self.capture) {
                Ok(artifact) => {
                    info!(
                        filename = %artifact.filename,
                        bytes = artifact.len(),
                        duration_secs = artifact.duration_secs(),
                        "capture finalized"
                    );
                    self.artifact = Some(artifact);
                }
                Err(e) => {
                    warn!(error = %e, "capture could not be finalized");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Err(e) = self.graph.detach_processor(&mut self.engine) {
            warn!(error = %e, "processor teardown failed");
            first_error.get_or_insert(e);
        }

        self.state = SessionState::Loaded;
        info!("playback stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run one turn of the cooperative loop
    ///
    /// Applies due ramp ticks, moves monitor audio into the capture and
    /// stops the session when the Processor reached end of stream.
    pub fn poll(&mut self) -> Result<PollReport> {
        let now = self.clock.now();
        let mut report = PollReport::default();

        for id in self.timers.fire_due(now) {
            let Some(ramp) = self.ramp.as_mut() else {
                continue;
            };
            if ramp.timer() != Some(id) {
                continue;
            }
            if let Some(tick) = ramp.tick(now, &mut self.timers) {
                report.ramp_tick = Some(tick);
            }
        }
        if let Some(tick) = report.ramp_tick {
            self.apply_ramp_tick(tick)?;
        }

        if self.recording.is_some() {
            self.capture.pump()?;
        }

        let ended = self.engine.drain_ended();
        let current = self.graph.processor().map(|p| p.node());
        if self.state == SessionState::Playing && current.is_some_and(|node| ended.contains(&node)) {
            info!("end of stream reached");
            report.ended = true;
            self.stop()?;
            report.stopped = true;
        }

        Ok(report)
    }

    // ========================================================================
    // Controls
    // ========================================================================

    /// Route through the filter or around it; rewires at once while playing
    pub fn set_filter_enabled(&mut self, enabled: bool) -> Result<()> {
        self.settings.filter_enabled = enabled;
        if self.state == SessionState::Playing {
            self.graph.rewire(&mut self.engine, enabled)?;
        }
        Ok(())
    }

    /// Set the playback tempo
    ///
    /// Accepted during the ramp too; the next ramp tick overrides it.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        let tempo = ParamKind::Tempo.validate(tempo)?;
        if self.tempo_locked {
            debug!(tempo, "tempo edited while the ramp is running");
        }
        if let Some(processor) = self.graph.processor_mut() {
            processor.set_tempo(&mut self.engine, tempo)?;
        }
        self.settings.tempo = tempo;
        Ok(())
    }

    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        let gain = ParamKind::Gain.validate(gain)?;
        self.graph.sink_mut().set_gain(&mut self.engine, gain)?;
        self.settings.gain = gain;
        Ok(())
    }

    /// Set the filter cutoff; kept while the filter is bypassed
    pub fn set_filter_frequency(&mut self, hz: f64) -> Result<()> {
        let hz = ParamKind::CutoffFrequency.validate(hz)?;
        self.graph.filter_mut().set_cutoff_frequency(&mut self.engine, hz)?;
        self.settings.cutoff_frequency = hz;
        Ok(())
    }

    pub fn set_filter_q(&mut self, q: f64) -> Result<()> {
        let q = ParamKind::ResonanceQ.validate(q)?;
        self.graph.filter_mut().set_resonance_q(&mut self.engine, q)?;
        self.settings.resonance_q = q;
        Ok(())
    }

    /// Apply a value from its kind
    pub fn set_param(&mut self, kind: ParamKind, value: f64) -> Result<()> {
        match kind {
            ParamKind::Tempo => self.set_tempo(value),
            ParamKind::Gain => self.set_gain(value),
            ParamKind::CutoffFrequency => self.set_filter_frequency(value),
            ParamKind::ResonanceQ => self.set_filter_q(value),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    /// Enabled/disabled state for a control surface
    pub fn controls(&self) -> ControlState {
        ControlState {
            play_enabled: self.state == SessionState::Loaded,
            stop_enabled: self.state == SessionState::Playing,
            tempo_editable: !self.tempo_locked,
            filter_params_editable: self.settings.filter_enabled,
            recording: self.recording.is_some(),
        }
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Current wiring, `None` unless playing
    pub fn topology(&self) -> Option<Topology> {
        self.graph.topology()
    }

    pub fn edges(&self) -> Vec<(StageRole, StageRole)> {
        self.graph.edges()
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Artifact of the last finished playback
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn take_artifact(&mut self) -> Option<Artifact> {
        self.artifact.take()
    }

    pub fn ramp_state(&self) -> Option<&RampState> {
        self.ramp.as_ref().map(|r| r.state())
    }

    /// Number of timers registered by this session
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn recording_stats(&self) -> Option<CaptureStats> {
        self.recording.as_ref().map(|r| r.stats())
    }

    pub fn now(&self) -> std::time::Duration {
        self.clock.now()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable engine access for drivers that render blocks
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn open_capture(&mut self, now: std::time::Duration) -> Result<CaptureSession> {
        let stream = self.graph.sink().monitor_tap(&mut self.engine)?;
        let handle = stream.clone();
        CaptureSession::open(&mut self.capture, stream, now).map_err(|e| {
            // Nobody will drain this tap.
            handle.close();
            e
        })
    }

    fn apply_ramp_tick(&mut self, tick: RampTick) -> Result<()> {
        if let Some(processor) = self.graph.processor_mut() {
            processor.set_tempo(&mut self.engine, tick.value)?;
        }
        self.settings.tempo = tick.value;

        if tick.finished {
            self.ramp = None;
            self.tempo_locked = false;
            info!(tempo = tick.value, "tempo ramp complete");
        }
        Ok(())
    }

    /// Undo a partially built playback
    fn abort_play(&mut self) {
        if let Some(mut ramp) = self.ramp.take() {
            ramp.cancel(&mut self.timers);
        }
        self.tempo_locked = false;
        if let Err(e) = self.graph.detach_processor(&mut self.engine) {
            warn!(error = %e, "failed to release processor after aborted play");
        }
    }
}

impl<E: AudioEngine, C: CaptureFacility> Drop for PlaybackSession<E, C> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "teardown on drop failed");
        }
    }
}

impl<E: AudioEngine, C: CaptureFacility> fmt::Debug for PlaybackSession<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("topology", &self.graph.topology())
            .field("ramp", &self.ramp_state())
            .field("recording", &self.recording.is_some())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
