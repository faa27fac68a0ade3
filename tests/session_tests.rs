//! Session Tests
//!
//! Lifecycle guarantees of the playback session against real and
//! instrumented capture facilities.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use rampdeck::automation::RampTick;
use rampdeck::capture::{Artifact, CaptureConfig, CaptureFacility, CaptureId, ChunkCallback, WavCapture};
use rampdeck::engine::buffer::calculate_rms;
use rampdeck::engine::{
    generate_test_tone, AudioBuffer, Decoder, ManualClock, MonitorStream, RenderEngine, WavDecoder,
};
use rampdeck::pipeline::{Stage, Topology};
use rampdeck::{PlayOutcome, PlaybackSession, RampdeckError, Result, SessionConfig, SessionState};

const RATE: u32 = 8000;

/// Open/close counters shared between a test and the facility it hands over
#[derive(Debug, Clone, Default)]
struct Counters {
    opened: Rc<Cell<usize>>,
    closed: Rc<Cell<usize>>,
}

/// WAV capture that counts every open and close
struct CountingCapture {
    inner: WavCapture,
    counters: Counters,
}

impl CountingCapture {
    fn new(counters: Counters) -> Self {
        Self {
            inner: WavCapture::default(),
            counters,
        }
    }
}

impl CaptureFacility for CountingCapture {
    fn open(&mut self, stream: MonitorStream) -> Result<CaptureId> {
        let id = self.inner.open(stream)?;
        self.counters.opened.set(self.counters.opened.get() + 1);
        Ok(id)
    }

    fn on_chunk(&mut self, id: CaptureId, callback: ChunkCallback) -> Result<()> {
        self.inner.on_chunk(id, callback)
    }

    fn pump(&mut self) -> Result<()> {
        self.inner.pump()
    }

    fn close(&mut self, id: CaptureId) -> Result<Artifact> {
        self.counters.closed.set(self.counters.closed.get() + 1);
        self.inner.close(id)
    }

    fn open_count(&self) -> usize {
        self.inner.open_count()
    }
}

/// Facility whose recordings can never be finalized
#[derive(Default)]
struct BrokenCapture {
    open: Vec<CaptureId>,
}

impl CaptureFacility for BrokenCapture {
    fn open(&mut self, _stream: MonitorStream) -> Result<CaptureId> {
        let id = CaptureId::new();
        self.open.push(id);
        Ok(id)
    }

    fn on_chunk(&mut self, _id: CaptureId, _callback: ChunkCallback) -> Result<()> {
        Ok(())
    }

    fn pump(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self, id: CaptureId) -> Result<Artifact> {
        self.open.retain(|open| *open != id);
        Err(RampdeckError::CaptureFailed {
            reason: "encoder crashed".to_string(),
        })
    }

    fn open_count(&self) -> usize {
        self.open.len()
    }
}

fn new_session<C: CaptureFacility>(capture: C) -> (PlaybackSession<RenderEngine, C>, ManualClock) {
    let clock = ManualClock::new();
    let session = PlaybackSession::new(
        RenderEngine::new(RATE, 1),
        capture,
        Box::new(clock.clone()),
        SessionConfig::default(),
    )
    .unwrap();
    (session, clock)
}

fn dc_buffer(frames: usize, level: f32) -> AudioBuffer {
    AudioBuffer::from_planar(vec![vec![level; frames]], RATE).unwrap()
}

// === Capture Lifecycle ===

#[test]
fn test_close_once_per_open_on_every_stop_path() {
    let counters = Counters::default();
    let (mut session, _) = new_session(CountingCapture::new(counters.clone()));

    // Manual stop, twice.
    session.load(dc_buffer(4000, 0.5)).unwrap();
    session.play().unwrap();
    session.stop().unwrap();
    session.stop().unwrap();
    assert_eq!((counters.opened.get(), counters.closed.get()), (1, 1));

    // End of stream.
    session.play().unwrap();
    session.engine_mut().render(8000);
    assert!(session.poll().unwrap().ended);
    session.stop().unwrap();
    assert_eq!((counters.opened.get(), counters.closed.get()), (2, 2));

    // Reload mid-playback.
    session.play().unwrap();
    session.load(dc_buffer(2000, 0.5)).unwrap();
    assert_eq!((counters.opened.get(), counters.closed.get()), (3, 3));

    // Drop mid-playback.
    session.play().unwrap();
    drop(session);
    assert_eq!((counters.opened.get(), counters.closed.get()), (4, 4));
}

#[test]
fn test_capture_unavailable_plays_without_recording() {
    let (mut session, clock) = new_session(WavCapture::new(CaptureConfig {
        enabled: false,
        ..Default::default()
    }));
    session.load(dc_buffer(4000, 0.5)).unwrap();

    match session.play().unwrap() {
        PlayOutcome::StartedWithoutCapture(e) => {
            assert_eq!(e.error_code(), "CAPTURE_UNAVAILABLE");
            assert!(e.is_recoverable());
        }
        other => panic!("expected degraded start, got {:?}", other),
    }

    // The ramp still runs.
    clock.advance(Duration::from_millis(15_000));
    let tick = session.poll().unwrap().ramp_tick.unwrap();
    assert_abs_diff_eq!(tick.value, 1.125, epsilon = 1e-12);

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Loaded);
    assert!(session.artifact().is_none());
}

#[test]
fn test_failed_finalize_still_tears_down() {
    let (mut session, _) = new_session(BrokenCapture::default());
    session.load(dc_buffer(4000, 0.5)).unwrap();
    assert!(matches!(session.play().unwrap(), PlayOutcome::Started));

    let err = session.stop().unwrap_err();
    assert_eq!(err.error_code(), "CAPTURE_FAILED");
    assert_eq!(session.state(), SessionState::Loaded);
    assert_eq!(session.capture().open_count(), 0);
    assert_eq!(session.active_timers(), 0);
    assert_eq!(session.engine().node_count(), 2);

    // Nothing left to tear down.
    session.stop().unwrap();
}

// === Topology ===

#[test]
fn test_sink_fed_once_for_any_toggle_sequence() {
    let (mut session, _) = new_session(WavCapture::default());
    session.load(dc_buffer(4000, 0.5)).unwrap();
    session.play().unwrap();
    let sink = session.graph().sink().node();

    let flags = [true, false, false, true, true, false, true, false, true, true];
    for flag in flags {
        session.set_filter_enabled(flag).unwrap();
        assert_eq!(session.topology(), Some(Topology::for_filter(flag)));
        assert_eq!(session.engine().incoming(sink), 1);
        assert_eq!(session.engine().edges().len(), session.edges().len());
    }
}

#[test]
fn test_filter_attenuates_only_when_routed() {
    let tone = generate_test_tone(3000.0, 1.0, RATE);
    let (mut session, _) = new_session(WavCapture::default());
    session.set_filter_frequency(200.0).unwrap();
    session.load(tone).unwrap();
    session.play().unwrap();

    let direct = session.engine_mut().render(2000);
    session.set_filter_enabled(true).unwrap();
    session.engine_mut().render(500); // let the filter settle
    let filtered = session.engine_mut().render(2000);

    assert!(calculate_rms(&filtered) < calculate_rms(&direct) - 20.0);
}

// === Ramp ===

#[test]
fn test_ramp_sequence_over_regular_polls() {
    let (mut session, clock) = new_session(WavCapture::default());
    session.load(dc_buffer(4000, 0.5)).unwrap();
    session.play().unwrap();

    let mut ticks: Vec<RampTick> = Vec::new();
    for _ in 0..700 {
        clock.advance(Duration::from_millis(50));
        if let Some(tick) = session.poll().unwrap().ramp_tick {
            ticks.push(tick);
        }
    }

    assert_eq!(ticks.len(), 600);
    assert!(ticks.windows(2).all(|w| w[1].value >= w[0].value));
    assert!(ticks.iter().all(|t| (1.0..=1.25).contains(&t.value)));
    assert_eq!(ticks.iter().filter(|t| t.finished).count(), 1);
    assert!(ticks.last().unwrap().finished);
    assert_eq!(ticks.last().unwrap().value, 1.25);
    assert_abs_diff_eq!(ticks[299].value, 1.125, epsilon = 1e-12);
}

#[test]
fn test_stop_mid_ramp_releases_timer_immediately() {
    let (mut session, clock) = new_session(WavCapture::default());
    session.load(dc_buffer(4000, 0.5)).unwrap();
    session.play().unwrap();

    clock.advance(Duration::from_millis(1_025));
    session.poll().unwrap();
    session.stop().unwrap();
    assert_eq!(session.active_timers(), 0);

    clock.advance(Duration::from_millis(10_000));
    let report = session.poll().unwrap();
    assert!(report.ramp_tick.is_none());
}

// === Captured Audio ===

#[test]
fn test_capture_holds_gain_scaled_output() {
    let (mut session, _) = new_session(WavCapture::default());
    session.set_gain(0.5).unwrap();
    session.load(dc_buffer(1000, 0.5)).unwrap();
    session.play().unwrap();

    session.engine_mut().render(1000);
    session.stop().unwrap();

    let artifact = session.take_artifact().unwrap();
    assert_eq!(artifact.frames, 1000);
    let decoded = WavDecoder.decode(&artifact.data).unwrap();
    for sample in decoded.channel(0) {
        assert_abs_diff_eq!(*sample, 0.25, epsilon = 1e-3);
    }
    assert!(session.artifact().is_none());
}
