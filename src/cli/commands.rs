//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::automation::{TempoRamp, TimerQueue};
use crate::capture::WavCapture;
use crate::engine::{
    encode_wav, generate_test_tone, import_audio, Clock, ManualClock, RenderEngine, WavDecoder,
};
use crate::error::{RampdeckError, Result};
use crate::session::{ParamKind, PlayOutcome, PlaybackSession, SessionConfig};

/// Control overrides taken from the command line, still as raw text
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub config: Option<PathBuf>,
    pub tempo: Option<String>,
    pub gain: Option<String>,
    pub filter: bool,
    pub cutoff: Option<String>,
    pub q: Option<String>,
    pub max_seconds: Option<f64>,
}

/// What a render produced
#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub path: PathBuf,
    pub frames: u64,
    pub duration_secs: f64,
    pub final_tempo: f64,
    pub sha256: String,
    /// True when playback ran to the end of the input
    pub reached_end: bool,
}

/// Play `input` through an offline session and write the capture to `output_dir`.
///
/// Time advances by exactly one block per render, so the ramp follows the
/// audio rather than the wall clock.
pub fn render_file(input: &Path, output_dir: &Path, options: &RenderOptions) -> Result<RenderSummary> {
    let limit = match options.max_seconds {
        Some(seconds) => match Duration::try_from_secs_f64(seconds) {
            Ok(limit) if !limit.is_zero() => Some(limit),
            _ => {
                return Err(RampdeckError::InvalidParameter {
                    param: "max_seconds".to_string(),
                    value: seconds.to_string(),
                    expected: "a positive number of seconds".to_string(),
                })
            }
        },
        None => None,
    };
    let config = match &options.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let buffer = import_audio(&WavDecoder, input)?;
    info!(
        "Rendering {} ({:.2}s, {} ch, {} Hz)",
        input.display(),
        buffer.duration_secs(),
        buffer.channels(),
        buffer.sample_rate()
    );

    let sample_rate = buffer.sample_rate();
    let engine = RenderEngine::new(sample_rate, buffer.channels());
    let capture = WavCapture::new(config.capture.clone());
    let clock = ManualClock::new();
    let mut session = PlaybackSession::new(engine, capture, Box::new(clock.clone()), config)?;

    let overrides = [
        (ParamKind::Tempo, &options.tempo),
        (ParamKind::Gain, &options.gain),
        (ParamKind::CutoffFrequency, &options.cutoff),
        (ParamKind::ResonanceQ, &options.q),
    ];
    for (kind, raw) in overrides {
        if let Some(raw) = raw {
            session.set_param(kind, kind.parse(raw)?)?;
        }
    }
    if options.filter {
        session.set_filter_enabled(true)?;
    }

    session.load(buffer)?;
    match session.play()? {
        PlayOutcome::Started => {}
        PlayOutcome::StartedWithoutCapture(e) | PlayOutcome::Ignored(e) => return Err(e),
    }

    let block_size = session.config().block_size;
    let block_duration = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);
    let mut reached_end = false;

    loop {
        session.engine_mut().render(block_size);
        clock.advance(block_duration);

        let report = session.poll()?;
        if let Some(tick) = report.ramp_tick {
            debug!(tempo = tick.value, progress = tick.progress, "ramp tick");
        }
        if report.stopped {
            reached_end = report.ended;
            break;
        }
        if limit.is_some_and(|limit| session.now() >= limit) {
            info!("Stopping at the {:.1}s limit", session.now().as_secs_f64());
            session.stop()?;
            break;
        }
    }

    let final_tempo = session.settings().tempo;
    let artifact = session.take_artifact().ok_or_else(|| RampdeckError::CaptureFailed {
        reason: "playback finished without an artifact".to_string(),
    })?;
    let path = artifact.write_to(output_dir)?;

    Ok(RenderSummary {
        path,
        frames: artifact.frames,
        duration_secs: artifact.duration_secs(),
        final_tempo,
        sha256: artifact.sha256_hex(),
        reached_end,
    })
}

/// Render a file and print the result.
pub fn render(input: &Path, output_dir: &Path, options: &RenderOptions) -> Result<()> {
    let summary = render_file(input, output_dir, options)?;

    println!("Captured: {}", summary.path.display());
    println!("Duration: {:.2}s ({} frames)", summary.duration_secs, summary.frames);
    println!("Final tempo: {}", ParamKind::Tempo.format(summary.final_tempo));
    println!("SHA-256: {}", summary.sha256);
    if !summary.reached_end {
        warn!("Playback was cut short before the end of the input");
    }

    Ok(())
}

/// One row of a ramp preview
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewRow {
    pub elapsed_ms: u64,
    pub progress: f64,
    pub tempo: f64,
}

/// Run a ramp against a manual clock and return every tick
pub fn ramp_preview_rows(initial: f64, factor: f64, window_ms: u64, tick_ms: u64) -> Vec<PreviewRow> {
    let clock = ManualClock::new();
    let mut timers = TimerQueue::new();
    let tick_interval = Duration::from_millis(tick_ms.max(1));
    let mut ramp = TempoRamp::start(
        &mut timers,
        Duration::ZERO,
        initial,
        initial * factor,
        Duration::from_millis(window_ms),
        tick_interval,
    );

    let mut rows = Vec::new();
    while ramp.is_active() {
        clock.advance(tick_interval);
        let now = clock.now();
        for id in timers.fire_due(now) {
            if ramp.timer() != Some(id) {
                continue;
            }
            if let Some(tick) = ramp.tick(now, &mut timers) {
                rows.push(PreviewRow {
                    elapsed_ms: now.as_millis() as u64,
                    progress: tick.progress,
                    tempo: tick.value,
                });
            }
        }
    }
    rows
}

/// Print the tempo sequence of a ramp.
pub fn ramp_preview(initial: &str, factor: f64, window_ms: u64, tick_ms: u64, every: u64) -> Result<()> {
    let initial = ParamKind::Tempo.parse(initial)?;
    if !factor.is_finite() || factor <= 0.0 {
        return Err(RampdeckError::InvalidParameter {
            param: "factor".to_string(),
            value: factor.to_string(),
            expected: "a finite number > 0".to_string(),
        });
    }

    let rows = ramp_preview_rows(initial, factor, window_ms, tick_ms);
    let every = every.max(1) as usize;

    println!("{:>10}  {:>8}  {:>8}", "time (ms)", "progress", "tempo");
    println!("{:-<30}", "");
    for (i, row) in rows.iter().enumerate() {
        if i % every == 0 || i + 1 == rows.len() {
            println!(
                "{:>10}  {:>7.1}%  {:>8}",
                row.elapsed_ms,
                row.progress * 100.0,
                ParamKind::Tempo.format(row.tempo)
            );
        }
    }
    println!("{} ticks", rows.len());

    Ok(())
}

/// Write a sine test tone.
pub fn tone(output: &Path, frequency: f32, duration: f32, sample_rate: u32) -> Result<()> {
    if sample_rate == 0 || duration.is_nan() || duration <= 0.0 {
        return Err(RampdeckError::InvalidParameter {
            param: "tone".to_string(),
            value: format!("{}s at {} Hz", duration, sample_rate),
            expected: "a positive duration and sample rate".to_string(),
        });
    }

    let buffer = generate_test_tone(frequency, duration, sample_rate);
    let bytes = encode_wav(&buffer)?;
    std::fs::write(output, bytes)?;

    println!("Tone written: {} ({} Hz, {:.2}s)", output.display(), frequency, duration);
    Ok(())
}

/// Print or write the default config.
pub fn config(output: Option<&Path>) -> Result<()> {
    let json = SessionConfig::default().to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!("Config written: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_preview_reaches_target_once() {
        let rows = ramp_preview_rows(1.0, 1.25, 1_000, 50);
        assert_eq!(rows.len(), 20);
        let last = rows.last().unwrap();
        assert_eq!(last.tempo, 1.25);
        assert_eq!(last.progress, 1.0);
        assert_eq!(rows.iter().filter(|r| r.progress >= 1.0).count(), 1);
        assert_relative_eq!(rows[9].tempo, 1.125);
    }

    #[test]
    fn test_preview_zero_window() {
        let rows = ramp_preview_rows(2.0, 0.5, 0, 50);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tempo, 1.0);
    }

    #[test]
    fn test_tone_writes_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        tone(&path, 220.0, 0.1, 8000).unwrap();

        let buffer = import_audio(&WavDecoder, &path).unwrap();
        assert_eq!(buffer.len(), 800);
        assert!(tone(&path, 220.0, 0.0, 8000).is_err());
    }

    #[test]
    fn test_config_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rampdeck.json");
        config(Some(&path)).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), SessionConfig::default());
    }
}
