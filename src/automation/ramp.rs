//! Time-bounded linear tempo ramp
//!
//! Each tick recomputes the value from absolute elapsed time, so a late tick
//! lands on the correct fraction instead of accumulating per-tick steps.
//! A ramp runs once: after it finishes or is cancelled it stays inert.

use std::time::Duration;

use tracing::debug;

use crate::automation::timer::{TimerId, TimerQueue};

/// Snapshot of a ramp's parameters and its timer
#[derive(Debug, Clone, PartialEq)]
pub struct RampState {
    /// Clock reading when the ramp started
    pub started_at: Duration,
    pub initial: f64,
    pub target: f64,
    pub window: Duration,
    /// Present while the ramp is in progress
    pub timer: Option<TimerId>,
}

/// One evaluation of the ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampTick {
    pub value: f64,
    /// Fraction of the window elapsed, in `[0.0, 1.0]`
    pub progress: f64,
    /// True for the tick that reached the target
    pub finished: bool,
}

/// Linear interpolation of one parameter over a fixed window
#[derive(Debug)]
pub struct TempoRamp {
    state: RampState,
    ticks: u64,
}

impl TempoRamp {
    /// Start a ramp and register its tick timer
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use rampdeck::automation::{TempoRamp, TimerQueue};
    ///
    /// let mut timers = TimerQueue::new();
    /// let mut ramp = TempoRamp::start(
    ///     &mut timers,
    ///     Duration::ZERO,
    ///     1.0,
    ///     1.25,
    ///     Duration::from_secs(30),
    ///     Duration::from_millis(50),
    /// );
    /// let tick = ramp.tick(Duration::from_secs(15), &mut timers).unwrap();
    /// assert!((tick.value - 1.125).abs() < 1e-12);
    /// ```
    pub fn start(
        timers: &mut TimerQueue,
        now: Duration,
        initial: f64,
        target: f64,
        window: Duration,
        tick_interval: Duration,
    ) -> Self {
        let timer = timers.set_interval(now, tick_interval);
        debug!(initial, target, window_ms = window.as_millis() as u64, "tempo ramp started");
        Self {
            state: RampState {
                started_at: now,
                initial,
                target,
                window,
                timer: Some(timer),
            },
            ticks: 0,
        }
    }

    pub fn state(&self) -> &RampState {
        &self.state
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.state.timer
    }

    pub fn is_active(&self) -> bool {
        self.state.timer.is_some()
    }

    /// Number of ticks emitted so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fraction of the window elapsed at `now`
    pub fn progress_at(&self, now: Duration) -> f64 {
        if self.state.window.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.state.started_at);
        (elapsed.as_secs_f64() / self.state.window.as_secs_f64()).min(1.0)
    }

    /// Interpolated value at `now`; exactly `target` once the window elapsed
    pub fn value_at(&self, now: Duration) -> f64 {
        let progress = self.progress_at(now);
        if progress >= 1.0 {
            self.state.target
        } else {
            self.state.initial + (self.state.target - self.state.initial) * progress
        }
    }

    /// Evaluate the ramp for a fired tick
    ///
    /// Returns `None` once the ramp is no longer active. The tick reaching the
    /// end of the window releases the timer.
    pub fn tick(&mut self, now: Duration, timers: &mut TimerQueue) -> Option<RampTick> {
        let timer = self.state.timer?;

        let progress = self.progress_at(now);
        let value = self.value_at(now);
        let finished = progress >= 1.0;
        self.ticks += 1;

        if finished {
            timers.clear(timer);
            self.state.timer = None;
            debug!(value, ticks = self.ticks, "tempo ramp finished");
        }

        Some(RampTick {
            value,
            progress,
            finished,
        })
    }

    /// Stop early and release the timer; a no-op on an inactive ramp
    pub fn cancel(&mut self, timers: &mut TimerQueue) -> bool {
        match self.state.timer.take() {
            Some(timer) => {
                timers.clear(timer);
                debug!(ticks = self.ticks, "tempo ramp cancelled");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Drive a ramp with a poll schedule and collect every emitted tick
    fn run(ramp: &mut TempoRamp, timers: &mut TimerQueue, polls: &[u64]) -> Vec<RampTick> {
        let mut ticks = Vec::new();
        for &at in polls {
            for id in timers.fire_due(ms(at)) {
                if Some(id) == ramp.timer() {
                    ticks.extend(ramp.tick(ms(at), timers));
                }
            }
        }
        ticks
    }

    #[test]
    fn test_midpoint_value() {
        let mut timers = TimerQueue::new();
        let ramp = TempoRamp::start(&mut timers, ms(0), 1.0, 1.25, ms(30_000), ms(50));
        assert_relative_eq!(ramp.value_at(ms(15_000)), 1.125);
        assert_relative_eq!(ramp.progress_at(ms(15_000)), 0.5);
    }

    #[test]
    fn test_offset_start_time() {
        let mut timers = TimerQueue::new();
        let ramp = TempoRamp::start(&mut timers, ms(2_000), 2.0, 1.0, ms(1_000), ms(50));
        assert_relative_eq!(ramp.value_at(ms(1_000)), 2.0);
        assert_relative_eq!(ramp.value_at(ms(2_250)), 1.75);
        assert_eq!(ramp.value_at(ms(9_000)), 1.0);
    }

    #[test]
    fn test_sequence_is_monotonic_and_terminates_once() {
        let mut timers = TimerQueue::new();
        let mut ramp = TempoRamp::start(&mut timers, ms(0), 0.8, 1.0, ms(1_000), ms(50));

        // Jittery polling, well past the end of the window.
        let polls: Vec<u64> = (1..=80).map(|i| i * 17 + (i % 3) * 5).collect();
        let ticks = run(&mut ramp, &mut timers, &polls);

        assert!(!ticks.is_empty());
        for pair in ticks.windows(2) {
            assert!(pair[1].value >= pair[0].value);
            assert!(pair[1].progress >= pair[0].progress);
        }
        let finals: Vec<_> = ticks.iter().filter(|t| t.finished).collect();
        assert_eq!(finals.len(), 1);
        assert_eq!(ticks.last().unwrap().value, 1.0);
        assert!(ticks.last().unwrap().finished);
        assert!(ticks.iter().all(|t| (0.8..=1.0).contains(&t.value)));

        assert!(!ramp.is_active());
        assert!(timers.is_empty());
        assert!(ramp.tick(ms(5_000), &mut timers).is_none());
    }

    #[test]
    fn test_late_tick_lands_on_correct_fraction() {
        let mut timers = TimerQueue::new();
        let mut ramp = TempoRamp::start(&mut timers, ms(0), 1.0, 2.0, ms(1_000), ms(50));
        // Scheduler stalled for 400 ms; the single coalesced tick reads 0.4.
        let ticks = run(&mut ramp, &mut timers, &[400]);
        assert_eq!(ticks.len(), 1);
        assert_relative_eq!(ticks[0].value, 1.4);
    }

    #[test]
    fn test_zero_window_emits_single_final_tick() {
        let mut timers = TimerQueue::new();
        let mut ramp = TempoRamp::start(&mut timers, ms(0), 1.0, 1.25, Duration::ZERO, ms(50));
        let ticks = run(&mut ramp, &mut timers, &[50, 100, 150]);
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].progress, 1.0);
        assert_eq!(ticks[0].value, 1.25);
        assert!(ticks[0].finished);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancel_releases_timer_once() {
        let mut timers = TimerQueue::new();
        let mut ramp = TempoRamp::start(&mut timers, ms(0), 1.0, 1.25, ms(30_000), ms(50));
        assert_eq!(timers.len(), 1);

        assert!(ramp.cancel(&mut timers));
        assert!(timers.is_empty());
        assert!(!ramp.cancel(&mut timers));
        assert!(ramp.tick(ms(100), &mut timers).is_none());
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let mut timers = TimerQueue::new();
        let mut ramp = TempoRamp::start(&mut timers, ms(0), 1.0, 1.25, ms(100), ms(50));
        run(&mut ramp, &mut timers, &[50, 100]);
        assert!(!ramp.is_active());
        assert!(!ramp.cancel(&mut timers));
        assert_eq!(ramp.ticks(), 2);
    }
}
