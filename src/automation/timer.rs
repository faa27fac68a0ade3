//! Cooperative periodic timers
//!
//! Registration returns a [`TimerId`] that must be cleared to release the
//! timer. Nothing fires on its own: the owner calls [`TimerQueue::fire_due`]
//! from its loop and dispatches the returned ids.

use std::collections::BTreeMap;
use std::time::Duration;

/// Smallest accepted period; a zero period would fire on every poll
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a registered interval timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy)]
struct IntervalTimer {
    period: Duration,
    next_due: Duration,
}

/// Registry of interval timers
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    timers: BTreeMap<TimerId, IntervalTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer firing every `period`, first at `now + period`
    pub fn set_interval(&mut self, now: Duration, period: Duration) -> TimerId {
        let period = period.max(MIN_PERIOD);
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            IntervalTimer {
                period,
                next_due: now + period,
            },
        );
        id
    }

    /// Release a timer; returns false if it was not registered
    pub fn clear(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Number of registered timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Earliest time any timer is due
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.values().map(|t| t.next_due).min()
    }

    /// Collect every timer due at `now` and schedule its next firing
    ///
    /// A timer that missed several periods fires once; its next deadline is
    /// re-anchored one period after `now`.
    pub fn fire_due(&mut self, now: Duration) -> Vec<TimerId> {
        let mut fired = Vec::new();
        for (id, timer) in self.timers.iter_mut() {
            if timer.next_due > now {
                continue;
            }
            fired.push(*id);
            timer.next_due += timer.period;
            if timer.next_due <= now {
                timer.next_due = now + timer.period;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_on_period() {
        let mut timers = TimerQueue::new();
        let id = timers.set_interval(ms(0), ms(50));

        assert!(timers.fire_due(ms(49)).is_empty());
        assert_eq!(timers.fire_due(ms(50)), vec![id]);
        assert!(timers.fire_due(ms(60)).is_empty());
        assert_eq!(timers.fire_due(ms(100)), vec![id]);
    }

    #[test]
    fn test_late_poll_coalesces_missed_periods() {
        let mut timers = TimerQueue::new();
        let id = timers.set_interval(ms(0), ms(50));

        assert_eq!(timers.fire_due(ms(230)), vec![id]);
        assert_eq!(timers.next_deadline(), Some(ms(280)));
        assert!(timers.fire_due(ms(250)).is_empty());
    }

    #[test]
    fn test_clear_releases_once() {
        let mut timers = TimerQueue::new();
        let id = timers.set_interval(ms(0), ms(50));
        assert!(timers.is_active(id));
        assert!(timers.clear(id));
        assert!(!timers.clear(id));
        assert!(timers.is_empty());
        assert!(timers.fire_due(ms(500)).is_empty());
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let mut timers = TimerQueue::new();
        timers.set_interval(ms(10), Duration::ZERO);
        assert_eq!(timers.next_deadline(), Some(ms(11)));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut timers = TimerQueue::new();
        let a = timers.set_interval(ms(0), ms(10));
        timers.clear(a);
        let b = timers.set_interval(ms(0), ms(10));
        assert_ne!(a, b);
        assert_eq!(timers.len(), 1);
    }
}
