use std::collections::VecDeque;
use std::time::Duration;

use tracing::trace;

const HISTORY_LIMIT: Duration = Duration::from_millis(150);

/// Tracks one axis of a touch gesture to estimate its release velocity.
#[derive(Debug, Clone)]
pub struct SwipeTracker {
    history: VecDeque<Event>,
    pos: f64,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    delta: f64,
    timestamp: Duration,
}

impl SwipeTracker {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            pos: 0.,
        }
    }

    /// Pushes a new reading into the tracker.
    pub fn push(&mut self, delta: f64, timestamp: Duration) {
        // For the events that we care about, timestamps should always increase
        // monotonically.
        if let Some(last) = self.history.back() {
            if timestamp < last.timestamp {
                trace!(
                    "ignoring event with timestamp {timestamp:?} earlier than last {:?}",
                    last.timestamp
                );
                return;
            }
        }

        self.history.push_back(Event { delta, timestamp });
        self.pos += delta;

        self.trim_history();
    }

    /// Current position, the sum of all deltas so far.
    pub fn pos(&self) -> f64 {
        self.pos
    }

    /// Velocity over the recent history, in units per second.
    pub fn velocity(&self) -> f64 {
        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return 0.;
        };

        let total_time = (last.timestamp - first.timestamp).as_secs_f64();
        if total_time == 0. {
            return 0.;
        }

        let total_delta = self.history.iter().map(|event| event.delta).sum::<f64>();
        total_delta / total_time
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.pos = 0.;
    }

    fn trim_history(&mut self) {
        let _span = tracy_client::span!("SwipeTracker::trim_history");

        let Some(&last) = self.history.back() else {
            return;
        };

        while let Some(first) = self.history.front() {
            if last.timestamp <= first.timestamp + HISTORY_LIMIT {
                break;
            }

            let _ = self.history.pop_front();
        }
    }
}

impl Default for SwipeTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Detects when a drag slows down enough, for long enough, to count as a pause.
#[derive(Debug, Clone)]
pub struct MotionPauseDetector {
    /// Speed below which the motion may be paused, in px/ms.
    speed_threshold: f64,
    delay: Duration,
    last: Option<(f64, Duration)>,
    slow_since: Option<Duration>,
    is_paused: bool,
    disallow_pause: bool,
}

impl MotionPauseDetector {
    pub fn new(speed_threshold: f64, delay: Duration) -> Self {
        Self {
            speed_threshold,
            delay,
            last: None,
            slow_since: None,
            is_paused: false,
            disallow_pause: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// While disallowed, the detector reports no pause regardless of speed.
    pub fn set_disallow_pause(&mut self, disallow: bool) -> Option<bool> {
        self.disallow_pause = disallow;
        if disallow {
            self.slow_since = None;
            self.update_paused(false)
        } else {
            None
        }
    }

    /// Adds a position sample and returns the new pause state if it changed.
    pub fn add_position(&mut self, pos: f64, time: Duration) -> Option<bool> {
        let Some((last_pos, last_time)) = self.last.replace((pos, time)) else {
            return None;
        };
        if time <= last_time || self.disallow_pause {
            return None;
        }

        let elapsed_ms = (time - last_time).as_secs_f64() * 1000.;
        let speed = (pos - last_pos).abs() / elapsed_ms;

        if speed >= self.speed_threshold {
            self.slow_since = None;
            return self.update_paused(false);
        }

        let slow_since = *self.slow_since.get_or_insert(last_time);
        if time.saturating_sub(slow_since) >= self.delay {
            self.update_paused(true)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.last = None;
        self.slow_since = None;
        self.is_paused = false;
        self.disallow_pause = false;
    }

    fn update_paused(&mut self, paused: bool) -> Option<bool> {
        if self.is_paused == paused {
            return None;
        }
        self.is_paused = paused;
        Some(paused)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn velocity_uses_recent_history() {
        let mut tracker = SwipeTracker::new();
        tracker.push(-100., ms(0));
        // Falls out of the history window.
        tracker.push(-10., ms(200));
        tracker.push(-10., ms(210));
        tracker.push(-10., ms(220));

        assert_abs_diff_eq!(tracker.pos(), -130.);
        assert_abs_diff_eq!(tracker.velocity(), -30. / 0.02);
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let mut tracker = SwipeTracker::new();
        tracker.push(5., ms(10));
        tracker.push(5., ms(5));
        assert_abs_diff_eq!(tracker.pos(), 5.);
        assert_abs_diff_eq!(tracker.velocity(), 0.);
    }

    #[test]
    fn pause_needs_slow_motion_for_the_delay() {
        let mut detector = MotionPauseDetector::new(0.2, ms(100));
        assert_eq!(detector.add_position(0., ms(0)), None);
        // Fast.
        assert_eq!(detector.add_position(-50., ms(10)), None);
        // Slow, but not for long enough yet.
        assert_eq!(detector.add_position(-51., ms(60)), None);
        assert_eq!(detector.add_position(-52., ms(120)), Some(true));
        assert!(detector.is_paused());
        // Moving again.
        assert_eq!(detector.add_position(-100., ms(130)), Some(false));
    }

    #[test]
    fn disallowed_pause_reports_unpaused() {
        let mut detector = MotionPauseDetector::new(0.2, ms(10));
        detector.add_position(0., ms(0));
        assert_eq!(detector.add_position(0., ms(20)), Some(true));
        assert_eq!(detector.set_disallow_pause(true), Some(false));
        assert_eq!(detector.add_position(0., ms(100)), None);
        assert!(!detector.is_paused());
    }
}
