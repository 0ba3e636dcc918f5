//! Time-driven animations for the window and recents transitions.
//!
//! Animations read the current time from a shared [`Clock`], so tests can drive them frame by
//! frame without sleeping.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use keyframe::functions::{EaseInOutQuad, EaseOutCubic, EaseOutQuad, Linear};
use keyframe::EasingFunction;

mod spring;
pub use spring::{Spring, SpringParams};

/// Shared, lazily sampled monotonic clock.
///
/// The time is sampled once and then stays fixed until [`Clock::clear`], so that every
/// animation advanced during one frame sees the same instant.
#[derive(Debug, Clone)]
pub struct Clock {
    inner: Rc<RefCell<LazyClock>>,
}

#[derive(Debug)]
struct LazyClock {
    start: Instant,
    time: Option<Duration>,
}

impl Clock {
    pub fn with_time(time: Duration) -> Self {
        let clock = Self::default();
        clock.inner.borrow_mut().time = Some(time);
        clock
    }

    pub fn now(&self) -> Duration {
        let mut inner = self.inner.borrow_mut();
        let start = inner.start;
        *inner.time.get_or_insert_with(|| start.elapsed())
    }

    /// Pins the clock to `time` until the next [`Clock::clear`].
    pub fn set_time(&self, time: Duration) {
        self.inner.borrow_mut().time = Some(time);
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().time = None;
    }

    /// The instant [`Clock::now`] counts from. Other threads stamp events with
    /// `epoch.elapsed()` to land on the same timeline.
    pub fn epoch(&self) -> Instant {
        self.inner.borrow().start
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(LazyClock {
                start: Instant::now(),
                time: None,
            })),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Linear,
    Decelerate,
    EaseOutCubic,
    /// Overshoots the target by a tension-scaled amount, then settles back.
    Overshoot(f64),
}

impl Curve {
    pub fn y(self, x: f64) -> f64 {
        match self {
            Curve::Linear => Linear.y(x),
            Curve::Decelerate => EaseOutQuad.y(x),
            Curve::EaseOutCubic => EaseOutCubic.y(x),
            Curve::Overshoot(tension) => Overshoot { tension }.y(x),
        }
    }
}

/// Tension based overshoot, `(t - 1)^2 * ((tension + 1) * (t - 1) + tension) + 1`.
#[derive(Debug, Clone, Copy)]
struct Overshoot {
    tension: f64,
}

impl EasingFunction for Overshoot {
    fn y(&self, x: f64) -> f64 {
        let t = x - 1.;
        t * t * ((self.tension + 1.) * t + self.tension) + 1.
    }
}

#[derive(Debug, Clone)]
pub struct Animation {
    from: f64,
    to: f64,
    initial_velocity: f64,
    duration: Duration,
    start_time: Duration,
    clock: Clock,
    kind: Kind,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Easing {
        curve: Curve,
    },
    Spring(Spring),
    /// Decelerates to `peak` during the first `peak_fraction` of the duration, then eases to
    /// the target.
    OvershootSettle {
        peak: f64,
        peak_fraction: f64,
    },
}

impl Animation {
    pub fn new(clock: Clock, from: f64, to: f64, duration: Duration, curve: Curve) -> Self {
        let start_time = clock.now();
        Self {
            from,
            to,
            initial_velocity: 0.,
            duration,
            start_time,
            clock,
            kind: Kind::Easing { curve },
        }
    }

    /// Starts a spring toward `to`. `initial_velocity` is in units per second.
    pub fn spring(
        clock: Clock,
        from: f64,
        to: f64,
        initial_velocity: f64,
        params: SpringParams,
    ) -> Self {
        let spring = Spring {
            from,
            to,
            initial_velocity,
            params,
        };
        let start_time = clock.now();
        Self {
            from,
            to,
            initial_velocity,
            duration: spring.duration(),
            start_time,
            clock,
            kind: Kind::Spring(spring),
        }
    }

    pub fn overshoot_settle(
        clock: Clock,
        from: f64,
        to: f64,
        peak: f64,
        peak_fraction: f64,
        duration: Duration,
    ) -> Self {
        let start_time = clock.now();
        Self {
            from,
            to,
            initial_velocity: 0.,
            duration,
            start_time,
            clock,
            kind: Kind::OvershootSettle {
                peak,
                peak_fraction: peak_fraction.clamp(0.01, 1.),
            },
        }
    }

    pub fn is_done(&self) -> bool {
        self.clock.now() >= self.start_time + self.duration
    }

    pub fn value(&self) -> f64 {
        let passed = self.clock.now().saturating_sub(self.start_time);

        if passed >= self.duration {
            return self.to;
        }

        match self.kind {
            Kind::Easing { curve } => {
                let x = passed.as_secs_f64() / self.duration.as_secs_f64();
                self.from + (self.to - self.from) * curve.y(x)
            }
            Kind::Spring(spring) => spring.value_at(passed),
            Kind::OvershootSettle {
                peak,
                peak_fraction,
            } => {
                let x = passed.as_secs_f64() / self.duration.as_secs_f64();
                if x < peak_fraction {
                    let x = x / peak_fraction;
                    self.from + (peak - self.from) * EaseOutQuad.y(x)
                } else {
                    let x = (x - peak_fraction) / (1. - peak_fraction).max(f64::EPSILON);
                    peak + (self.to - peak) * EaseInOutQuad.y(x)
                }
            }
        }
    }

    pub fn from(&self) -> f64 {
        self.from
    }

    pub fn to(&self) -> f64 {
        self.to
    }

    pub fn initial_velocity(&self) -> f64 {
        self.initial_velocity
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn start_time(&self) -> Duration {
        self.start_time
    }
}
