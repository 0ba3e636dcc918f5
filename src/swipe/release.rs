//! Scheduling of the window animation after the finger lifts.

use std::time::Duration;

use crate::activity::RecentsView;
use crate::animation::{Animation, Clock, Curve};
use crate::gesture_state::GestureEndTarget;
use crate::utils::Point;

pub const MAX_SWIPE_DURATION: Duration = Duration::from_millis(350);
pub const MIN_OVERSHOOT_DURATION: Duration = Duration::from_millis(120);
pub const MIN_PROGRESS_FOR_OVERVIEW: f64 = 0.7;
/// The smaller of `1 / 0.7` and `1 / (1 - 0.7)`.
pub const SWIPE_DURATION_MULTIPLIER: f64 = 1. / MIN_PROGRESS_FOR_OVERVIEW;
pub const RECENTS_ATTACH_DURATION: Duration = Duration::from_millis(300);

const OVERSHOOT_TENSION: f64 = 1.2;
/// Time to settle back from the overshoot peak.
const OVERSHOOT_SETTLE_MS: f64 = 100.;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReleaseCurve {
    Decelerate,
    Overshoot,
    /// Decelerates into `peak`, then settles on the end value.
    OvershootSettle { peak: f64, peak_fraction: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReleaseParams {
    pub target: GestureEndTarget,
    pub current_shift: f64,
    /// Release velocity in px/s.
    pub velocity: Point,
    /// Velocity along the swipe axis in px/s.
    pub end_velocity: f64,
    pub is_fling: bool,
    pub fully_gestural: bool,
    pub transition_drag_length: f64,
    pub drag_length_factor: f64,
    pub min_fling_velocity: f64,
    pub single_frame_ms: f64,
}

/// Where the swipe progress animates from and to once released.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ReleaseAnimation {
    pub start: f64,
    pub end: f64,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub curve: ReleaseCurve,
}

impl ReleaseAnimation {
    pub fn compute(params: &ReleaseParams) -> Self {
        let target = params.target;
        let end = if target.is_launcher() { 1. } else { 0. };
        let drag_length = params.transition_drag_length;
        let velocity_y = params.velocity.y / 1000.;

        let mut duration_ms = millis(MAX_SWIPE_DURATION);
        let mut curve = ReleaseCurve::Decelerate;
        let start;

        if !params.is_fling {
            let expected = ((end - params.current_shift)
                * millis(MAX_SWIPE_DURATION)
                * SWIPE_DURATION_MULTIPLIER)
                .round()
                .abs();
            duration_ms = duration_ms.min(expected);
            start = params.current_shift;
            if target == GestureEndTarget::Recents {
                curve = ReleaseCurve::Overshoot;
            }
        } else {
            start = if drag_length > 0. {
                (params.current_shift - velocity_y * params.single_frame_ms / drag_length)
                    .clamp(0., params.drag_length_factor)
            } else {
                params.current_shift
            };

            if params.end_velocity.abs() > params.min_fling_velocity && drag_length > 0. {
                if target == GestureEndTarget::Recents && !params.fully_gestural {
                    let overshoot = Overshoot::new(
                        start,
                        end,
                        params.end_velocity / 1000.,
                        drag_length,
                        params.single_frame_ms,
                    );
                    curve = ReleaseCurve::OvershootSettle {
                        peak: overshoot.peak,
                        peak_fraction: overshoot.peak_fraction,
                    };
                    duration_ms = overshoot
                        .duration_ms
                        .clamp(millis(MIN_OVERSHOOT_DURATION), millis(MAX_SWIPE_DURATION));
                } else {
                    let distance = (end - params.current_shift) * drag_length;
                    // Roughly match the snap velocity to the fling; the slope of the curve at
                    // zero is about 2.
                    let base = if velocity_y == 0. {
                        f64::INFINITY
                    } else {
                        (distance / velocity_y).abs().round()
                    };
                    duration_ms = millis(MAX_SWIPE_DURATION).min(2. * base);
                    if target == GestureEndTarget::Recents {
                        curve = ReleaseCurve::Overshoot;
                    }
                }
            }
        }

        if target == GestureEndTarget::Home {
            duration_ms = duration_ms.max(millis(MIN_OVERSHOOT_DURATION));
        }

        Self {
            start,
            end,
            duration: Duration::from_secs_f64(duration_ms.max(0.) / 1000.),
            curve,
        }
    }

    /// The value animation of the swipe progress for non-home targets.
    pub fn animation(&self, clock: Clock) -> Animation {
        match self.curve {
            ReleaseCurve::Decelerate => {
                Animation::new(clock, self.start, self.end, self.duration, Curve::Decelerate)
            }
            ReleaseCurve::Overshoot => Animation::new(
                clock,
                self.start,
                self.end,
                self.duration,
                Curve::Overshoot(OVERSHOOT_TENSION),
            ),
            ReleaseCurve::OvershootSettle {
                peak,
                peak_fraction,
            } => Animation::overshoot_settle(
                clock,
                self.start,
                self.end,
                peak,
                peak_fraction,
                self.duration,
            ),
        }
    }
}

/// Settles the recents scroll for a swipe into overview and returns the release duration,
/// stretched to cover the scroll.
pub fn settle_recents_scroll(recents: &mut dyn RecentsView, duration: Duration) -> Duration {
    let nearest = recents.page_nearest_to_center();
    // Only settle on the next page if it is the one nearest to the center.
    if recents.next_page() != nearest {
        recents.snap_to_page(nearest, duration);
    }
    if recents.scroller_duration() > MAX_SWIPE_DURATION {
        let next = recents.next_page();
        recents.snap_to_page(next, MAX_SWIPE_DURATION);
    }
    duration.max(recents.scroller_duration())
}

/// Overshoot past the end by about half a frame of the fling, then settle back.
struct Overshoot {
    peak: f64,
    peak_fraction: f64,
    duration_ms: f64,
}

impl Overshoot {
    fn new(
        start: f64,
        end: f64,
        velocity_px_per_ms: f64,
        total_distance_px: f64,
        single_frame_ms: f64,
    ) -> Self {
        let velocity = velocity_px_per_ms.abs();
        let overshoot_by = (velocity * single_frame_ms / total_distance_px / 2.).clamp(0.02, 0.15);
        let peak = end + overshoot_by;

        let start_px = (start * total_distance_px).round();
        let peak_px = (peak * total_distance_px).round();
        let distance = peak_px - start_px;

        // v^2 = 2ad, and the time to stop is v / a.
        let to_peak_ms = if distance > 0. && velocity > 0. {
            2. * distance / velocity
        } else {
            0.
        };
        let duration_ms = to_peak_ms + OVERSHOOT_SETTLE_MS;

        Self {
            peak,
            peak_fraction: to_peak_ms / duration_ms,
            duration_ms,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    use super::*;

    fn params(target: GestureEndTarget) -> ReleaseParams {
        ReleaseParams {
            target,
            current_shift: 0.5,
            velocity: Point::default(),
            end_velocity: 0.,
            is_fling: false,
            fully_gestural: true,
            transition_drag_length: 1000.,
            drag_length_factor: 1.,
            min_fling_velocity: 250.,
            single_frame_ms: 16.,
        }
    }

    #[test]
    fn slow_release_scales_with_remaining_distance() {
        let anim = ReleaseAnimation::compute(&params(GestureEndTarget::LastTask));
        assert_abs_diff_eq!(anim.start, 0.5);
        assert_abs_diff_eq!(anim.end, 0.);
        assert_eq!(anim.duration, Duration::from_millis(250));
        assert_eq!(anim.curve, ReleaseCurve::Decelerate);

        let anim = ReleaseAnimation::compute(&params(GestureEndTarget::Recents));
        assert_abs_diff_eq!(anim.end, 1.);
        assert_eq!(anim.curve, ReleaseCurve::Overshoot);
    }

    #[test]
    fn home_lasts_at_least_min_overshoot() {
        let anim = ReleaseAnimation::compute(&ReleaseParams {
            current_shift: 0.99,
            ..params(GestureEndTarget::Home)
        });
        assert_eq!(anim.duration, MIN_OVERSHOOT_DURATION);
    }

    #[test]
    fn fling_starts_one_frame_ahead() {
        let anim = ReleaseAnimation::compute(&ReleaseParams {
            is_fling: true,
            velocity: Point::new(0., -2000.),
            end_velocity: -2000.,
            ..params(GestureEndTarget::Home)
        });
        // 2 px/ms over a 16 ms frame on a 1000 px drag.
        assert_abs_diff_eq!(anim.start, 0.532);
        // 468 px at 2 px/ms, doubled and capped.
        assert_eq!(anim.duration, MAX_SWIPE_DURATION);
    }

    #[test]
    fn button_nav_fling_into_recents_overshoots() {
        let anim = ReleaseAnimation::compute(&ReleaseParams {
            is_fling: true,
            fully_gestural: false,
            velocity: Point::new(0., -3000.),
            end_velocity: -3000.,
            ..params(GestureEndTarget::Recents)
        });
        let ReleaseCurve::OvershootSettle {
            peak,
            peak_fraction,
        } = anim.curve
        else {
            panic!("expected an overshoot, got {:?}", anim.curve);
        };
        assert!(peak > 1.);
        assert!(peak_fraction > 0. && peak_fraction < 1.);
        assert!(anim.duration >= MIN_OVERSHOOT_DURATION && anim.duration <= MAX_SWIPE_DURATION);
    }

    proptest! {
        #[test]
        fn duration_stays_in_bounds(
            target: GestureEndTarget,
            current_shift in 0f64..1.5,
            velocity_y in -10000f64..10000.,
            velocity_x in -10000f64..10000.,
            is_fling: bool,
            fully_gestural: bool,
        ) {
            let anim = ReleaseAnimation::compute(&ReleaseParams {
                target,
                current_shift,
                velocity: Point::new(velocity_x, velocity_y),
                end_velocity: velocity_y,
                is_fling,
                fully_gestural,
                ..params(target)
            });

            prop_assert!(anim.duration <= MAX_SWIPE_DURATION);
            if target == GestureEndTarget::Home {
                prop_assert!(anim.duration >= MIN_OVERSHOOT_DURATION);
            }
            prop_assert!(anim.start >= 0. && anim.start <= 1.5);
        }
    }
}
