use crate::gesture_state::GestureEndTarget;
use crate::utils::Point;

/// Everything the end target of a released swipe depends on.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct EndTargetParams {
    /// Release velocity in px/s.
    #[cfg_attr(test, proptest(strategy = "tests::point()"))]
    pub velocity: Point,
    /// Velocity along the swipe axis in px/s, negative when swiping up.
    #[cfg_attr(test, proptest(strategy = "-10000f64..10000."))]
    pub end_velocity: f64,
    pub is_fling: bool,
    pub is_cancel: bool,
    pub fully_gestural: bool,
    pub is_shelf_peeking: bool,
    pub going_to_new_task: bool,
    pub reached_overview_threshold: bool,
    pub gesture_started: bool,
    pub overview_disabled: bool,
}

pub fn calculate_end_target(params: &EndTargetParams) -> GestureEndTarget {
    use GestureEndTarget::*;

    let target = if !params.is_fling {
        if params.is_cancel {
            LastTask
        } else if params.fully_gestural {
            if params.is_shelf_peeking {
                Recents
            } else if params.going_to_new_task {
                NewTask
            } else if params.reached_overview_threshold {
                Home
            } else {
                LastTask
            }
        } else if params.reached_overview_threshold && params.gesture_started {
            Recents
        } else if params.going_to_new_task {
            NewTask
        } else {
            LastTask
        }
    } else {
        let is_swipe_up = params.end_velocity < 0.;
        let will_go_to_new_task =
            params.going_to_new_task && params.velocity.x.abs() > params.end_velocity.abs();

        if params.fully_gestural && is_swipe_up && !will_go_to_new_task {
            Home
        } else if params.fully_gestural && is_swipe_up && !params.is_shelf_peeking {
            // Swiping up while horizontally, to a different task.
            NewTask
        } else if is_swipe_up {
            if !params.reached_overview_threshold && will_go_to_new_task {
                NewTask
            } else {
                Recents
            }
        } else if params.going_to_new_task {
            NewTask
        } else {
            LastTask
        }
    };

    if params.overview_disabled && matches!(target, Recents | LastTask) {
        LastTask
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    pub fn point() -> impl Strategy<Value = Point> {
        (-10000f64..10000., -10000f64..10000.).prop_map(|(x, y)| Point::new(x, y))
    }

    fn params() -> EndTargetParams {
        EndTargetParams {
            velocity: Point::default(),
            end_velocity: 0.,
            is_fling: false,
            is_cancel: false,
            fully_gestural: true,
            is_shelf_peeking: false,
            going_to_new_task: false,
            reached_overview_threshold: false,
            gesture_started: true,
            overview_disabled: false,
        }
    }

    #[test]
    fn slow_release() {
        use GestureEndTarget::*;

        assert_eq!(calculate_end_target(&params()), LastTask);
        assert_eq!(
            calculate_end_target(&EndTargetParams {
                reached_overview_threshold: true,
                ..params()
            }),
            Home
        );
        assert_eq!(
            calculate_end_target(&EndTargetParams {
                is_shelf_peeking: true,
                ..params()
            }),
            Recents
        );
        assert_eq!(
            calculate_end_target(&EndTargetParams {
                reached_overview_threshold: true,
                fully_gestural: false,
                ..params()
            }),
            Recents
        );
        assert_eq!(
            calculate_end_target(&EndTargetParams {
                reached_overview_threshold: true,
                is_cancel: true,
                ..params()
            }),
            LastTask
        );
    }

    #[test]
    fn fling() {
        use GestureEndTarget::*;

        let up = EndTargetParams {
            is_fling: true,
            end_velocity: -3000.,
            velocity: Point::new(0., -3000.),
            ..params()
        };
        assert_eq!(calculate_end_target(&up), Home);

        let sideways = EndTargetParams {
            going_to_new_task: true,
            velocity: Point::new(4000., -3000.),
            ..up
        };
        assert_eq!(calculate_end_target(&sideways), NewTask);

        let buttons = EndTargetParams {
            fully_gestural: false,
            ..up
        };
        assert_eq!(calculate_end_target(&buttons), Recents);

        let down = EndTargetParams {
            end_velocity: 3000.,
            ..up
        };
        assert_eq!(calculate_end_target(&down), LastTask);
    }

    #[test]
    fn overview_disabled_collapses_to_last_task() {
        let params = EndTargetParams {
            fully_gestural: false,
            reached_overview_threshold: true,
            overview_disabled: true,
            ..params()
        };
        assert_eq!(calculate_end_target(&params), GestureEndTarget::LastTask);
    }

    proptest! {
        #[test]
        fn deterministic(params: EndTargetParams) {
            prop_assert_eq!(calculate_end_target(&params), calculate_end_target(&params));
        }

        #[test]
        fn overview_disabled_never_shows_recents(params: EndTargetParams) {
            let params = EndTargetParams { overview_disabled: true, ..params };
            prop_assert_ne!(calculate_end_target(&params), GestureEndTarget::Recents);
        }

        #[test]
        fn cancel_without_fling_resumes(params: EndTargetParams) {
            let params = EndTargetParams { is_fling: false, is_cancel: true, ..params };
            prop_assert_eq!(calculate_end_target(&params), GestureEndTarget::LastTask);
        }
    }
}
