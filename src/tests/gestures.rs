use std::collections::HashMap;
use std::sync::atomic::Ordering;

use super::fakes::thumbnail;
use super::fixture::{Fixture, OTHER_TASK, RUNNING_TASK};
use crate::activity::ShelfState;
use crate::gesture_state::{GestureEndTarget, GestureFlags};
use crate::swipe::HandlerFlags;
use crate::system::os::RemoteAnimationTarget;
use crate::system::NavigationMode;
use crate::utils::Rect;

fn quick_swipe_up(f: &mut Fixture) {
    for _ in 0..8 {
        f.move_by(-120., 16);
    }
}

/// Drags up a little and lets go without moving, too short for a pause.
fn short_drag(f: &mut Fixture) {
    f.move_by(-30., 16);
    f.hold(240);
}

fn previous_end_target(f: &Fixture) -> Option<GestureEndTarget> {
    f.service
        .previous_gesture()
        .and_then(|gesture| gesture.end_target())
}

#[test]
fn down_in_strip_starts_recents_animation() {
    let mut f = Fixture::new();
    f.down();

    assert_eq!(f.consumer_name(), "OTHER_ACTIVITY");
    assert_eq!(f.os.activity_manager.runner_count(), 1);
    let flags = f.handler().flags();
    assert!(flags.contains(HandlerFlags::LAUNCHER_PRESENT));
    assert!(!flags.contains(HandlerFlags::LAUNCHER_STARTED));
    // The launcher stays hidden until the gesture starts.
    assert!(!f.launcher.borrow().invisible.is_empty());

    f.launcher_ready();
    assert!(f.log.contains("launcher.prepare_recents_ui(false, true)"));
    assert!(f.handler().flags().contains(HandlerFlags::LAUNCHER_DRAWN));

    f.start_animation();
    assert!(f.log.contains("sysui.on_going_to_recents_legacy(false, 1)"));
    assert!(f
        .handler()
        .flags()
        .contains(HandlerFlags::APP_CONTROLLER_RECEIVED));
    assert_eq!(
        f.log.matching("recents.on_gesture_animation_start"),
        ["recents.on_gesture_animation_start(5)"]
    );
}

#[test]
fn crossing_touch_slop_starts_gesture() {
    let mut f = Fixture::new();
    f.start_swipe();

    f.move_by(-4., 16);
    assert!(!f.handler().flags().contains(HandlerFlags::GESTURE_STARTED));
    assert!(!f.log.contains("am.close_system_windows(recentapps)"));

    f.move_by(-20., 16);
    assert!(f.handler().flags().contains(HandlerFlags::GESTURE_STARTED));
    assert!(f.log.contains("am.close_system_windows(recentapps)"));
    assert!(f.launcher.borrow().invisible.is_empty());
    assert!(f.log.contains("launcher.start_launcher_transition"));

    // Displacement counts from where the slop was crossed.
    f.move_by(-500., 16);
    approx::assert_abs_diff_eq!(f.handler().current_shift(), 0.5, epsilon = 1e-9);
}

#[test]
fn fling_up_goes_home() {
    let mut f = Fixture::new();
    f.start_swipe();
    let id = f.handler().id();

    quick_swipe_up(&mut f);
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::Home)
    );
    assert!(f.service.are_animations_ongoing());
    assert_eq!(f.launcher.borrow().shelf, Some(ShelfState::Cancel));

    f.finish_animations();
    assert!(f.service.handler(id).is_none());
    assert!(!f.service.are_animations_ongoing());
    assert!(f.log.contains("launcher.on_swipe_up_to_home_complete"));
    assert!(f.log.contains("anim.screenshot_task(5)"));
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(true, true)"]);
    assert!(f.log.contains("sysui.notify_swipe_to_home_finished"));
    // Going home keeps the old thumbnail.
    assert!(f.recents.borrow().thumbnails.is_empty());

    assert_eq!(previous_end_target(&f), Some(GestureEndTarget::Home));
    assert_eq!(f.consumer_name(), "RESET_GESTURE");
}

#[test]
fn pause_then_release_goes_to_recents() {
    let mut f = Fixture::new();
    f.start_swipe();
    let id = f.handler().id();

    f.move_by(-300., 16);
    f.move_by(-300., 16);
    f.hold(240);
    assert_eq!(f.launcher.borrow().shelf, Some(ShelfState::Peek));
    assert_eq!(f.launcher.borrow().attached_to_app_window, Some(true));

    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::Recents)
    );
    assert_eq!(f.launcher.borrow().shelf, Some(ShelfState::Overview));

    f.finish_animations();
    // The screenshot replaces the thumbnail; the finish waits for the frame showing it.
    assert_eq!(f.recents.borrow().thumbnails, [RUNNING_TASK]);
    assert!(f.log.matching("anim.finish").is_empty());

    f.service.on_launcher_frame_drawn();
    f.dispatch();
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(true, false)"]);
    assert!(f.log.contains("launcher.on_swipe_up_to_recents_complete"));
    assert!(f.log.contains("recents.on_swipe_up_animation_success"));
    assert!(f.log.contains("sysui.on_overview_shown(false)"));
    assert!(f
        .log
        .contains("anim.set_defer_cancel_until_next_transition(true, true)"));
    assert!(f.service.handler(id).is_none());
    assert_eq!(previous_end_target(&f), Some(GestureEndTarget::Recents));
}

#[test]
fn two_button_fling_goes_to_recents() {
    let mut f = Fixture::with_mode(NavigationMode::TwoButtons);
    f.start_swipe();

    quick_swipe_up(&mut f);
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::Recents)
    );
    // Crossing the overview threshold is felt with buttons.
    assert!(f.log.contains("launcher.perform_haptic_feedback"));
}

#[test]
fn short_drag_returns_to_app() {
    let mut f = Fixture::new();
    f.start_swipe();
    let id = f.handler().id();

    short_drag(&mut f);
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::LastTask)
    );

    f.finish_animations();
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(false, false)"]);
    assert!(f.log.contains("launcher.on_launcher_transition_cancelled"));
    assert!(f.service.handler(id).is_none());
    assert_eq!(previous_end_target(&f), Some(GestureEndTarget::LastTask));
}

#[test]
fn release_while_scrolled_launches_new_task() {
    let mut f = Fixture::new();
    f.start_swipe();
    let id = f.handler().id();

    short_drag(&mut f);
    f.recents.borrow_mut().next_page = 0;
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::NewTask)
    );

    f.finish_animations();
    assert!(f
        .handler()
        .flags()
        .contains(HandlerFlags::START_NEW_TASK | HandlerFlags::CAPTURE_SCREENSHOT));
    assert!(!f.log.contains("am.start_activity_from_recents(3)"));

    f.service.on_launcher_frame_drawn();
    f.dispatch();
    assert!(f.log.contains("am.start_activity_from_recents(3)"));
    assert_eq!(f.handler().gesture().last_started_task_id(), Some(OTHER_TASK));
    assert!(f.log.matching("anim.finish").is_empty());

    // The animation finishes once the launched task shows up.
    let runner = f.os.activity_manager.last_runner().unwrap();
    runner.on_tasks_appeared(vec![RemoteAnimationTarget::app(
        OTHER_TASK,
        Rect::new(0., 0., 1080., 2340.),
    )]);
    f.dispatch();
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(false, false)"]);
    assert!(f.log.contains("launcher.on_launch_task_success"));
    assert!(f.service.handler(id).is_none());
}

#[test]
fn scroll_back_to_running_task_resumes_it() {
    let mut f = Fixture::new();
    f.start_swipe();
    let id = f.handler().id();

    short_drag(&mut f);
    f.recents.borrow_mut().next_page = 0;
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::NewTask)
    );

    // The user scrolls back before the window settles.
    f.recents.borrow_mut().next_page = 1;
    f.finish_animations();
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(false, false)"]);
    assert!(f.log.matching("am.start_activity_from_recents").is_empty());
    assert!(f.service.handler(id).is_none());
    assert_eq!(previous_end_target(&f), Some(GestureEndTarget::LastTask));
}

#[test]
fn resuming_after_a_started_task_relaunches() {
    let mut f = Fixture::new();
    f.start_swipe();

    short_drag(&mut f);
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::LastTask)
    );

    f.service
        .current_handler_mut()
        .unwrap()
        .gesture_mut()
        .update_last_started_task_id(OTHER_TASK);
    f.finish_animations();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::NewTask)
    );
    let flags = f.handler().flags();
    assert!(flags.contains(HandlerFlags::START_NEW_TASK));
    assert!(!flags.contains(HandlerFlags::RESUME_LAST_TASK));
    assert!(f.log.matching("anim.finish").is_empty());

    f.service.on_launcher_frame_drawn();
    f.dispatch();
    assert!(f.log.contains("am.start_activity_from_recents(5)"));
}

#[test]
fn failed_launch_falls_back_to_overview() {
    let mut f = Fixture::new();
    f.os.activity_manager
        .launch_succeeds
        .store(false, Ordering::SeqCst);
    f.start_swipe();
    let id = f.handler().id();

    short_drag(&mut f);
    f.recents.borrow_mut().next_page = 0;
    f.up();
    f.finish_animations();
    f.service.on_launcher_frame_drawn();
    f.dispatch();

    assert!(f.log.contains("am.start_activity_from_recents(3)"));
    assert!(f.log.contains("launcher.on_launch_task_failed"));
    assert_eq!(f.launcher.borrow().toasts, ["activity not available"]);
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(true, false)"]);
    assert!(f.service.handler(id).is_none());
}

#[test]
fn os_cancel_invalidates_gesture() {
    let mut f = Fixture::new();
    f.start_swipe();
    let id = f.handler().id();
    f.move_by(-200., 16);

    let runner = f.os.activity_manager.last_runner().unwrap();
    let thumbnails = HashMap::from([(RUNNING_TASK, thumbnail(false))]);
    runner.on_animation_canceled(Some(thumbnails));
    f.dispatch();

    assert!(f.service.handler(id).is_none());
    assert!(f.log.contains("launcher.on_transition_cancelled(true)"));
    assert!(f.log.contains("recents.update_thumbnail(5)"));
    assert_eq!(f.consumer_name(), "RESET_GESTURE");
    assert!(f.launcher.borrow().invisible.is_empty());

    // The rest of the stream is ignored.
    f.move_by(-200., 16);
    f.up();
    assert!(f.service.current_handler().is_none());
    assert!(f.log.matching("anim.finish").is_empty());
}

#[test]
fn window_animation_outliving_its_controller_does_not_settle() {
    let mut f = Fixture::new();
    f.start_swipe();

    quick_swipe_up(&mut f);
    f.up();
    assert_eq!(
        f.handler().gesture().end_target(),
        Some(GestureEndTarget::Home)
    );

    let controller = f.handler().recents_controller().unwrap().clone();
    controller.finish(true, false);
    f.dispatch();
    assert!(f.handler().recents_controller().is_none());

    f.finish_animations();
    assert!(f.log.contains("launcher.on_swipe_up_to_home_complete"));
    assert!(!f
        .handler()
        .gesture()
        .has_state(GestureFlags::END_TARGET_ANIMATION_FINISHED));
    assert!(!f.log.contains("sysui.notify_swipe_to_home_finished"));
    assert!(!f.log.contains("anim.screenshot_task(5)"));
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(true, false)"]);
}

#[test]
fn touch_without_movement_abandons_gesture() {
    let mut f = Fixture::new();
    f.down();
    let id = f.handler().id();
    f.up();

    assert!(f.service.handler(id).is_none());
    assert!(f.log.contains("am.cancel_recents_animation(true)"));
    assert_eq!(f.consumer_name(), "RESET_GESTURE");
    assert_eq!(previous_end_target(&f), None);
}

#[test]
fn late_start_of_replaced_animation_finishes_to_app() {
    let mut f = Fixture::new();
    f.down();
    f.up();
    let stale = f.os.activity_manager.last_runner().unwrap();

    f.down();
    assert_eq!(f.os.activity_manager.runner_count(), 2);
    assert!(stale.is_cancelled());
    f.log.take();

    stale.on_animation_start(
        f.animation.clone(),
        vec![RemoteAnimationTarget::app(
            RUNNING_TASK,
            Rect::new(0., 0., 1080., 2340.),
        )],
        Vec::new(),
        Rect::default(),
        None,
    );
    f.dispatch();

    assert!(f.log.contains("sysui.on_going_to_recents_legacy(true, 1)"));
    assert_eq!(f.log.matching("anim.finish"), ["anim.finish(false, false)"]);
    // The new gesture never saw it.
    assert!(!f
        .handler()
        .flags()
        .contains(HandlerFlags::APP_CONTROLLER_RECEIVED));
}

#[test]
fn touch_during_home_animation_hands_over_to_overview() {
    let mut f = Fixture::new();
    f.start_swipe();
    let first = f.handler().id();
    quick_swipe_up(&mut f);
    f.up();
    assert!(f.service.are_animations_ongoing());

    f.down();
    assert!(f.service.handler(first).is_none());
    assert_eq!(previous_end_target(&f), Some(GestureEndTarget::Home));
    assert!(f.service.shared_state().going_to_launcher());
    assert_eq!(f.consumer_name(), "OVERVIEW");
    assert!(f.service.current_handler().is_none());
}

#[test]
fn repeated_activity_created_does_not_reinitialize() {
    let mut f = Fixture::new();
    f.start_swipe();

    f.launcher_ready();
    f.service.on_activity_created(false);
    f.dispatch();
    assert_eq!(f.log.count("launcher.prepare_recents_ui(false, true)"), 1);
}
