use super::fixture::Fixture;
use crate::service::{DisplayInfo, Rotation};
use crate::system::{NavigationMode, SystemUiStateFlags};
use crate::utils::Rect;

fn dump(f: &mut Fixture, args: &[&str]) -> String {
    let mut out = String::new();
    f.service.dump(args, &mut out).unwrap();
    out
}

#[test]
fn three_button_mode_ignores_touches() {
    let mut f = Fixture::with_mode(NavigationMode::ThreeButtons);
    f.down();
    f.move_by(-300., 16);
    f.up();

    assert!(f.service.current_handler().is_none());
    assert_eq!(f.os.activity_manager.runner_count(), 0);
}

#[test]
fn resumed_launcher_gets_overview_consumer() {
    let mut f = Fixture::new();
    {
        let mut launcher = f.launcher.borrow_mut();
        launcher.resumed = true;
        launcher.window_focus = true;
    }
    f.down();

    assert_eq!(f.consumer_name(), "OVERVIEW");
    assert_eq!(f.os.activity_manager.runner_count(), 0);
    assert!(f.log.contains("launcher.dispatch_overview_touch(ACTION_DOWN)"));
}

#[test]
fn resumed_launcher_without_focus() {
    let mut f = Fixture::new();
    f.launcher.borrow_mut().resumed = true;
    f.down();

    assert_eq!(f.consumer_name(), "OVERVIEW_WITHOUT_FOCUS");
}

#[test]
fn separate_overview_gets_fallback_consumer() {
    let mut f = Fixture::new();
    f.launcher.borrow_mut().home_and_overview_same = false;
    f.down();

    assert_eq!(f.consumer_name(), "FALLBACK_NO_BUTTON");
}

#[test]
fn screen_pinning_blocks_gestures_and_toggle() {
    let mut f = Fixture::new();
    f.proxy
        .on_system_ui_state_changed(SystemUiStateFlags::SCREEN_PINNING);
    f.dispatch();

    f.down();
    assert_eq!(f.consumer_name(), "SCREEN_PINNED");
    assert_eq!(f.os.activity_manager.runner_count(), 0);
    f.up();

    f.log.take();
    f.proxy.on_overview_toggle();
    f.dispatch();
    assert!(f.log.calls().is_empty());
}

#[test]
fn holding_swipe_while_pinned_stops_pinning() {
    let mut f = Fixture::new();
    f.proxy
        .on_system_ui_state_changed(SystemUiStateFlags::SCREEN_PINNING);
    f.dispatch();

    f.down();
    f.move_by(-100., 16);
    assert!(!f.log.contains("sysui.stop_screen_pinning"));
    f.hold(240);
    assert_eq!(f.log.count("sysui.stop_screen_pinning"), 1);
    assert!(f.log.contains("launcher.perform_haptic_feedback"));
}

#[test]
fn hidden_nav_bar_resets_gesture() {
    let mut f = Fixture::new();
    f.proxy
        .on_system_ui_state_changed(SystemUiStateFlags::NAV_BAR_HIDDEN);
    f.dispatch();

    f.down();
    assert_eq!(f.consumer_name(), "RESET_GESTURE");
}

#[test]
fn locked_device_gets_locked_consumer() {
    let mut f = Fixture::new();
    f.service.on_user_locked();
    f.down();

    assert_eq!(f.consumer_name(), "DEVICE_LOCKED");
    assert!(f.service.current_handler().is_none());
}

#[test]
fn accessibility_button_wraps_consumer() {
    let mut f = Fixture::new();
    f.proxy
        .on_system_ui_state_changed(SystemUiStateFlags::A11Y_BUTTON_CLICKABLE);
    f.dispatch();

    f.down();
    assert_eq!(f.consumer_name(), "OTHER_ACTIVITY:ACCESSIBILITY");
}

#[test]
fn no_running_task_resets_gesture() {
    let mut f = Fixture::new();
    f.os.activity_manager.set_running_task(None);
    f.down();

    assert_eq!(f.consumer_name(), "RESET_GESTURE");
}

#[test]
fn overview_toggle_closes_system_windows() {
    let mut f = Fixture::new();
    f.log.take();
    f.proxy.on_overview_toggle();
    f.dispatch();

    assert_eq!(
        f.log.calls(),
        ["am.close_system_windows(recentapps)", "launcher.switch_to_recents_if_visible", "launcher.start_overview"]
    );
}

#[test]
fn navigation_mode_change_moves_swipe_region() {
    let mut f = Fixture::with_mode(NavigationMode::ThreeButtons);
    f.service
        .on_display_changed(DisplayInfo::new(2340., 1080., Rotation::R90));
    // The navigation bar sits on the right in landscape.
    assert_eq!(f.service.regions().swipe, Rect::new(2292., 0., 2340., 1080.));
    assert!(f.service.regions().assistant_left.is_empty());

    f.service.on_navigation_mode_changed(NavigationMode::NoButton);
    assert_eq!(f.service.regions().swipe, Rect::new(0., 1032., 2340., 1080.));
    assert!(!f.service.regions().assistant_left.is_empty());
    assert!(!f.service.regions().assistant_right.is_empty());
}

#[test]
fn dump_describes_touch_state_and_model() {
    let mut f = Fixture::new();
    f.down();
    let out = dump(&mut f, &[]);

    assert!(out.starts_with("TouchState:\n"));
    assert!(out.contains("  navMode=NO_BUTTON\n"));
    assert!(out.contains("  consumer=OTHER_ACTIVITY\n"));
    assert!(out.contains("RecentsModel:\n"));
}

#[test]
fn dump_commands() {
    let mut f = Fixture::new();

    insta::assert_snapshot!(dump(&mut f, &["cmd"]), @r"
    Available commands:
      clear-touch-log: Clears the touch interaction log
    ");
    assert_eq!(dump(&mut f, &["cmd", "foo"]), "Unknown command: foo\n");
    assert_eq!(dump(&mut f, &["cmd", "clear-touch-log"]), "");
}
