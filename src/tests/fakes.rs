//! In-memory stand-ins for the OS services and the launcher UI.
//!
//! Every fake records its calls into one shared [`CallLog`], so tests can check what happened
//! across collaborators and in which order.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use quickstep_config::ComponentName;

use crate::activity::{
    ActivityId, ActivityInterface, InvisibilityFlags, RecentsView, ShelfState,
};
use crate::motion::MotionEvent;
use crate::recents_animation::RecentsAnimationRunner;
use crate::system::os::{
    ActivityManager, Bitmap, GroupedRecentTaskInfo, Icon, IconLoader, OsServices,
    RecentTaskInfo, RemoteAnimationTarget, RunningTaskInfo, SystemAnimationController,
    SystemUiProxy, TaskId, ThumbnailData, UserId, WindowingMode,
};

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.lock().push(call.into());
    }

    /// Returns the calls so far and starts over.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.lock().iter().any(|c| c == call)
    }

    pub fn count(&self, call: &str) -> usize {
        self.lock().iter().filter(|c| *c == call).count()
    }

    /// Calls starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn component(package: &str) -> ComponentName {
    ComponentName {
        package: package.to_owned(),
        class: format!("{package}.Main"),
    }
}

pub fn recent_task(task_id: TaskId, package: &str, last_active_time: u64) -> RecentTaskInfo {
    RecentTaskInfo {
        task_id,
        user_id: 0,
        component: Some(component(package)),
        top_activity: None,
        last_active_time,
        windowing_mode: WindowingMode::Fullscreen,
        label: Some(package.to_owned()),
    }
}

pub fn thumbnail(reduced: bool) -> ThumbnailData {
    ThumbnailData::new(Bitmap::empty(108, 234), reduced)
}

// =============================================================================
// OS services
// =============================================================================

#[derive(Debug)]
pub struct FakeActivityManager {
    log: CallLog,
    pub running_task: Mutex<Option<RunningTaskInfo>>,
    runners: Mutex<Vec<RecentsAnimationRunner>>,
    pub launch_succeeds: AtomicBool,
    pub lock_to_app: AtomicBool,
    pub thumbnails_fail: AtomicBool,
}

impl FakeActivityManager {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            running_task: Mutex::new(None),
            runners: Mutex::new(Vec::new()),
            launch_succeeds: AtomicBool::new(true),
            lock_to_app: AtomicBool::new(false),
            thumbnails_fail: AtomicBool::new(false),
        }
    }

    pub fn set_running_task(&self, task: Option<RunningTaskInfo>) {
        *self
            .running_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = task;
    }

    /// The runner of the most recent `start_recents_activity` call.
    pub fn last_runner(&self) -> Option<RecentsAnimationRunner> {
        self.runners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn runner_count(&self) -> usize {
        self.runners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ActivityManager for FakeActivityManager {
    fn running_task(&self) -> Option<RunningTaskInfo> {
        self.running_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn start_activity_from_recents(&self, task_id: TaskId) -> bool {
        self.log.record(format!("am.start_activity_from_recents({task_id})"));
        self.launch_succeeds.load(Ordering::SeqCst)
    }

    fn start_recents_activity(&self, runner: RecentsAnimationRunner) {
        self.log.record("am.start_recents_activity");
        self.runners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(runner);
    }

    fn cancel_recents_animation(&self, restore_home_root_task: bool) {
        self.log
            .record(format!("am.cancel_recents_animation({restore_home_root_task})"));
    }

    fn start_home(&self) {
        self.log.record("am.start_home");
    }

    fn close_system_windows(&self, reason: &str) {
        self.log.record(format!("am.close_system_windows({reason})"));
    }

    fn is_lock_to_app_active(&self) -> bool {
        self.lock_to_app.load(Ordering::SeqCst)
    }

    fn is_device_locked(&self, _user_id: UserId) -> bool {
        false
    }

    fn task_thumbnail(
        &self,
        task_id: TaskId,
        low_resolution: bool,
    ) -> anyhow::Result<ThumbnailData> {
        self.log
            .record(format!("am.task_thumbnail({task_id}, {low_resolution})"));
        if self.thumbnails_fail.load(Ordering::SeqCst) {
            anyhow::bail!("no snapshot for task {task_id}");
        }
        Ok(thumbnail(low_resolution))
    }
}

#[derive(Debug)]
pub struct FakeSystemUi {
    log: CallLog,
    /// Most recent first, like the real service.
    pub recent_tasks: Mutex<Vec<GroupedRecentTaskInfo>>,
    pub running_tasks: Mutex<Vec<RunningTaskInfo>>,
}

impl FakeSystemUi {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            recent_tasks: Mutex::new(Vec::new()),
            running_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn set_recent_tasks(&self, tasks: Vec<GroupedRecentTaskInfo>) {
        *self
            .recent_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = tasks;
    }
}

impl SystemUiProxy for FakeSystemUi {
    fn recent_tasks(&self, max: usize, _user_id: UserId) -> Vec<GroupedRecentTaskInfo> {
        self.log.record("sysui.recent_tasks");
        let tasks = self
            .recent_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.iter().take(max).cloned().collect()
    }

    fn running_tasks(&self, max: usize) -> Vec<RunningTaskInfo> {
        let tasks = self
            .running_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.iter().take(max).cloned().collect()
    }

    fn on_going_to_recents_legacy(
        &self,
        cancelled: bool,
        apps: &[RemoteAnimationTarget],
    ) -> Vec<RemoteAnimationTarget> {
        self.log.record(format!(
            "sysui.on_going_to_recents_legacy({cancelled}, {})",
            apps.len()
        ));
        Vec::new()
    }

    fn notify_swipe_to_home_finished(&self) {
        self.log.record("sysui.notify_swipe_to_home_finished");
    }

    fn on_overview_shown(&self, from_home: bool) {
        self.log.record(format!("sysui.on_overview_shown({from_home})"));
    }

    fn start_assistant(&self) {
        self.log.record("sysui.start_assistant");
    }

    fn stop_screen_pinning(&self) {
        self.log.record("sysui.stop_screen_pinning");
    }

    fn notify_accessibility_button_clicked(&self) {
        self.log.record("sysui.notify_accessibility_button_clicked");
    }

    fn notify_accessibility_button_long_clicked(&self) {
        self.log
            .record("sysui.notify_accessibility_button_long_clicked");
    }
}

#[derive(Debug)]
pub struct FakeAnimationController {
    log: CallLog,
    pub screenshot: Mutex<Option<ThumbnailData>>,
}

impl FakeAnimationController {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            screenshot: Mutex::new(Some(thumbnail(false))),
        }
    }
}

impl SystemAnimationController for FakeAnimationController {
    fn finish(&self, to_home: bool, send_user_leave_hint: bool) {
        self.log
            .record(format!("anim.finish({to_home}, {send_user_leave_hint})"));
    }

    fn set_input_consumer_enabled(&self, enabled: bool) {
        self.log
            .record(format!("anim.set_input_consumer_enabled({enabled})"));
    }

    fn screenshot_task(&self, task_id: TaskId) -> Option<ThumbnailData> {
        self.log.record(format!("anim.screenshot_task({task_id})"));
        self.screenshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_animation_targets_behind_system_bars(&self, behind: bool) {
        self.log
            .record(format!("anim.set_animation_targets_behind_system_bars({behind})"));
    }

    fn set_split_screen_minimized(&self, minimized: bool) {
        self.log
            .record(format!("anim.set_split_screen_minimized({minimized})"));
    }

    fn set_defer_cancel_until_next_transition(&self, defer: bool, screenshot: bool) {
        self.log.record(format!(
            "anim.set_defer_cancel_until_next_transition({defer}, {screenshot})"
        ));
    }

    fn set_will_finish_to_home(&self, will_finish_to_home: bool) {
        self.log
            .record(format!("anim.set_will_finish_to_home({will_finish_to_home})"));
    }

    fn cleanup_screenshot(&self) {
        self.log.record("anim.cleanup_screenshot");
    }
}

#[derive(Debug)]
pub struct FakeIconLoader {
    log: CallLog,
    pub accessibility_enabled: AtomicBool,
}

impl FakeIconLoader {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            accessibility_enabled: AtomicBool::new(false),
        }
    }
}

impl IconLoader for FakeIconLoader {
    fn task_description_icon(&self, _task_id: TaskId) -> Option<Icon> {
        None
    }

    fn activity_icon(&self, component: &ComponentName, _user_id: UserId) -> Option<Icon> {
        self.log
            .record(format!("icons.activity_icon({})", component.package));
        (component.package != "no.icon").then(|| Bitmap::empty(48, 48))
    }

    fn default_icon(&self, user_id: UserId) -> Icon {
        self.log.record(format!("icons.default_icon({user_id})"));
        Bitmap::empty(1, 1)
    }

    fn application_label(&self, package: &str, _user_id: UserId) -> Option<String> {
        Some(format!(" {package} "))
    }

    fn badged_label(&self, label: &str, user_id: UserId) -> String {
        format!("Work({user_id}) {label}")
    }

    fn is_accessibility_enabled(&self) -> bool {
        self.accessibility_enabled.load(Ordering::SeqCst)
    }
}

/// The fakes behind one [`OsServices`].
pub struct FakeOs {
    pub log: CallLog,
    pub activity_manager: Arc<FakeActivityManager>,
    pub system_ui: Arc<FakeSystemUi>,
    pub icon_loader: Arc<FakeIconLoader>,
}

impl FakeOs {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            activity_manager: Arc::new(FakeActivityManager::new(log.clone())),
            system_ui: Arc::new(FakeSystemUi::new(log.clone())),
            icon_loader: Arc::new(FakeIconLoader::new(log.clone())),
            log,
        }
    }

    pub fn services(&self) -> OsServices {
        OsServices {
            activity_manager: self.activity_manager.clone(),
            system_ui: self.system_ui.clone(),
            icon_loader: self.icon_loader.clone(),
        }
    }

    pub fn animation_controller(&self) -> Arc<FakeAnimationController> {
        Arc::new(FakeAnimationController::new(self.log.clone()))
    }
}

// =============================================================================
// Launcher
// =============================================================================

#[derive(Debug)]
pub struct LauncherState {
    pub created: Option<ActivityId>,
    pub resumed: bool,
    pub window_focus: bool,
    pub home_and_overview_same: bool,
    pub has_recents_view: bool,
    /// Overview is showing.
    pub recents_visible: bool,
    pub switch_to_recents_succeeds: bool,
    pub invisible: InvisibilityFlags,
    pub attached_to_app_window: Option<bool>,
    pub shelf: Option<ShelfState>,
    pub toasts: Vec<String>,
}

impl Default for LauncherState {
    fn default() -> Self {
        Self {
            created: Some(ActivityId(1)),
            resumed: false,
            window_focus: false,
            home_and_overview_same: true,
            has_recents_view: true,
            recents_visible: false,
            switch_to_recents_succeeds: false,
            invisible: InvisibilityFlags::empty(),
            attached_to_app_window: None,
            shelf: None,
            toasts: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecentsState {
    pub tasks: Vec<TaskId>,
    pub running: Option<usize>,
    pub next_page: usize,
    /// Defaults to `next_page`.
    pub nearest: Option<usize>,
    pub in_transition: bool,
    pub scroller_duration: Duration,
    pub running_hidden: bool,
    pub focus: Option<Option<usize>>,
    pub thumbnails: Vec<TaskId>,
}

pub struct FakeRecentsView {
    log: CallLog,
    pub state: Rc<RefCell<RecentsState>>,
}

impl RecentsView for FakeRecentsView {
    fn running_task_index(&self) -> Option<usize> {
        self.state.borrow().running
    }

    fn next_page(&self) -> usize {
        self.state.borrow().next_page
    }

    fn page_nearest_to_center(&self) -> usize {
        let state = self.state.borrow();
        state.nearest.unwrap_or(state.next_page)
    }

    fn task_view_count(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    fn task_id_at(&self, index: usize) -> Option<TaskId> {
        self.state.borrow().tasks.get(index).copied()
    }

    fn task_index_for_id(&self, task_id: TaskId) -> Option<usize> {
        self.state.borrow().tasks.iter().position(|id| *id == task_id)
    }

    fn task_system_ui_flags_at(&self, _index: usize) -> u32 {
        0
    }

    fn snap_to_page(&mut self, page: usize, duration: Duration) {
        self.log.record(format!(
            "recents.snap_to_page({page}, {}ms)",
            duration.as_millis()
        ));
        let mut state = self.state.borrow_mut();
        state.next_page = page;
        state.scroller_duration = duration;
    }

    fn is_page_in_transition(&self) -> bool {
        self.state.borrow().in_transition
    }

    fn scroller_duration(&self) -> Duration {
        self.state.borrow().scroller_duration
    }

    fn compute_scroll(&mut self) {}

    fn on_gesture_animation_start(&mut self, running_task: Option<&RunningTaskInfo>) {
        let id = running_task.map_or(-1, |task| task.task_id);
        self.log
            .record(format!("recents.on_gesture_animation_start({id})"));
    }

    fn on_gesture_animation_end(&mut self) {
        self.log.record("recents.on_gesture_animation_end");
    }

    fn on_swipe_up_animation_success(&mut self) {
        self.log.record("recents.on_swipe_up_animation_success");
    }

    fn update_thumbnail(&mut self, task_id: TaskId, _thumbnail: &ThumbnailData) -> bool {
        self.log.record(format!("recents.update_thumbnail({task_id})"));
        let mut state = self.state.borrow_mut();
        if !state.tasks.contains(&task_id) {
            return false;
        }
        state.thumbnails.push(task_id);
        true
    }

    fn set_running_task_hidden(&mut self, hidden: bool) {
        self.state.borrow_mut().running_hidden = hidden;
    }

    fn reset_task_visuals(&mut self) {
        self.log.record("recents.reset_task_visuals");
    }

    fn show_next_task(&mut self) {
        self.log.record("recents.show_next_task");
    }

    fn start_home(&mut self) {
        self.log.record("recents.start_home");
    }

    fn launch_task(&mut self, index: usize) {
        self.log.record(format!("recents.launch_task({index})"));
    }

    fn request_focus(&mut self, index: Option<usize>) {
        self.log.record(format!("recents.request_focus({index:?})"));
        self.state.borrow_mut().focus = Some(index);
    }
}

pub struct FakeActivity {
    log: CallLog,
    pub state: Rc<RefCell<LauncherState>>,
    recents: FakeRecentsView,
}

impl FakeActivity {
    pub fn new(log: CallLog) -> Self {
        Self {
            recents: FakeRecentsView {
                log: log.clone(),
                state: Rc::default(),
            },
            state: Rc::default(),
            log,
        }
    }

    pub fn recents_state(&self) -> Rc<RefCell<RecentsState>> {
        self.recents.state.clone()
    }
}

impl ActivityInterface for FakeActivity {
    fn created_activity(&self) -> Option<ActivityId> {
        self.state.borrow().created
    }

    fn is_resumed(&self) -> bool {
        self.state.borrow().resumed
    }

    fn has_window_focus(&self) -> bool {
        self.state.borrow().window_focus
    }

    fn is_home_and_overview_same(&self) -> bool {
        self.state.borrow().home_and_overview_same
    }

    fn recents_view(&mut self) -> Option<&mut dyn RecentsView> {
        if self.state.borrow().has_recents_view {
            Some(&mut self.recents)
        } else {
            None
        }
    }

    fn visible_recents_view(&mut self) -> Option<&mut dyn RecentsView> {
        let visible = {
            let state = self.state.borrow();
            state.has_recents_view && state.recents_visible
        };
        if visible {
            Some(&mut self.recents)
        } else {
            None
        }
    }

    fn prepare_recents_ui(&mut self, activity_visible: bool, animate_activity: bool) {
        self.log.record(format!(
            "launcher.prepare_recents_ui({activity_visible}, {animate_activity})"
        ));
    }

    fn set_recents_attached_to_app_window(&mut self, attached: bool, _animate: bool) {
        self.state.borrow_mut().attached_to_app_window = Some(attached);
    }

    fn set_shelf_state(&mut self, state: ShelfState, _duration: Duration) {
        self.state.borrow_mut().shelf = Some(state);
    }

    fn update_overview_prediction_state(&mut self) {}

    fn start_launcher_transition(&mut self, _drag_length: f64) {
        self.log.record("launcher.start_launcher_transition");
    }

    fn set_launcher_transition_progress(&mut self, _progress: f64) {}

    fn end_launcher_transition(&mut self) {
        self.log.record("launcher.end_launcher_transition");
    }

    fn on_launcher_transition_cancelled(&mut self) {
        self.log.record("launcher.on_launcher_transition_cancelled");
    }

    fn on_swipe_up_to_recents_complete(&mut self) {
        self.log.record("launcher.on_swipe_up_to_recents_complete");
    }

    fn on_swipe_up_to_home_complete(&mut self) {
        self.log.record("launcher.on_swipe_up_to_home_complete");
    }

    fn on_transition_cancelled(&mut self, activity_visible: bool) {
        self.log
            .record(format!("launcher.on_transition_cancelled({activity_visible})"));
    }

    fn on_launch_task_success(&mut self) {
        self.log.record("launcher.on_launch_task_success");
    }

    fn on_launch_task_failed(&mut self) {
        self.log.record("launcher.on_launch_task_failed");
    }

    fn update_overview_system_ui_flags(&mut self, _flags: u32) {}

    fn switch_to_recents_if_visible(&mut self) -> bool {
        self.log.record("launcher.switch_to_recents_if_visible");
        self.state.borrow().switch_to_recents_succeeds
    }

    fn start_overview(&mut self) {
        self.log.record("launcher.start_overview");
    }

    fn add_force_invisible_flag(&mut self, flags: InvisibilityFlags) {
        self.state.borrow_mut().invisible |= flags;
    }

    fn clear_force_invisible_flag(&mut self, flags: InvisibilityFlags) {
        self.state.borrow_mut().invisible -= flags;
    }

    fn dispatch_overview_touch(&mut self, event: &MotionEvent) {
        self.log
            .record(format!("launcher.dispatch_overview_touch({})", event.action));
    }

    fn perform_haptic_feedback(&mut self) {
        self.log.record("launcher.perform_haptic_feedback");
    }

    fn show_toast(&mut self, message: &str) {
        self.state.borrow_mut().toasts.push(message.to_owned());
    }
}
