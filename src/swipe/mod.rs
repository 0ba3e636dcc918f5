//! Per-gesture controller for a swipe up from an app.
//!
//! The handler owns the gesture's [`GestureState`], tracks launcher readiness with its own flag
//! engine, reacts to the recents animation lifecycle, and settles the swipe on an end target once
//! the finger lifts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use calloop::channel::Sender;
use quickstep_config::Config;
use tracing::{debug, trace, warn};

pub mod end_target;
pub mod release;
pub mod window_anim;

use self::end_target::{calculate_end_target, EndTargetParams};
use self::release::{
    settle_recents_scroll, ReleaseAnimation, ReleaseParams, MIN_PROGRESS_FOR_OVERVIEW,
};
use self::window_anim::{RunningWindowAnim, WindowAnimEnd, WindowAnimKind};
use crate::activity::{ActivityId, ActivityInterface, InvisibilityFlags, ShelfState};
use crate::animation::{Animation, Clock, SpringParams};
use crate::executor::BackgroundExecutor;
use crate::gesture_state::{GestureEndTarget, GestureFlags, GestureId, GestureState};
use crate::motion::MotionEvent;
use crate::multi_state::{FlagNames, MultiStateCallback};
use crate::recents_animation::{
    FinishOutcome, RecentsAnimationController, RecentsAnimationTargets, RecentsAnimationWrapper,
    RecentsDispatch,
};
use crate::service::shared_state::SwipeSharedState;
use crate::system::os::{
    ActivityType, OsServices, RemoteAnimationTarget, RunningTaskInfo, TaskId, ThumbnailData,
};
use crate::system::DeviceState;
use crate::utils::{EventLog, Point};

const SHELF_ANIM_DURATION: Duration = Duration::from_millis(240);
/// Once the window is this far into the swipe, the launcher drives the system bars.
const UPDATE_SYSUI_FLAGS_THRESHOLD: f64 = 0.85;

bitflags! {
    /// Launcher readiness and gesture progress, as seen by one swipe handler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HandlerFlags: u16 {
        const LAUNCHER_PRESENT = 1;
        const LAUNCHER_STARTED = 1 << 1;
        const LAUNCHER_DRAWN = 1 << 2;
        const APP_CONTROLLER_RECEIVED = 1 << 3;
        const SCALED_CONTROLLER_HOME = 1 << 4;
        const SCALED_CONTROLLER_RECENTS = 1 << 5;
        const HANDLER_INVALIDATED = 1 << 6;
        const GESTURE_STARTED = 1 << 7;
        const GESTURE_CANCELLED = 1 << 8;
        const GESTURE_COMPLETED = 1 << 9;
        const CAPTURE_SCREENSHOT = 1 << 10;
        const SCREENSHOT_CAPTURED = 1 << 11;
        const SCREENSHOT_VIEW_SHOWN = 1 << 12;
        const RESUME_LAST_TASK = 1 << 13;
        const START_NEW_TASK = 1 << 14;
        const CURRENT_TASK_FINISHED = 1 << 15;
    }
}

impl HandlerFlags {
    /// Flags tied to one launcher activity instance.
    pub const LAUNCHER_UI: Self = Self::LAUNCHER_PRESENT
        .union(Self::LAUNCHER_STARTED)
        .union(Self::LAUNCHER_DRAWN);
}

/// Work registered on the handler and gesture flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerAction {
    OnLauncherPresentAndGestureStarted,
    InitializeLauncherAnimationController,
    LauncherFrameDrawn,
    ResetStateForAnimationCancel,
    ResumeLastTask,
    StartNewTask,
    SwitchToScreenshot,
    FinishCurrentTransitionToRecents,
    FinishCurrentTransitionToHome,
    Reset,
    SetupLauncherUiAfterSwipeUpToRecents,
    ContinueComputingRecentsScroll,
    OnSettledOnEndTarget,
    InvalidateHandler,
    InvalidateHandlerWithLauncher,
    NotifyTransitionCancelled,
    EnableInputConsumer,
    EndTargetCalculated,
    PrepareRecentsUi,
    AnimateToProgress,
    RunningTaskHidden(bool),
}

/// Input from the swipe consumer that drives the handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandlerInput {
    GestureStarted {
        likely_to_start_new_task: bool,
    },
    /// Displacement along the swipe axis in px, negative when moving up.
    Displacement(f64),
    MotionPauseChanged(bool),
    LikelyToStartNewTask(bool),
    GestureCancelled,
    GestureEnded {
        /// Velocity along the swipe axis in px/s.
        end_velocity: f64,
        velocity: Point,
        down_pos: Point,
    },
    Reset,
}

/// Results posted back to the UI loop from the background executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerMsg {
    TaskLaunched {
        gesture: GestureId,
        task_id: TaskId,
        success: bool,
        previously_appeared: bool,
    },
}

impl HandlerMsg {
    pub fn gesture(&self) -> GestureId {
        match self {
            HandlerMsg::TaskLaunched { gesture, .. } => *gesture,
        }
    }
}

/// Everything a handler reaches outside itself, borrowed from the service for one call.
pub struct HandlerContext<'a> {
    pub config: &'a Config,
    pub clock: &'a Clock,
    pub device: &'a DeviceState,
    pub os: &'a OsServices,
    pub executor: &'a BackgroundExecutor,
    pub activity: &'a mut dyn ActivityInterface,
    pub shared: &'a mut SwipeSharedState,
    pub log: &'a mut EventLog,
    pub handler_tx: &'a Sender<HandlerMsg>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRelease {
    release: ReleaseAnimation,
    target: GestureEndTarget,
    velocity: Point,
}

pub struct SwipeUpHandler {
    gesture: GestureState<HandlerAction>,
    state: MultiStateCallback<HandlerFlags, HandlerAction>,
    wrapper: RecentsAnimationWrapper<HandlerAction>,
    /// The running recents animation, until it finishes or is cancelled.
    animation: Option<(RecentsAnimationController, Arc<RecentsAnimationTargets>)>,
    /// Flags to set once the requested finish completes.
    pending_finish: HandlerFlags,
    pending_release: Option<PendingRelease>,
    window_anim: Option<RunningWindowAnim>,

    activity: Option<ActivityId>,
    activity_init_registered: bool,
    awaiting_launcher_start: bool,
    awaiting_first_draw: bool,
    screenshot_on_draw: bool,
    awaiting_page_transition_end: bool,
    computing_recents_scroll: bool,
    restart_listener_registered: bool,
    input_proxy_enabled: bool,
    launcher_transition_active: bool,

    was_launcher_already_visible: bool,
    continuing_last_gesture: bool,
    gesture_started: bool,
    canceled: bool,
    is_shelf_peeking: bool,
    likely_to_start_new_task: bool,
    passed_overview_threshold: bool,
    finishing_new_task_id: Option<TaskId>,
    task_snapshot: Option<ThumbnailData>,

    current_shift: f64,
    transition_drag_length: f64,
    drag_length_factor: f64,
    touch_time: Duration,
    down_pos: Point,
    ended: bool,
}

impl SwipeUpHandler {
    pub fn new(
        mut gesture: GestureState<HandlerAction>,
        config: &Config,
        touch_time: Duration,
        continuing_last_gesture: bool,
    ) -> Self {
        for (mask, action) in [
            (
                GestureFlags::END_TARGET_ANIMATION_FINISHED,
                HandlerAction::ContinueComputingRecentsScroll,
            ),
            (
                GestureFlags::END_TARGET_ANIMATION_FINISHED
                    | GestureFlags::RECENTS_SCROLLING_FINISHED,
                HandlerAction::OnSettledOnEndTarget,
            ),
        ] {
            let fired = gesture.run_once_at_state(mask, action);
            debug_assert!(fired.is_none(), "gesture reached its end before the handler existed");
        }

        Self {
            gesture,
            state: state_callbacks(),
            wrapper: RecentsAnimationWrapper::new(),
            animation: None,
            pending_finish: HandlerFlags::empty(),
            pending_release: None,
            window_anim: None,
            activity: None,
            activity_init_registered: false,
            awaiting_launcher_start: false,
            awaiting_first_draw: false,
            screenshot_on_draw: false,
            awaiting_page_transition_end: false,
            computing_recents_scroll: false,
            restart_listener_registered: false,
            input_proxy_enabled: false,
            launcher_transition_active: false,
            was_launcher_already_visible: false,
            continuing_last_gesture,
            gesture_started: false,
            canceled: false,
            is_shelf_peeking: false,
            likely_to_start_new_task: false,
            passed_overview_threshold: false,
            finishing_new_task_id: None,
            task_snapshot: None,
            current_shift: 0.,
            transition_drag_length: config.gestures.transition_drag_length.0,
            drag_length_factor: config.gestures.drag_length_factor.0,
            touch_time,
            down_pos: Point::default(),
            ended: false,
        }
    }

    pub fn id(&self) -> GestureId {
        self.gesture.id()
    }

    pub fn gesture(&self) -> &GestureState<HandlerAction> {
        &self.gesture
    }

    /// Gives up the gesture record, for a later gesture to continue from.
    pub fn into_gesture(self) -> GestureState<HandlerAction> {
        self.gesture
    }

    pub fn flags(&self) -> HandlerFlags {
        self.state.state()
    }

    pub fn current_shift(&self) -> f64 {
        self.current_shift
    }

    #[cfg(test)]
    pub(crate) fn gesture_mut(&mut self) -> &mut GestureState<HandlerAction> {
        &mut self.gesture
    }

    #[cfg(test)]
    pub(crate) fn recents_controller(&self) -> Option<&RecentsAnimationController> {
        self.animation.as_ref().map(|(controller, _)| controller)
    }

    /// Whether the handler is done and its gesture end callback should run.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Whether touches on the system input consumer belong to this handler.
    pub fn wants_input_proxy_events(&self) -> bool {
        self.input_proxy_enabled
    }

    pub fn has_window_anim(&self) -> bool {
        self.window_anim.is_some()
    }

    fn has_targets(&self) -> bool {
        self.animation
            .as_ref()
            .is_some_and(|(_, targets)| targets.has_targets())
    }

    // =========================================================================
    // Flags and actions
    // =========================================================================

    fn set_state(&mut self, ctx: &mut HandlerContext<'_>, flags: HandlerFlags) {
        let fired = self.state.set_state(flags);
        self.run_actions(ctx, fired);
    }

    fn set_gesture_state(&mut self, ctx: &mut HandlerContext<'_>, flags: GestureFlags) {
        let fired = self.gesture.set_state(flags);
        self.run_actions(ctx, fired);
    }

    fn set_end_target(&mut self, ctx: &mut HandlerContext<'_>, target: GestureEndTarget) {
        ctx.log
            .add_with(ctx.clock.now(), "setEndTarget", target.name());
        let fired = self.gesture.set_end_target(target, false);
        self.run_actions(ctx, fired);
    }

    fn run_actions(&mut self, ctx: &mut HandlerContext<'_>, actions: Vec<HandlerAction>) {
        for action in actions {
            self.run(ctx, action);
        }
    }

    fn run(&mut self, ctx: &mut HandlerContext<'_>, action: HandlerAction) {
        trace!("gesture {}: {action:?}", self.id());

        match action {
            HandlerAction::OnLauncherPresentAndGestureStarted => {
                self.on_launcher_present_and_gesture_started(ctx)
            }
            HandlerAction::InitializeLauncherAnimationController => {
                self.build_animation_controller(ctx)
            }
            HandlerAction::LauncherFrameDrawn => {
                let elapsed = ctx.clock.now().saturating_sub(self.touch_time);
                debug!("gesture {}: launcher drawn {elapsed:?} after touch", self.id());
                ctx.log.add(ctx.clock.now(), "launcherFrameDrawn");
            }
            HandlerAction::ResetStateForAnimationCancel => {
                let was_visible = self.was_launcher_already_visible || self.gesture_started;
                ctx.activity.on_transition_cancelled(was_visible);
                // The pending flag may still be used by the wallpaper open animation.
                ctx.activity
                    .clear_force_invisible_flag(InvisibilityFlags::BY_STATE_HANDLER);
            }
            HandlerAction::ResumeLastTask => {
                self.finish_recents_animation(ctx, false, false, HandlerFlags::empty());
                self.reset(ctx);
            }
            HandlerAction::StartNewTask => self.start_new_task(ctx),
            HandlerAction::SwitchToScreenshot => self.switch_to_screenshot(ctx),
            HandlerAction::FinishCurrentTransitionToRecents => {
                if self.has_targets() {
                    self.finish_recents_animation(
                        ctx,
                        true,
                        false,
                        HandlerFlags::CURRENT_TASK_FINISHED,
                    );
                } else {
                    self.set_state(ctx, HandlerFlags::CURRENT_TASK_FINISHED);
                }
            }
            HandlerAction::FinishCurrentTransitionToHome => {
                if self.has_targets() {
                    self.finish_recents_animation(
                        ctx,
                        true,
                        true,
                        HandlerFlags::CURRENT_TASK_FINISHED,
                    );
                } else {
                    self.set_state(ctx, HandlerFlags::CURRENT_TASK_FINISHED);
                }
            }
            HandlerAction::Reset => self.reset(ctx),
            HandlerAction::SetupLauncherUiAfterSwipeUpToRecents => {
                self.setup_launcher_ui_after_swipe_up_to_recents(ctx)
            }
            HandlerAction::ContinueComputingRecentsScroll => {
                self.computing_recents_scroll = true;
                self.continue_computing_recents_scroll(ctx);
            }
            HandlerAction::OnSettledOnEndTarget => self.on_settled_on_end_target(ctx),
            HandlerAction::InvalidateHandler => self.invalidate_handler(ctx),
            HandlerAction::InvalidateHandlerWithLauncher => {
                self.end_launcher_transition_controller(ctx);
                if let Some(recents) = ctx.activity.recents_view() {
                    recents.on_gesture_animation_end();
                }
            }
            HandlerAction::NotifyTransitionCancelled => {
                ctx.activity.on_launcher_transition_cancelled();
            }
            HandlerAction::EnableInputConsumer => self.wrapper.enable_input_consumer(),
            HandlerAction::EndTargetCalculated => {
                if let Some(target) = self.gesture.end_target() {
                    ctx.log
                        .add_with(ctx.clock.now(), "onEndTargetCalculated", target.name());
                }
            }
            HandlerAction::PrepareRecentsUi => {
                ctx.activity
                    .prepare_recents_ui(self.was_launcher_already_visible, true);
                self.maybe_update_recents_attached_state(ctx, false);
            }
            HandlerAction::AnimateToProgress => self.animate_to_progress_internal(ctx),
            HandlerAction::RunningTaskHidden(hidden) => {
                if let Some(recents) = ctx.activity.recents_view() {
                    recents.set_running_task_hidden(hidden);
                }
            }
        }
    }

    fn reset(&mut self, ctx: &mut HandlerContext<'_>) {
        self.set_state(ctx, HandlerFlags::HANDLER_INVALIDATED);
    }

    // =========================================================================
    // Launcher activity
    // =========================================================================

    /// Starts listening for the launcher activity, initializing right away if it exists.
    pub fn init_when_ready(&mut self, ctx: &mut HandlerContext<'_>) {
        self.activity_init_registered = true;
        if ctx.activity.created_activity().is_some() {
            let already_on_home = ctx.activity.is_resumed();
            self.on_activity_init(ctx, already_on_home);
        }
    }

    pub fn on_activity_created(&mut self, ctx: &mut HandlerContext<'_>, already_on_home: bool) {
        if self.activity_init_registered {
            self.on_activity_init(ctx, already_on_home);
        }
    }

    fn on_activity_init(&mut self, ctx: &mut HandlerContext<'_>, already_on_home: bool) {
        let Some(activity) = ctx.activity.created_activity() else {
            return;
        };
        if self.activity == Some(activity) {
            return;
        }

        if let Some(old) = self.activity {
            debug!("gesture {}: launcher recreated ({old} -> {activity})", self.id());
            let fired = self.state.clear_state(HandlerFlags::LAUNCHER_UI);
            self.run_actions(ctx, fired);
            let remaining = self.state.state();
            self.state = state_callbacks();
            self.set_state(ctx, remaining);
        }

        self.was_launcher_already_visible = already_on_home;
        self.activity = Some(activity);

        // Keep the launcher hidden until the gesture starts or the home animation takes over.
        if already_on_home {
            ctx.activity
                .clear_force_invisible_flag(InvisibilityFlags::STATE_HANDLER);
        } else {
            ctx.activity
                .add_force_invisible_flag(InvisibilityFlags::STATE_HANDLER);
        }
        self.awaiting_page_transition_end = false;

        self.set_state(ctx, HandlerFlags::LAUNCHER_PRESENT);
        if already_on_home {
            self.on_launcher_start(ctx);
        } else {
            self.awaiting_launcher_start = true;
        }

        self.setup_recents_view_ui(ctx);
        if ctx.device.mode() == crate::system::NavigationMode::TwoButtons {
            ctx.activity.update_overview_prediction_state();
        }
    }

    pub fn on_launcher_started(&mut self, ctx: &mut HandlerContext<'_>) {
        if std::mem::take(&mut self.awaiting_launcher_start) {
            self.on_launcher_start(ctx);
        }
    }

    fn on_launcher_start(&mut self, ctx: &mut HandlerContext<'_>) {
        if self.activity.is_none() || self.activity != ctx.activity.created_activity() {
            return;
        }
        if self.state.has_states(HandlerFlags::HANDLER_INVALIDATED) {
            return;
        }

        // Going home already: preparing recents now would fight the home animation.
        if self.gesture.end_target() != Some(GestureEndTarget::Home) {
            if self.was_launcher_already_visible {
                // The launcher may be about to stop, which would undo the preparation. Wait for
                // the gesture to actually start.
                if let Some(action) = self
                    .state
                    .run_once_at_state(HandlerFlags::GESTURE_STARTED, HandlerAction::PrepareRecentsUi)
                {
                    self.run(ctx, action);
                }
            } else {
                self.run(ctx, HandlerAction::PrepareRecentsUi);
            }
        }

        if self.was_launcher_already_visible {
            self.set_state(ctx, HandlerFlags::LAUNCHER_DRAWN);
        } else {
            self.awaiting_first_draw = true;
        }
        self.set_state(ctx, HandlerFlags::LAUNCHER_STARTED);
    }

    /// A launcher frame was drawn.
    pub fn on_launcher_frame_drawn(&mut self, ctx: &mut HandlerContext<'_>) {
        if std::mem::take(&mut self.awaiting_first_draw) {
            self.set_state(ctx, HandlerFlags::LAUNCHER_DRAWN);
        }
        if std::mem::take(&mut self.screenshot_on_draw) && !self.canceled {
            self.set_state(ctx, HandlerFlags::SCREENSHOT_CAPTURED);
        }
    }

    pub fn on_page_transition_end(&mut self, ctx: &mut HandlerContext<'_>) {
        if std::mem::take(&mut self.awaiting_page_transition_end) {
            self.set_gesture_state(ctx, GestureFlags::RECENTS_SCROLLING_FINISHED);
        }
    }

    /// The OS tried to bring an already running activity to front.
    pub fn on_activity_restart_attempt(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        task: &RunningTaskInfo,
    ) {
        if !self.restart_listener_registered {
            return;
        }
        if Some(task.task_id) != self.gesture.running_task_id() || task.is_home() {
            return;
        }

        // Rare enough to simply cancel and relaunch without any launch animation.
        debug!("gesture {}: running task {} restarted", self.id(), task.task_id);
        self.end_running_window_anim(ctx, true);
        self.restart_listener_registered = false;

        let task_id = task.task_id;
        let activity_manager = ctx.os.activity_manager.clone();
        ctx.executor.execute(move || {
            if !activity_manager.start_activity_from_recents(task_id) {
                warn!("error relaunching restarted task {task_id}");
            }
        });
    }

    fn on_launcher_present_and_gesture_started(&mut self, ctx: &mut HandlerContext<'_>) {
        // A previous window transition may have changed the recents UI since it was set up.
        self.setup_recents_view_ui(ctx);

        if let Some(action) = self
            .gesture
            .run_once_at_state(GestureFlags::END_TARGET_SET, HandlerAction::EndTargetCalculated)
        {
            self.run(ctx, action);
        }

        self.notify_gesture_started(ctx);
    }

    fn notify_gesture_started(&mut self, ctx: &mut HandlerContext<'_>) {
        // Once the gesture starts, home can no longer be reached through the button.
        if self.activity.is_some() {
            ctx.activity
                .clear_force_invisible_flag(InvisibilityFlags::STATE_HANDLER);
        }
    }

    fn setup_recents_view_ui(&mut self, ctx: &mut HandlerContext<'_>) {
        if self.continuing_last_gesture {
            self.update_sys_ui_flags(ctx, self.current_shift);
            return;
        }
        if let Some(recents) = ctx.activity.recents_view() {
            recents.on_gesture_animation_start(self.gesture.running_task());
        }
    }

    fn build_animation_controller(&mut self, ctx: &mut HandlerContext<'_>) {
        if self.gesture.end_target() == Some(GestureEndTarget::Home)
            || self.launcher_transition_active
        {
            return;
        }

        ctx.activity
            .start_launcher_transition(self.transition_drag_length);
        self.launcher_transition_active = true;
        self.update_launcher_transition_progress(ctx);
    }

    fn update_launcher_transition_progress(&mut self, ctx: &mut HandlerContext<'_>) {
        if !self.launcher_transition_active
            || self.gesture.end_target() == Some(GestureEndTarget::Home)
        {
            return;
        }
        ctx.activity
            .set_launcher_transition_progress(self.current_shift / self.drag_length_factor);
    }

    fn end_launcher_transition_controller(&mut self, ctx: &mut HandlerContext<'_>) {
        if std::mem::take(&mut self.launcher_transition_active) {
            ctx.activity.end_launcher_transition();
        }
    }

    // =========================================================================
    // Recents animation
    // =========================================================================

    /// Delivers a recents animation event to the gesture state, then to the handler.
    pub fn on_recents_dispatch(&mut self, ctx: &mut HandlerContext<'_>, dispatch: RecentsDispatch) {
        match dispatch {
            RecentsDispatch::Start {
                controller,
                targets,
            } => {
                let fired = self.gesture.on_recents_animation_start();
                self.run_actions(ctx, fired);
                self.on_recents_animation_start(ctx, controller, targets);
            }
            RecentsDispatch::Canceled(thumbnails) => {
                let fired = self.gesture.on_recents_animation_canceled(thumbnails);
                self.run_actions(ctx, fired);
                self.on_recents_animation_canceled(ctx);
            }
            RecentsDispatch::TasksAppeared(apps) => {
                if let Some(first) = apps.first() {
                    self.gesture.update_last_appeared_task(first.task_id);
                }
                self.on_tasks_appeared(ctx, &apps);
            }
            RecentsDispatch::Finished(controller) => {
                let fired = self.gesture.on_recents_animation_finished();
                self.run_actions(ctx, fired);
                self.on_recents_animation_finished(ctx, &controller);
            }
        }
    }

    fn on_recents_animation_start(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        controller: RecentsAnimationController,
        targets: Arc<RecentsAnimationTargets>,
    ) {
        ctx.log.add_with(
            ctx.clock.now(),
            "startRecentsAnimationCallback",
            targets.apps.len(),
        );

        self.animation = Some((controller.clone(), targets.clone()));
        let deferred = self.wrapper.set_controller(Some((controller, targets)));
        self.run_actions(ctx, deferred);

        // Only now that there is a controller to enable it on.
        if let Some(action) = self.state.run_once_at_state(
            HandlerFlags::APP_CONTROLLER_RECEIVED | HandlerFlags::GESTURE_STARTED,
            HandlerAction::EnableInputConsumer,
        ) {
            self.run(ctx, action);
        }
        self.set_state(ctx, HandlerFlags::APP_CONTROLLER_RECEIVED);
        self.passed_overview_threshold = false;
    }

    fn on_recents_animation_canceled(&mut self, ctx: &mut HandlerContext<'_>) {
        ctx.log.add(ctx.clock.now(), "cancelRecentsAnimation");
        self.activity_init_registered = false;

        if let Some(thumbnails) = self.gesture.consume_canceled_thumbnails() {
            if let (Some(task_id), Some(recents)) =
                (self.gesture.running_task_id(), ctx.activity.recents_view())
            {
                if let Some(thumbnail) = thumbnails.get(&task_id) {
                    recents.update_thumbnail(task_id, thumbnail);
                }
            }
        }

        self.set_state(
            ctx,
            HandlerFlags::GESTURE_CANCELLED | HandlerFlags::HANDLER_INVALIDATED,
        );

        // Cleared only after the state above has been handled.
        self.animation = None;
        self.wrapper.set_controller(None);
    }

    fn on_recents_animation_finished(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        controller: &RecentsAnimationController,
    ) {
        let ours = self
            .animation
            .as_ref()
            .is_some_and(|(current, _)| current.ptr_eq(controller));
        if !ours {
            debug!("gesture {}: ignoring finish of {}", self.id(), controller.id());
            return;
        }

        let pending = std::mem::replace(&mut self.pending_finish, HandlerFlags::empty());
        self.set_state(ctx, pending);
        self.animation = None;
    }

    fn on_tasks_appeared(&mut self, ctx: &mut HandlerContext<'_>, apps: &[RemoteAnimationTarget]) {
        let Some(first) = apps.first() else {
            return;
        };
        if self.animation.is_none() {
            return;
        }

        if self.handle_task_appeared(ctx, first) {
            self.finish_recents_animation(ctx, false, false, HandlerFlags::empty());
            ctx.activity.on_launch_task_success();
        }
    }

    fn handle_task_appeared(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        appeared: &RemoteAnimationTarget,
    ) -> bool {
        if self.state.has_states(HandlerFlags::HANDLER_INVALIDATED) {
            return false;
        }
        if self.state.has_states(HandlerFlags::START_NEW_TASK)
            && Some(appeared.task_id) == self.gesture.last_started_task_id()
        {
            self.reset(ctx);
            return true;
        }
        false
    }

    /// Asks the wrapper to finish, setting `on_finished` once the finish completes.
    fn finish_recents_animation(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        to_recents: bool,
        to_home: bool,
        on_finished: HandlerFlags,
    ) {
        ctx.log
            .add_with(ctx.clock.now(), "finishRecentsAnimation", to_recents);

        let outcome = if to_home {
            self.wrapper.finish_with_hint(true, true)
        } else {
            self.wrapper.finish(to_recents)
        };

        match outcome {
            FinishOutcome::Finishing => self.pending_finish |= on_finished,
            FinishOutcome::Deferred | FinishOutcome::NoController => {
                self.set_state(ctx, on_finished)
            }
        }
    }

    /// Handles a touch on the system input consumer while the animation settles.
    ///
    /// Returns `false` if the handler does not take such touches.
    pub fn on_input_proxy_event(&mut self, ctx: &mut HandlerContext<'_>, event: &MotionEvent) -> bool {
        if !self.input_proxy_enabled {
            return false;
        }

        let result = self.wrapper.on_input_consumer_motion(event);
        if result.proxy_created {
            let cancel = self.gesture.end_target() == Some(GestureEndTarget::Home);
            self.end_running_window_anim(ctx, cancel);
            self.end_launcher_transition_controller(ctx);
        }
        if result.finished {
            debug!("gesture {}: deferred finish flushed", self.id());
        }

        ctx.activity.dispatch_overview_touch(event);
        true
    }

    // =========================================================================
    // Gesture input
    // =========================================================================

    pub fn handle_input(&mut self, ctx: &mut HandlerContext<'_>, input: HandlerInput) {
        let _span = tracy_client::span!("SwipeUpHandler::handle_input");

        match input {
            HandlerInput::GestureStarted {
                likely_to_start_new_task,
            } => {
                self.notify_gesture_started(ctx);
                self.set_is_likely_to_start_new_task(ctx, likely_to_start_new_task, false);
                self.set_state(ctx, HandlerFlags::GESTURE_STARTED);
                self.gesture_started = true;
            }
            HandlerInput::Displacement(displacement) => {
                self.update_displacement(displacement);
                self.update_final_shift(ctx);
            }
            HandlerInput::MotionPauseChanged(paused) => {
                let state = if paused {
                    ShelfState::Peek
                } else {
                    ShelfState::Hide
                };
                self.set_shelf_state(ctx, state, SHELF_ANIM_DURATION);
            }
            HandlerInput::LikelyToStartNewTask(likely) => {
                self.set_is_likely_to_start_new_task(ctx, likely, true);
            }
            HandlerInput::GestureCancelled => {
                self.update_displacement(0.);
                self.update_final_shift(ctx);
                self.set_state(ctx, HandlerFlags::GESTURE_COMPLETED);
                self.handle_normal_gesture_end(ctx, 0., false, Point::default(), true);
            }
            HandlerInput::GestureEnded {
                end_velocity,
                velocity,
                down_pos,
            } => {
                let is_fling = self.gesture_started
                    && end_velocity.abs() > ctx.config.gestures.fling_threshold_velocity.0;
                self.set_state(ctx, HandlerFlags::GESTURE_COMPLETED);

                let direction = if velocity.y.abs() > velocity.x.abs() {
                    if velocity.y < 0. {
                        "UP"
                    } else {
                        "DOWN"
                    }
                } else if velocity.x < 0. {
                    "LEFT"
                } else {
                    "RIGHT"
                };
                let action = if is_fling { "FLING" } else { "SWIPE" };
                ctx.log.add_with(
                    ctx.clock.now(),
                    "onGestureEnded",
                    format_args!("{action} {direction} from {down_pos}"),
                );

                self.down_pos = down_pos;
                self.handle_normal_gesture_end(ctx, end_velocity, is_fling, velocity, false);
            }
            HandlerInput::Reset => self.reset(ctx),
        }
    }

    fn update_displacement(&mut self, displacement: f64) {
        // Swiping moves in the negative direction.
        let displacement = -displacement;
        let drag_length = self.transition_drag_length;

        self.current_shift = if drag_length > 0. && displacement > drag_length * self.drag_length_factor
        {
            self.drag_length_factor
        } else if drag_length == 0. {
            0.
        } else {
            displacement.max(0.) / drag_length
        };
    }

    fn update_final_shift(&mut self, ctx: &mut HandlerContext<'_>) {
        let passed = self.current_shift >= MIN_PROGRESS_FOR_OVERVIEW;
        if passed != self.passed_overview_threshold {
            self.passed_overview_threshold = passed;
            if !ctx.device.is_fully_gestural() {
                ctx.activity.perform_haptic_feedback();
            }
        }

        self.update_sys_ui_flags(ctx, self.current_shift);
        self.update_launcher_transition_progress(ctx);
    }

    fn update_sys_ui_flags(&mut self, ctx: &mut HandlerContext<'_>, window_progress: f64) {
        let Some((controller, _)) = &self.animation else {
            return;
        };
        let Some(recents) = ctx.activity.recents_view() else {
            return;
        };

        let running = recents.running_task_index();
        let nearest = recents.page_nearest_to_center();
        let centermost_flags = if nearest < recents.task_view_count() {
            recents.task_system_ui_flags_at(nearest)
        } else {
            0
        };

        let swipe_up_passed = window_progress > 1. - UPDATE_SYSUI_FLAGS_THRESHOLD;
        let quick_switch_passed = running != Some(nearest);

        // The centermost task decides the system bars once it is not the running one.
        self.wrapper
            .set_window_threshold_crossed(swipe_up_passed || (quick_switch_passed && centermost_flags != 0));
        controller.set_split_screen_minimized(swipe_up_passed);
        ctx.activity
            .update_overview_system_ui_flags(if swipe_up_passed { 0 } else { centermost_flags });
    }

    fn set_shelf_state(&mut self, ctx: &mut HandlerContext<'_>, state: ShelfState, duration: Duration) {
        ctx.activity.set_shelf_state(state, duration);

        let was_peeking = self.is_shelf_peeking;
        self.is_shelf_peeking = state == ShelfState::Peek;
        if self.is_shelf_peeking != was_peeking {
            self.maybe_update_recents_attached_state(ctx, true);
        }

        if matches!(state, ShelfState::Peek | ShelfState::Hide) {
            ctx.activity.perform_haptic_feedback();
        }
    }

    fn set_is_likely_to_start_new_task(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        likely: bool,
        animate: bool,
    ) {
        if self.likely_to_start_new_task != likely {
            self.likely_to_start_new_task = likely;
            self.maybe_update_recents_attached_state(ctx, animate);
        }
    }

    fn maybe_update_recents_attached_state(&mut self, ctx: &mut HandlerContext<'_>, animate: bool) {
        if !ctx.device.is_fully_gestural() {
            return;
        }

        let running_target_not_in_recents = self
            .gesture
            .running_task_id()
            .and_then(|id| {
                self.animation
                    .as_ref()
                    .and_then(|(_, targets)| targets.find_task(id))
            })
            .is_some_and(|target| target.activity_type == ActivityType::Home);

        let Some(recents) = ctx.activity.recents_view() else {
            return;
        };
        let scrolled_off_running =
            recents.running_task_index() != Some(recents.next_page());

        let attached = if let Some(target) = self.gesture.end_target() {
            target.recents_attached_to_app_window()
        } else if self.continuing_last_gesture && scrolled_off_running {
            true
        } else if running_target_not_in_recents {
            // The window is going away, so recents must show.
            true
        } else {
            self.is_shelf_peeking || self.likely_to_start_new_task
        };

        ctx.activity
            .set_recents_attached_to_app_window(attached, animate);
    }

    // =========================================================================
    // Release
    // =========================================================================

    fn calculate_end_target(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        velocity: Point,
        end_velocity: f64,
        is_fling: bool,
        is_cancel: bool,
    ) -> GestureEndTarget {
        let has_targets = self.has_targets();
        let going_to_new_task = match ctx.activity.recents_view() {
            None => false,
            // Without targets this continues a gesture whose animation already finished.
            Some(_) if !has_targets => true,
            Some(recents) => recents
                .running_task_index()
                .is_some_and(|running| recents.next_page() != running),
        };

        calculate_end_target(&EndTargetParams {
            velocity,
            end_velocity,
            is_fling,
            is_cancel,
            fully_gestural: ctx.device.is_fully_gestural(),
            is_shelf_peeking: self.is_shelf_peeking,
            going_to_new_task,
            reached_overview_threshold: self.current_shift >= MIN_PROGRESS_FOR_OVERVIEW,
            gesture_started: self.gesture_started,
            overview_disabled: ctx.device.is_overview_disabled(),
        })
    }

    fn handle_normal_gesture_end(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        end_velocity: f64,
        is_fling: bool,
        velocity: Point,
        is_cancel: bool,
    ) {
        let target = self.calculate_end_target(ctx, velocity, end_velocity, is_fling, is_cancel);
        debug!("gesture {}: released toward {target}", self.id());

        let gestures = &ctx.config.gestures;
        let mut release = ReleaseAnimation::compute(&ReleaseParams {
            target,
            current_shift: self.current_shift,
            velocity,
            end_velocity,
            is_fling,
            fully_gestural: ctx.device.is_fully_gestural(),
            transition_drag_length: self.transition_drag_length,
            drag_length_factor: self.drag_length_factor,
            min_fling_velocity: gestures.fling_min_velocity.0,
            single_frame_ms: f64::from(gestures.single_frame_ms),
        });

        if target.is_launcher() {
            self.input_proxy_enabled = true;
        }

        match target {
            GestureEndTarget::Home => {
                self.set_shelf_state(ctx, ShelfState::Cancel, Duration::ZERO);
            }
            GestureEndTarget::Recents => {
                if let Some(recents) = ctx.activity.recents_view() {
                    release.duration = settle_recents_scroll(recents, release.duration);
                }
                if ctx.device.is_fully_gestural() {
                    self.set_shelf_state(ctx, ShelfState::Overview, release.duration);
                }
            }
            GestureEndTarget::NewTask | GestureEndTarget::LastTask => (),
        }

        // The recents view scrolls to the task that start_new_task or resume_last_task launch.
        let in_transition = ctx
            .activity
            .recents_view()
            .map(|recents| recents.is_page_in_transition());
        match in_transition {
            Some(true) => self.awaiting_page_transition_end = true,
            Some(false) | None => {
                self.set_gesture_state(ctx, GestureFlags::RECENTS_SCROLLING_FINISHED)
            }
        }

        self.pending_release = Some(PendingRelease {
            release,
            target,
            velocity,
        });
        if let Some(action) = self.wrapper.run_on_init(HandlerAction::AnimateToProgress) {
            self.run(ctx, action);
        }
    }

    fn animate_to_progress_internal(&mut self, ctx: &mut HandlerContext<'_>) {
        let Some(PendingRelease {
            release,
            target,
            velocity,
        }) = self.pending_release.take()
        else {
            return;
        };

        self.set_end_target(ctx, target);
        self.maybe_update_recents_attached_state(ctx, true);

        // Watch for the running app relaunching itself while we animate into the launcher.
        if target.is_launcher() {
            self.restart_listener_registered = true;
        }

        let clock = ctx.clock.clone();
        let anim = if target == GestureEndTarget::Home {
            let velocity = if self.transition_drag_length > 0. {
                -velocity.y / self.transition_drag_length
            } else {
                0.
            };
            let params = SpringParams::from(&ctx.config.gestures.home_spring);
            // The home animation replaces the launcher transition driven so far.
            self.launcher_transition_active = false;
            RunningWindowAnim::Home(Animation::spring(clock, release.start, 1., velocity, params))
        } else {
            RunningWindowAnim::Shift(release.animation(clock))
        };
        self.window_anim = Some(anim);
    }

    /// Advances the window animation and any recents scroll by one frame.
    pub fn advance_animations(&mut self, ctx: &mut HandlerContext<'_>) {
        let _span = tracy_client::span!("SwipeUpHandler::advance_animations");

        if let Some(anim) = &self.window_anim {
            let value = anim.value();
            let done = anim.is_done();
            match anim.kind() {
                WindowAnimKind::Shift => {
                    self.current_shift = value;
                    self.update_final_shift(ctx);
                    self.compute_recents_scroll_if_invisible(ctx);
                }
                WindowAnimKind::Home => {
                    let progress = value.max(self.current_shift);
                    self.update_sys_ui_flags(ctx, progress);
                }
            }

            if done {
                self.end_running_window_anim(ctx, false);
            }
        }

        if self.computing_recents_scroll {
            self.continue_computing_recents_scroll(ctx);
        }
    }

    fn continue_computing_recents_scroll(&mut self, ctx: &mut HandlerContext<'_>) {
        let keep_going = !self
            .gesture
            .has_state(GestureFlags::RECENTS_SCROLLING_FINISHED)
            && !self.state.has_states(HandlerFlags::HANDLER_INVALIDATED)
            && !self.canceled;
        if !keep_going {
            self.computing_recents_scroll = false;
            return;
        }
        self.compute_recents_scroll_if_invisible(ctx);
    }

    fn compute_recents_scroll_if_invisible(&mut self, ctx: &mut HandlerContext<'_>) {
        // The window offset depends on the scroll, so it must advance even while hidden.
        if ctx.activity.visible_recents_view().is_some() {
            return;
        }
        if let Some(recents) = ctx.activity.recents_view() {
            recents.compute_scroll();
        }
    }

    fn end_running_window_anim(&mut self, ctx: &mut HandlerContext<'_>, cancel: bool) {
        let Some(anim) = self.window_anim.take() else {
            return;
        };

        match anim.stop(cancel) {
            WindowAnimEnd::Cancelled => {
                debug!("gesture {}: window animation cancelled", self.id());
            }
            WindowAnimEnd::Success { kind, value } => self.on_window_anim_success(ctx, kind, value),
        }
    }

    fn on_window_anim_success(&mut self, ctx: &mut HandlerContext<'_>, kind: WindowAnimKind, value: f64) {
        match kind {
            WindowAnimKind::Home => {
                if let Some(recents) = ctx.activity.recents_view() {
                    recents.reset_task_visuals();
                }
                // Make sure recents ends in its final state.
                self.maybe_update_recents_attached_state(ctx, false);
                ctx.activity.on_swipe_up_to_home_complete();

                // Interrupted animations still end; there is nothing left to do for them.
                if self.animation.is_none() {
                    return;
                }
            }
            WindowAnimKind::Shift => {
                self.current_shift = value;
                self.update_final_shift(ctx);

                if self.animation.is_none() {
                    return;
                }
                self.reconcile_end_target(ctx);
            }
        }

        self.set_gesture_state(ctx, GestureFlags::END_TARGET_ANIMATION_FINISHED);
    }

    /// Swaps NEW_TASK and LAST_TASK when the scroll landed somewhere else than expected.
    fn reconcile_end_target(&mut self, ctx: &mut HandlerContext<'_>) {
        let Some(target) = self.gesture.end_target() else {
            return;
        };
        let last_appeared = self.gesture.last_appeared_task_id();
        let Some(recents) = ctx.activity.recents_view() else {
            return;
        };

        let task_to_launch = recents.next_page();
        let last_appeared_index = match last_appeared {
            Some(task_id) => recents.task_index_for_id(task_id),
            None => recents.running_task_index(),
        };
        let has_started_new_task = self.gesture.last_started_task_id().is_some();

        if target == GestureEndTarget::NewTask
            && last_appeared_index == Some(task_to_launch)
            && !has_started_new_task
        {
            // The scroll came back to the running task.
            self.set_end_target(ctx, GestureEndTarget::LastTask);
        } else if target == GestureEndTarget::LastTask && has_started_new_task {
            // Finishing the controller would resume the last appeared task instead, so relaunch
            // this one as a new task.
            self.set_end_target(ctx, GestureEndTarget::NewTask);
        }
    }

    // =========================================================================
    // Settling
    // =========================================================================

    fn on_settled_on_end_target(&mut self, ctx: &mut HandlerContext<'_>) {
        let Some(target) = self.gesture.end_target() else {
            return;
        };

        match target {
            GestureEndTarget::Home => {
                self.set_state(
                    ctx,
                    HandlerFlags::SCALED_CONTROLLER_HOME | HandlerFlags::CAPTURE_SCREENSHOT,
                );
                let system_ui = ctx.os.system_ui.clone();
                ctx.executor
                    .execute(move || system_ui.notify_swipe_to_home_finished());
            }
            GestureEndTarget::Recents => self.set_state(
                ctx,
                HandlerFlags::SCALED_CONTROLLER_RECENTS
                    | HandlerFlags::CAPTURE_SCREENSHOT
                    | HandlerFlags::SCREENSHOT_VIEW_SHOWN,
            ),
            GestureEndTarget::NewTask => self.set_state(
                ctx,
                HandlerFlags::START_NEW_TASK | HandlerFlags::CAPTURE_SCREENSHOT,
            ),
            GestureEndTarget::LastTask => self.set_state(ctx, HandlerFlags::RESUME_LAST_TASK),
        }

        ctx.log
            .add_with(ctx.clock.now(), "onSettledOnEndTarget", target.name());
    }

    fn switch_to_screenshot(&mut self, ctx: &mut HandlerContext<'_>) {
        if !self.has_targets() {
            // Nothing on screen to capture.
            self.set_state(ctx, HandlerFlags::SCREENSHOT_CAPTURED);
            return;
        }

        let mut posted = false;
        if let Some((controller, _)) = self.animation.clone() {
            let running_task_id = self.gesture.running_task_id();
            if self.task_snapshot.is_none() {
                self.task_snapshot = running_task_id.and_then(|id| controller.screenshot_task(id));
            }

            // Going home still takes the screenshot, in the right orientation, but keeps the
            // thumbnail.
            let updated = self.gesture.end_target() != Some(GestureEndTarget::Home)
                && match (running_task_id, &self.task_snapshot, ctx.activity.recents_view()) {
                    (Some(task_id), Some(snapshot), Some(recents)) => {
                        recents.update_thumbnail(task_id, snapshot)
                    }
                    _ => false,
                };

            if updated && !self.canceled {
                // Finish on the next launcher frame, which shows the new thumbnail.
                self.screenshot_on_draw = true;
                posted = true;
            }
        }

        if !posted {
            self.set_state(ctx, HandlerFlags::SCREENSHOT_CAPTURED);
        }
    }

    fn start_new_task(&mut self, ctx: &mut HandlerContext<'_>) {
        if self.canceled {
            return;
        }

        let next_task = ctx.activity.recents_view().and_then(|recents| {
            let page = recents.next_page();
            recents.task_id_at(page)
        });
        let Some(task_id) = next_task else {
            warn!("gesture {}: no task to launch", self.id());
            self.reset(ctx);
            return;
        };

        self.gesture.update_last_started_task_id(task_id);
        self.finishing_new_task_id = Some(task_id);
        ctx.log.add_with(ctx.clock.now(), "startNewTask", task_id);

        let gesture = self.id();
        let previously_appeared = self
            .gesture
            .previously_appeared_task_ids()
            .contains(&task_id);
        let activity_manager = ctx.os.activity_manager.clone();
        let tx = ctx.handler_tx.clone();
        ctx.executor.execute(move || {
            let success = activity_manager.start_activity_from_recents(task_id);
            let msg = HandlerMsg::TaskLaunched {
                gesture,
                task_id,
                success,
                previously_appeared,
            };
            if tx.send(msg).is_err() {
                warn!("UI loop is gone, dropping launch result of task {task_id}");
            }
        });
    }

    /// Result of the launch started by [`HandlerAction::StartNewTask`].
    pub fn on_task_launched(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        task_id: TaskId,
        success: bool,
        previously_appeared: bool,
    ) {
        if self.finishing_new_task_id == Some(task_id) {
            self.finishing_new_task_id = None;
        }

        if success {
            // A task that already appeared will not appear again, so nothing else finishes the
            // animation.
            if previously_appeared {
                self.finish_recents_animation(ctx, false, false, HandlerFlags::empty());
                self.reset(ctx);
            }
            return;
        }

        warn!("gesture {}: error launching task {task_id}", self.id());
        self.reset(ctx);
        // Show overview so the user can pick something else.
        self.end_launcher_transition_controller(ctx);
        self.update_sys_ui_flags(ctx, 1.);
        ctx.activity.on_launch_task_failed();
        ctx.activity.show_toast("activity not available");
        self.finish_recents_animation(ctx, true, false, HandlerFlags::empty());
    }

    fn setup_launcher_ui_after_swipe_up_to_recents(&mut self, ctx: &mut HandlerContext<'_>) {
        self.end_launcher_transition_controller(ctx);
        ctx.activity.on_swipe_up_to_recents_complete();
        if let Some((controller, _)) = &self.animation {
            controller.set_defer_cancel_until_next_transition(true, true);
        }
        if let Some(recents) = ctx.activity.recents_view() {
            recents.on_swipe_up_animation_success();
        }

        let system_ui = ctx.os.system_ui.clone();
        ctx.executor.execute(move || system_ui.on_overview_shown(false));

        self.reset(ctx);
    }

    fn invalidate_handler(&mut self, ctx: &mut HandlerContext<'_>) {
        self.wrapper.destroy_input_proxy();
        self.input_proxy_enabled = false;
        self.end_running_window_anim(ctx, false);

        self.ended = true;
        self.activity_init_registered = false;
        self.restart_listener_registered = false;
        self.task_snapshot = None;
    }

    /// A new gesture is about to replace this one.
    pub fn on_consumer_about_to_be_switched(&mut self, ctx: &mut HandlerContext<'_>) {
        if self.activity.is_some() {
            // The gesture may end before the launcher starts.
            self.awaiting_launcher_start = false;
        }

        if self.gesture.end_target().is_some() && !self.gesture.is_running_animation_to_launcher() {
            self.cancel_current_animation(ctx);
        } else {
            self.reset(ctx);
        }
    }

    fn cancel_current_animation(&mut self, ctx: &mut HandlerContext<'_>) {
        debug!("gesture {}: cancelling current animation", self.id());
        self.canceled = true;

        if matches!(self.window_anim, Some(RunningWindowAnim::Shift(_))) {
            self.end_running_window_anim(ctx, true);
        }
        if std::mem::take(&mut self.launcher_transition_active) {
            ctx.activity.on_launcher_transition_cancelled();
        }

        if let Some(task_id) = self.finishing_new_task_id {
            // The recents animation finished while the new task was starting; show the screenshot
            // instead.
            self.switch_to_screenshot(ctx);
            let known = ctx
                .activity
                .recents_view()
                .is_some_and(|recents| recents.task_index_for_id(task_id).is_some());
            ctx.shared
                .set_recents_animation_finish_interrupted(known.then_some(task_id));
        }
    }

    pub fn dump(&self, prefix: &str, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{prefix}SwipeUpHandler:")?;
        writeln!(out, "{prefix}\tstate={}", FlagNames(self.state.state()))?;
        writeln!(out, "{prefix}\tcurrentShift={:.3}", self.current_shift)?;
        writeln!(out, "{prefix}\tgestureStarted={}", self.gesture_started)?;
        writeln!(out, "{prefix}\tcanceled={}", self.canceled)?;
        writeln!(out, "{prefix}\tisShelfPeeking={}", self.is_shelf_peeking)?;
        writeln!(out, "{prefix}\thasTargets={}", self.has_targets())?;
        writeln!(out, "{prefix}\tlastDownPos={}", self.down_pos)?;
        self.gesture.dump(&format!("{prefix}\t"), out)
    }
}

impl fmt::Debug for SwipeUpHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwipeUpHandler")
            .field("gesture", &self.gesture)
            .field("state", &FlagNames(self.state.state()).to_string())
            .field("current_shift", &self.current_shift)
            .finish()
    }
}

fn state_callbacks() -> MultiStateCallback<HandlerFlags, HandlerAction> {
    use HandlerAction as A;
    use HandlerFlags as F;

    let registrations = [
        (
            F::LAUNCHER_PRESENT | F::GESTURE_STARTED,
            A::OnLauncherPresentAndGestureStarted,
        ),
        (
            F::LAUNCHER_DRAWN | F::GESTURE_STARTED,
            A::InitializeLauncherAnimationController,
        ),
        (F::LAUNCHER_PRESENT | F::LAUNCHER_DRAWN, A::LauncherFrameDrawn),
        (
            F::LAUNCHER_PRESENT | F::LAUNCHER_STARTED | F::GESTURE_CANCELLED,
            A::ResetStateForAnimationCancel,
        ),
        (F::RESUME_LAST_TASK | F::APP_CONTROLLER_RECEIVED, A::ResumeLastTask),
        (F::START_NEW_TASK | F::SCREENSHOT_CAPTURED, A::StartNewTask),
        (
            F::LAUNCHER_PRESENT | F::APP_CONTROLLER_RECEIVED | F::LAUNCHER_DRAWN | F::CAPTURE_SCREENSHOT,
            A::SwitchToScreenshot,
        ),
        (
            F::SCREENSHOT_CAPTURED | F::GESTURE_COMPLETED | F::SCALED_CONTROLLER_RECENTS,
            A::FinishCurrentTransitionToRecents,
        ),
        (
            F::SCREENSHOT_CAPTURED | F::GESTURE_COMPLETED | F::SCALED_CONTROLLER_HOME,
            A::FinishCurrentTransitionToHome,
        ),
        (F::SCALED_CONTROLLER_HOME | F::CURRENT_TASK_FINISHED, A::Reset),
        (
            F::LAUNCHER_PRESENT
                | F::APP_CONTROLLER_RECEIVED
                | F::LAUNCHER_DRAWN
                | F::SCALED_CONTROLLER_RECENTS
                | F::CURRENT_TASK_FINISHED
                | F::GESTURE_COMPLETED
                | F::GESTURE_STARTED,
            A::SetupLauncherUiAfterSwipeUpToRecents,
        ),
        (F::HANDLER_INVALIDATED, A::InvalidateHandler),
        (
            F::LAUNCHER_PRESENT | F::HANDLER_INVALIDATED,
            A::InvalidateHandlerWithLauncher,
        ),
        (
            F::HANDLER_INVALIDATED | F::RESUME_LAST_TASK,
            A::NotifyTransitionCancelled,
        ),
    ];

    let mut state = MultiStateCallback::new();
    for (mask, action) in registrations {
        let fired = state.run_once_at_state(mask, action);
        debug_assert!(fired.is_none());
    }
    state.add_change_listener(
        F::APP_CONTROLLER_RECEIVED
            | F::LAUNCHER_PRESENT
            | F::SCREENSHOT_VIEW_SHOWN
            | F::CAPTURE_SCREENSHOT,
        |shown| A::RunningTaskHidden(!shown),
    );
    state
}
