//! Input consumers: what a touch stream starting in the navigation bar does.
//!
//! A consumer is chosen on every DOWN in the swipe region and sees the whole stream. Consumers
//! never reach the OS or the handlers directly; they return [`ConsumerEffect`]s for the service
//! to apply in order.

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use quickstep_config::{ComponentName, Config};
use tracing::{debug, trace};

use super::touch_region::TouchRegions;
use crate::gesture_state::GestureId;
use crate::motion::{MotionAction, MotionEvent};
use crate::swipe::HandlerInput;
use crate::swipe_tracker::{MotionPauseDetector, SwipeTracker};
use crate::system::os::{RunningTaskInfo, TaskId};
use crate::system::{NavigationMode, SystemUiStateFlags};
use crate::utils::{squared_hypot, Point, Rect};

/// Upward travel before a pause counts, in px.
const MOTION_PAUSE_MIN_DISPLACEMENT: f64 = 36.;
/// Travel that commits the assistant gesture, in px.
const ASSISTANT_DRAG_THRESHOLD: f64 = 55.;
/// Drag time that commits the assistant gesture together with the distance.
const ASSISTANT_TIME_THRESHOLD: Duration = Duration::from_millis(200);
/// Progress a locked-device swipe needs to dismiss without a fling.
const DEVICE_LOCKED_DISMISS_PROGRESS: f64 = 0.3;

pub const CLOSE_SYSTEM_WINDOWS_REASON_RECENTS: &str = "recentapps";
pub const CLOSE_SYSTEM_WINDOWS_REASON_HOME: &str = "homekey";

bitflags! {
    /// Kinds of consumer, combined for consumers that wrap another one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConsumerType: u16 {
        const NO_OP = 1;
        const OVERVIEW = 1 << 1;
        const OTHER_ACTIVITY = 1 << 2;
        const ASSISTANT = 1 << 3;
        const DEVICE_LOCKED = 1 << 4;
        const ACCESSIBILITY = 1 << 5;
        const SCREEN_PINNED = 1 << 6;
        const OVERVIEW_WITHOUT_FOCUS = 1 << 7;
        const RESET_GESTURE = 1 << 8;
        const FALLBACK_NO_BUTTON = 1 << 9;
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str(":")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Work a consumer asks the service to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEffect {
    /// Create a swipe handler for the stream and start or join the recents animation.
    StartGesture {
        running_task: Option<RunningTaskInfo>,
        touch_time: Duration,
        use_shared_state: bool,
    },
    /// Input for the handler this consumer drives.
    Handler(HandlerInput),
    /// The stream ended without a gesture; drop the handler and cancel the animation.
    GestureAbandoned,
    /// Finish any recents animation left running by an earlier gesture.
    ResetSharedState,
    OverviewTouch(MotionEvent),
    CloseSystemWindows(&'static str),
    StartHome,
    StartOverview,
    StartAssistant,
    StopScreenPinning,
    AccessibilityClicked { long_click: bool },
    HapticFeedback,
}

/// Values consumers need from the config and the device, captured at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumerParams {
    pub mode: NavigationMode,
    pub touch_slop: f64,
    pub fling_threshold_velocity: f64,
    pub fling_min_velocity: f64,
    pub transition_drag_length: f64,
    pub motion_pause_speed: f64,
    pub motion_pause_delay: Duration,
    pub swipe_region: Rect,
}

impl ConsumerParams {
    pub fn new(config: &Config, mode: NavigationMode, regions: &TouchRegions) -> Self {
        let gestures = &config.gestures;
        Self {
            mode,
            touch_slop: gestures.touch_slop.0,
            fling_threshold_velocity: gestures.fling_threshold_velocity.0,
            fling_min_velocity: gestures.fling_min_velocity.0,
            transition_drag_length: gestures.transition_drag_length.0,
            motion_pause_speed: gestures.motion_pause_speed.0,
            motion_pause_delay: Duration::from_millis(u64::from(gestures.motion_pause_delay_ms)),
            swipe_region: regions.swipe,
        }
    }

    fn squared_slop(&self) -> f64 {
        self.touch_slop * self.touch_slop
    }

    fn pause_detector(&self) -> MotionPauseDetector {
        MotionPauseDetector::new(self.motion_pause_speed, self.motion_pause_delay)
    }
}

/// Velocity of a touch along both axes.
#[derive(Debug, Clone, Default)]
struct VelocityTracker {
    x: SwipeTracker,
    y: SwipeTracker,
    last: Option<Point>,
}

impl VelocityTracker {
    fn add(&mut self, event: &MotionEvent) {
        let last = self.last.replace(event.pos).unwrap_or(event.pos);
        self.x.push(event.pos.x - last.x, event.time);
        self.y.push(event.pos.y - last.y, event.time);
    }

    fn velocity(&self) -> Point {
        Point::new(self.x.velocity(), self.y.velocity())
    }

    fn clear(&mut self) {
        self.x.reset();
        self.y.reset();
        self.last = None;
    }
}

#[derive(Debug, Clone)]
pub enum InputConsumer {
    NoOp,
    ResetGesture,
    DeviceLocked(DeviceLockedConsumer),
    OtherActivity(SwipeConsumer),
    Overview(OverviewConsumer),
    OverviewWithoutFocus(OverviewWithoutFocusConsumer),
    FallbackNoButton(FallbackNoButtonConsumer),
    Assistant(AssistantConsumer),
    ScreenPinned(ScreenPinnedConsumer),
    Accessibility(AccessibilityConsumer),
}

impl InputConsumer {
    pub fn consumer_type(&self) -> ConsumerType {
        match self {
            InputConsumer::NoOp => ConsumerType::NO_OP,
            InputConsumer::ResetGesture => ConsumerType::RESET_GESTURE,
            InputConsumer::DeviceLocked(_) => ConsumerType::DEVICE_LOCKED,
            InputConsumer::OtherActivity(_) => ConsumerType::OTHER_ACTIVITY,
            InputConsumer::Overview(_) => ConsumerType::OVERVIEW,
            InputConsumer::OverviewWithoutFocus(_) => ConsumerType::OVERVIEW_WITHOUT_FOCUS,
            InputConsumer::FallbackNoButton(_) => ConsumerType::FALLBACK_NO_BUTTON,
            InputConsumer::Assistant(c) => ConsumerType::ASSISTANT | c.delegate.consumer_type(),
            InputConsumer::ScreenPinned(_) => ConsumerType::SCREEN_PINNED,
            InputConsumer::Accessibility(c) => {
                ConsumerType::ACCESSIBILITY | c.delegate.consumer_type()
            }
        }
    }

    pub fn name(&self) -> String {
        self.consumer_type().to_string()
    }

    /// The swipe consumer at the bottom of the wrapper chain, if any.
    pub fn swipe_consumer(&self) -> Option<&SwipeConsumer> {
        match self {
            InputConsumer::OtherActivity(c) => Some(c),
            InputConsumer::Assistant(c) => c.delegate.swipe_consumer(),
            InputConsumer::Accessibility(c) => c.delegate.swipe_consumer(),
            _ => None,
        }
    }

    pub fn swipe_consumer_mut(&mut self) -> Option<&mut SwipeConsumer> {
        match self {
            InputConsumer::OtherActivity(c) => Some(c),
            InputConsumer::Assistant(c) => c.delegate.swipe_consumer_mut(),
            InputConsumer::Accessibility(c) => c.delegate.swipe_consumer_mut(),
            _ => None,
        }
    }

    /// Handler driven by this consumer while its gesture is live.
    pub fn active_handler(&self) -> Option<GestureId> {
        self.swipe_consumer().and_then(|c| c.handler)
    }

    pub fn on_motion(&mut self, event: &MotionEvent) -> Vec<ConsumerEffect> {
        let mut effects = Vec::new();
        self.on_motion_into(event, &mut effects);
        effects
    }

    fn on_motion_into(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        match self {
            InputConsumer::NoOp => (),
            InputConsumer::ResetGesture => {
                if event.action == MotionAction::Down {
                    effects.push(ConsumerEffect::ResetSharedState);
                }
            }
            InputConsumer::DeviceLocked(c) => c.on_motion(event, effects),
            InputConsumer::OtherActivity(c) => c.on_motion(event, effects),
            InputConsumer::Overview(c) => c.on_motion(event, effects),
            InputConsumer::OverviewWithoutFocus(c) => c.on_motion(event, effects),
            InputConsumer::FallbackNoButton(c) => c.on_motion(event, effects),
            InputConsumer::Assistant(c) => c.on_motion(event, effects),
            InputConsumer::ScreenPinned(c) => c.on_motion(event, effects),
            InputConsumer::Accessibility(c) => c.on_motion(event, effects),
        }
    }

    /// Whether a wrapping consumer may take the stream over.
    fn allow_intercept_by_parent(&self) -> bool {
        match self {
            InputConsumer::OtherActivity(c) => !c.passed_pilfer_slop,
            InputConsumer::Assistant(c) => c.state != AssistantState::Active,
            InputConsumer::Accessibility(c) => c.state != AccessibilityState::Active,
            _ => true,
        }
    }
}

// =========================================================================
// Other activity (the swipe up from an app)
// =========================================================================

#[derive(Debug, Clone)]
pub struct SwipeConsumer {
    params: ConsumerParams,
    running_task: Option<RunningTaskInfo>,
    use_shared_state: bool,
    /// The gesture starts on the first slop crossing instead of on DOWN.
    deferred_down: bool,
    disable_horizontal_swipe: bool,
    handler: Option<GestureId>,

    down_pos: Point,
    last_pos: Point,
    start_displacement: f64,
    passed_window_move_slop: bool,
    passed_pilfer_slop: bool,
    gesture_start_requested: bool,
    velocity: VelocityTracker,
    pause: MotionPauseDetector,
}

impl SwipeConsumer {
    pub fn new(
        params: ConsumerParams,
        running_task: Option<RunningTaskInfo>,
        use_shared_state: bool,
        deferred_down: bool,
        disable_horizontal_swipe: bool,
    ) -> Self {
        Self {
            params,
            running_task,
            use_shared_state,
            deferred_down,
            disable_horizontal_swipe,
            handler: None,
            down_pos: Point::default(),
            last_pos: Point::default(),
            start_displacement: 0.,
            passed_window_move_slop: false,
            passed_pilfer_slop: false,
            gesture_start_requested: false,
            velocity: VelocityTracker::default(),
            pause: params.pause_detector(),
        }
    }

    pub fn running_task(&self) -> Option<&RunningTaskInfo> {
        self.running_task.as_ref()
    }

    pub fn handler(&self) -> Option<GestureId> {
        self.handler
    }

    pub fn attach_handler(&mut self, handler: GestureId) {
        self.handler = Some(handler);
    }

    /// The handler is gone; the consumer no longer shares state with the next one.
    pub fn detach_handler(&mut self) {
        self.handler = None;
    }

    fn start_gesture(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        if std::mem::replace(&mut self.gesture_start_requested, true) {
            return;
        }
        effects.push(ConsumerEffect::StartGesture {
            running_task: self.running_task.clone(),
            touch_time: event.time,
            use_shared_state: self.use_shared_state,
        });
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        self.velocity.add(event);

        match event.action {
            MotionAction::Down => {
                trace!("swipe consumer down at {}", event.pos);
                self.down_pos = event.pos;
                self.last_pos = event.pos;
                if !self.deferred_down {
                    self.start_gesture(event, effects);
                }
            }
            MotionAction::PointerDown => {
                // A second finger outside the swipe region before the gesture is committed
                // cancels it.
                if !self.passed_pilfer_slop && !self.params.swipe_region.contains(event.pos) {
                    debug!("second pointer outside the swipe region, cancelling");
                    self.finish_touch_tracking(&event.with_action(MotionAction::Cancel), effects);
                }
            }
            MotionAction::Move => self.on_move(event, effects),
            MotionAction::Up | MotionAction::Cancel => self.finish_touch_tracking(event, effects),
            MotionAction::PointerUp => (),
        }
    }

    fn on_move(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        self.last_pos = event.pos;
        let displacement = event.pos.y - self.down_pos.y;
        let displacement_x = event.pos.x - self.down_pos.x;
        let slop = self.params.touch_slop;

        if !self.passed_window_move_slop && !self.deferred_down && displacement.abs() > slop {
            self.passed_window_move_slop = true;
            self.start_displacement = displacement.min(-slop);
        }

        let horizontal_dist = displacement_x.abs();
        let up_dist = -displacement;
        let likely_to_start_new_task = horizontal_dist > up_dist;

        if !self.passed_pilfer_slop
            && squared_hypot(displacement_x, displacement) >= self.params.squared_slop()
        {
            if self.disable_horizontal_swipe && displacement_x.abs() > displacement.abs() {
                debug!("horizontal swipe in an exclusion region, cancelling");
                self.finish_touch_tracking(&event.with_action(MotionAction::Cancel), effects);
                return;
            }

            self.passed_pilfer_slop = true;
            if self.deferred_down {
                self.start_gesture(event, effects);
            }
            if !self.passed_window_move_slop {
                self.passed_window_move_slop = true;
                self.start_displacement = displacement.min(-slop);
            }
            effects.push(ConsumerEffect::CloseSystemWindows(
                CLOSE_SYSTEM_WINDOWS_REASON_RECENTS,
            ));
            effects.push(ConsumerEffect::Handler(HandlerInput::GestureStarted {
                likely_to_start_new_task,
            }));
        }

        if !self.gesture_start_requested {
            return;
        }
        if self.passed_window_move_slop {
            effects.push(ConsumerEffect::Handler(HandlerInput::Displacement(
                displacement - self.start_displacement,
            )));
        }

        if self.params.mode == NavigationMode::NoButton {
            let disallow = up_dist < MOTION_PAUSE_MIN_DISPLACEMENT || likely_to_start_new_task;
            let changes = [
                self.pause.set_disallow_pause(disallow),
                self.pause.add_position(displacement, event.time),
            ];
            for paused in changes.into_iter().flatten() {
                effects.push(ConsumerEffect::Handler(HandlerInput::MotionPauseChanged(
                    paused,
                )));
            }
            effects.push(ConsumerEffect::Handler(HandlerInput::LikelyToStartNewTask(
                likely_to_start_new_task,
            )));
        }
    }

    fn finish_touch_tracking(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        if self.passed_window_move_slop && self.gesture_start_requested {
            let velocity = self.velocity.velocity();
            let input = if event.action == MotionAction::Cancel && !self.passed_pilfer_slop {
                HandlerInput::GestureCancelled
            } else {
                HandlerInput::GestureEnded {
                    end_velocity: velocity.y,
                    velocity,
                    down_pos: self.down_pos,
                }
            };
            effects.push(ConsumerEffect::Handler(input));
        } else if self.gesture_start_requested {
            // Tracking started on DOWN but the finger never moved far enough.
            effects.push(ConsumerEffect::GestureAbandoned);
        }

        self.velocity.clear();
        self.pause.clear();
        self.gesture_start_requested = false;
        self.passed_window_move_slop = false;
        self.passed_pilfer_slop = false;
    }
}

// =========================================================================
// Overview
// =========================================================================

/// Launcher in front with window focus: touches go to the launcher's own controllers.
#[derive(Debug, Clone)]
pub struct OverviewConsumer {}

impl OverviewConsumer {
    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        effects.push(ConsumerEffect::OverviewTouch(*event));
    }
}

/// Launcher in front without window focus (a dialog or the shade): a swipe up goes home.
#[derive(Debug, Clone)]
pub struct OverviewWithoutFocusConsumer {
    params: ConsumerParams,
    disable_horizontal_swipe: bool,
    down_pos: Point,
    passed_slop: bool,
    invalidated: bool,
    velocity: VelocityTracker,
}

impl OverviewWithoutFocusConsumer {
    fn new(params: ConsumerParams, disable_horizontal_swipe: bool) -> Self {
        Self {
            params,
            disable_horizontal_swipe,
            down_pos: Point::default(),
            passed_slop: false,
            invalidated: false,
            velocity: VelocityTracker::default(),
        }
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        if self.invalidated {
            return;
        }
        self.velocity.add(event);

        match event.action {
            MotionAction::Down => {
                self.down_pos = event.pos;
                self.passed_slop = false;
            }
            MotionAction::Move => {
                if self.passed_slop {
                    return;
                }
                let dx = event.pos.x - self.down_pos.x;
                let dy = event.pos.y - self.down_pos.y;
                if squared_hypot(dx, dy) >= self.params.squared_slop() {
                    self.passed_slop = true;
                    if self.disable_horizontal_swipe && dx.abs() > dy.abs() {
                        self.invalidated = true;
                    }
                }
            }
            MotionAction::Up | MotionAction::Cancel => {
                if self.passed_slop && event.action == MotionAction::Up {
                    let velocity_y = self.velocity.velocity().y;
                    let go_home = if velocity_y.abs() > self.params.fling_min_velocity {
                        velocity_y < 0.
                    } else {
                        event.pos.y - self.down_pos.y < -self.params.touch_slop
                    };
                    if go_home {
                        effects.push(ConsumerEffect::StartHome);
                        effects.push(ConsumerEffect::CloseSystemWindows(
                            CLOSE_SYSTEM_WINDOWS_REASON_HOME,
                        ));
                    }
                }
                self.velocity.clear();
                self.passed_slop = false;
            }
            MotionAction::PointerDown | MotionAction::PointerUp => (),
        }
    }
}

// =========================================================================
// Device locked and fallback launchers
// =========================================================================

/// Swipe over an app shown above the keyguard. Swiping far or fast enough dismisses it.
#[derive(Debug, Clone)]
pub struct DeviceLockedConsumer {
    params: ConsumerParams,
    task_id: TaskId,
    down_pos: Point,
    threshold_crossed: bool,
    velocity: VelocityTracker,
}

impl DeviceLockedConsumer {
    fn new(params: ConsumerParams, task_id: TaskId) -> Self {
        Self {
            params,
            task_id,
            down_pos: Point::default(),
            threshold_crossed: false,
            velocity: VelocityTracker::default(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        self.velocity.add(event);
        let displacement = self.down_pos.y - event.pos.y;

        match event.action {
            MotionAction::Down => {
                self.down_pos = event.pos;
                self.threshold_crossed = false;
            }
            MotionAction::Move => {
                if !self.threshold_crossed && displacement > self.params.touch_slop {
                    self.threshold_crossed = true;
                }
            }
            MotionAction::Up | MotionAction::Cancel => {
                if self.threshold_crossed && event.action == MotionAction::Up {
                    let velocity_y = self.velocity.velocity().y;
                    let dismiss = if velocity_y.abs() > self.params.fling_threshold_velocity {
                        velocity_y < 0.
                    } else {
                        let progress = displacement / self.params.transition_drag_length;
                        progress >= DEVICE_LOCKED_DISMISS_PROGRESS
                    };
                    if dismiss {
                        debug!("dismissing task {} over the keyguard", self.task_id);
                        effects.push(ConsumerEffect::StartHome);
                    }
                }
                self.velocity.clear();
                self.threshold_crossed = false;
            }
            MotionAction::PointerDown | MotionAction::PointerUp => (),
        }
    }
}

/// Gestural navigation with a third-party home app: swipe up goes home, hold goes to overview.
#[derive(Debug, Clone)]
pub struct FallbackNoButtonConsumer {
    params: ConsumerParams,
    disable_horizontal_swipe: bool,
    down_pos: Point,
    passed_slop: bool,
    invalidated: bool,
    pause: MotionPauseDetector,
    velocity: VelocityTracker,
}

impl FallbackNoButtonConsumer {
    fn new(params: ConsumerParams, disable_horizontal_swipe: bool) -> Self {
        Self {
            params,
            disable_horizontal_swipe,
            down_pos: Point::default(),
            passed_slop: false,
            invalidated: false,
            pause: params.pause_detector(),
            velocity: VelocityTracker::default(),
        }
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        self.velocity.add(event);
        let dx = event.pos.x - self.down_pos.x;
        let dy = event.pos.y - self.down_pos.y;

        match event.action {
            MotionAction::Down => {
                self.down_pos = event.pos;
                self.passed_slop = false;
                self.invalidated = false;
            }
            MotionAction::Move => {
                if self.invalidated {
                    return;
                }
                if !self.passed_slop && squared_hypot(dx, dy) >= self.params.squared_slop() {
                    if self.disable_horizontal_swipe && dx.abs() > dy.abs() {
                        self.invalidated = true;
                        return;
                    }
                    self.passed_slop = true;
                }
                if self.passed_slop {
                    self.pause
                        .set_disallow_pause(-dy < MOTION_PAUSE_MIN_DISPLACEMENT);
                    if self.pause.add_position(dy, event.time) == Some(true) {
                        effects.push(ConsumerEffect::HapticFeedback);
                    }
                }
            }
            MotionAction::Up | MotionAction::Cancel => {
                if self.passed_slop && !self.invalidated && event.action == MotionAction::Up {
                    if self.pause.is_paused() {
                        effects.push(ConsumerEffect::StartOverview);
                    } else {
                        let velocity_y = self.velocity.velocity().y;
                        let is_fling = velocity_y.abs() > self.params.fling_threshold_velocity;
                        if (is_fling && velocity_y < 0.) || (!is_fling && dy < 0.) {
                            effects.push(ConsumerEffect::StartHome);
                        }
                    }
                }
                self.pause.clear();
                self.velocity.clear();
                self.passed_slop = false;
            }
            MotionAction::PointerDown | MotionAction::PointerUp => (),
        }
    }
}

// =========================================================================
// Wrapping consumers
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssistantState {
    Inactive,
    Active,
    DelegateActive,
}

/// Diagonal swipe from a bottom corner invokes the assistant; anything else goes to the
/// wrapped consumer.
#[derive(Debug, Clone)]
pub struct AssistantConsumer {
    params: ConsumerParams,
    delegate: Box<InputConsumer>,
    state: AssistantState,
    down_pos: Point,
    start_drag_pos: Point,
    start_drag_time: Duration,
    passed_slop: bool,
    distance: f64,
    launched: bool,
}

impl AssistantConsumer {
    pub fn new(params: ConsumerParams, delegate: InputConsumer) -> Self {
        Self {
            params,
            delegate: Box::new(delegate),
            state: AssistantState::Inactive,
            down_pos: Point::default(),
            start_drag_pos: Point::default(),
            start_drag_time: Duration::ZERO,
            passed_slop: false,
            distance: 0.,
            launched: false,
        }
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        self.track(event, effects);
        if self.state != AssistantState::Active {
            self.delegate.on_motion_into(event, effects);
        }
    }

    fn track(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        match event.action {
            MotionAction::Down => {
                self.down_pos = event.pos;
                self.passed_slop = false;
                self.distance = 0.;
            }
            MotionAction::Move => {
                if self.state == AssistantState::DelegateActive {
                    return;
                }
                if !self.delegate.allow_intercept_by_parent() {
                    self.state = AssistantState::DelegateActive;
                    return;
                }

                if !self.passed_slop {
                    let dx = self.down_pos.x - event.pos.x;
                    let dy = self.down_pos.y - event.pos.y;
                    if squared_hypot(dx, dy) > self.params.squared_slop() {
                        self.passed_slop = true;
                        self.start_drag_pos = event.pos;
                        self.start_drag_time = event.time;
                        if is_valid_assistant_gesture_angle(dx, dy) {
                            self.set_active(event, effects);
                        } else {
                            self.state = AssistantState::DelegateActive;
                        }
                    }
                } else if self.state == AssistantState::Active {
                    self.distance = squared_hypot(
                        event.pos.x - self.start_drag_pos.x,
                        event.pos.y - self.start_drag_pos.y,
                    )
                    .sqrt();
                    let elapsed = event.time.saturating_sub(self.start_drag_time);
                    if self.distance >= ASSISTANT_DRAG_THRESHOLD
                        && elapsed >= ASSISTANT_TIME_THRESHOLD
                    {
                        self.start_assistant(effects);
                    }
                }
            }
            MotionAction::Up | MotionAction::Cancel => {
                if self.state == AssistantState::Active
                    && event.action == MotionAction::Up
                    && self.distance >= ASSISTANT_DRAG_THRESHOLD
                {
                    self.start_assistant(effects);
                }
                self.passed_slop = false;
                self.state = AssistantState::Inactive;
            }
            MotionAction::PointerDown | MotionAction::PointerUp => (),
        }
    }

    fn set_active(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        debug!("assistant gesture took over the stream");
        self.state = AssistantState::Active;
        self.delegate
            .on_motion_into(&event.with_action(MotionAction::Cancel), effects);
    }

    fn start_assistant(&mut self, effects: &mut Vec<ConsumerEffect>) {
        if std::mem::replace(&mut self.launched, true) {
            return;
        }
        effects.push(ConsumerEffect::HapticFeedback);
        effects.push(ConsumerEffect::StartAssistant);
    }
}

/// Whether a swipe by `(dx, dy)`, up and away from a corner, is steep enough but not too
/// steep for the assistant.
fn is_valid_assistant_gesture_angle(dx: f64, dy: f64) -> bool {
    let mut angle = dy.atan2(dx).to_degrees();
    if angle > 90. {
        angle = 180. - angle;
    }
    angle > 15. && angle < 70.
}

/// Screen pinning in gestural mode: swipe up and hold to unpin.
#[derive(Debug, Clone)]
pub struct ScreenPinnedConsumer {
    down_y: f64,
    pause: MotionPauseDetector,
}

impl ScreenPinnedConsumer {
    fn new(params: ConsumerParams) -> Self {
        Self {
            down_y: 0.,
            pause: params.pause_detector(),
        }
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        match event.action {
            MotionAction::Down => self.down_y = event.pos.y,
            MotionAction::Move => {
                let displacement = self.down_y - event.pos.y;
                self.pause
                    .set_disallow_pause(displacement < MOTION_PAUSE_MIN_DISPLACEMENT);
                if self.pause.add_position(event.pos.y, event.time) == Some(true) {
                    effects.push(ConsumerEffect::StopScreenPinning);
                    effects.push(ConsumerEffect::HapticFeedback);
                    self.pause.clear();
                }
            }
            MotionAction::Up | MotionAction::Cancel => self.pause.clear(),
            MotionAction::PointerDown | MotionAction::PointerUp => (),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessibilityState {
    Inactive,
    Active,
    DelegateActive,
}

/// Two-finger swipe from the navigation bar: the accessibility button.
#[derive(Debug, Clone)]
pub struct AccessibilityConsumer {
    params: ConsumerParams,
    delegate: Box<InputConsumer>,
    long_clickable: bool,
    state: AccessibilityState,
    pause: MotionPauseDetector,
}

impl AccessibilityConsumer {
    pub fn new(params: ConsumerParams, long_clickable: bool, delegate: InputConsumer) -> Self {
        Self {
            params,
            delegate: Box::new(delegate),
            long_clickable,
            state: AccessibilityState::Inactive,
            pause: params.pause_detector(),
        }
    }

    fn on_motion(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        self.track(event, effects);
        if self.state != AccessibilityState::Active {
            self.delegate.on_motion_into(event, effects);
        }
    }

    fn track(&mut self, event: &MotionEvent, effects: &mut Vec<ConsumerEffect>) {
        match event.action {
            MotionAction::Down => {
                self.state = AccessibilityState::Inactive;
                self.pause.clear();
            }
            MotionAction::PointerDown => {
                if self.state != AccessibilityState::Inactive || event.pointer_count != 2 {
                    return;
                }
                if self.params.swipe_region.contains(event.pos)
                    && self.delegate.allow_intercept_by_parent()
                {
                    debug!("accessibility gesture took over the stream");
                    self.state = AccessibilityState::Active;
                    self.delegate
                        .on_motion_into(&event.with_action(MotionAction::Cancel), effects);
                } else {
                    self.state = AccessibilityState::DelegateActive;
                }
            }
            MotionAction::Move => {
                if self.state == AccessibilityState::Active && self.long_clickable {
                    self.pause.add_position(event.pos.y, event.time);
                }
            }
            MotionAction::Up => {
                if self.state == AccessibilityState::Active {
                    let long_click = self.long_clickable && self.pause.is_paused();
                    effects.push(ConsumerEffect::AccessibilityClicked { long_click });
                }
            }
            MotionAction::Cancel | MotionAction::PointerUp => (),
        }
    }
}

// =========================================================================
// Consumer selection
// =========================================================================

/// Device and launcher state sampled when a touch lands in the swipe region.
#[derive(Debug, Clone)]
pub struct ConsumerSelection {
    pub flags: SystemUiStateFlags,
    pub user_unlocked: bool,
    pub running_task: Option<RunningTaskInfo>,
    pub use_shared_state: bool,
    pub can_trigger_assistant: bool,
    pub disable_horizontal_swipe: bool,
    /// The DOWN landed outside the active navigation bar region.
    pub deferred_down: bool,

    pub activity_created: bool,
    pub activity_resumed: bool,
    pub has_window_focus: bool,
    pub home_and_overview_same: bool,
    pub gesture_blocking_activity: Option<ComponentName>,
}

/// Shared swipe state, read after it was cleared for a fresh gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SharedSnapshot {
    pub going_to_launcher: bool,
    pub finish_interrupted: bool,
    pub next_running_task_id: Option<TaskId>,
}

/// Builds the consumer for a new touch stream.
///
/// `prepare_base` runs only when a base consumer is needed; it resets the shared state unless
/// the stream continues the previous gesture, and returns what is left of it.
pub fn new_consumer(
    sel: &ConsumerSelection,
    params: ConsumerParams,
    prepare_base: impl FnOnce() -> SharedSnapshot,
) -> InputConsumer {
    let valid_ui_state = sel.flags.is_valid_for_gestures();

    if !sel.user_unlocked {
        return if valid_ui_state {
            device_locked_consumer(sel, params)
        } else {
            InputConsumer::ResetGesture
        };
    }

    // A continued gesture started in a valid state, so the flags are not checked again.
    let mut base = if valid_ui_state || sel.use_shared_state {
        new_base_consumer(sel, params, prepare_base())
    } else {
        InputConsumer::ResetGesture
    };

    if params.mode == NavigationMode::NoButton {
        if sel.can_trigger_assistant {
            base = InputConsumer::Assistant(AssistantConsumer::new(params, base));
        }

        if sel.flags.contains(SystemUiStateFlags::SCREEN_PINNING) {
            // Only accessibility may wrap this one.
            base = InputConsumer::ScreenPinned(ScreenPinnedConsumer::new(params));
        }

        if sel.flags.contains(SystemUiStateFlags::A11Y_BUTTON_CLICKABLE) {
            let long_clickable = sel
                .flags
                .contains(SystemUiStateFlags::A11Y_BUTTON_LONG_CLICKABLE);
            base = InputConsumer::Accessibility(AccessibilityConsumer::new(
                params,
                long_clickable,
                base,
            ));
        }
    } else if sel.flags.contains(SystemUiStateFlags::SCREEN_PINNING) {
        base = InputConsumer::ResetGesture;
    }

    base
}

fn new_base_consumer(
    sel: &ConsumerSelection,
    params: ConsumerParams,
    shared: SharedSnapshot,
) -> InputConsumer {
    if sel
        .flags
        .contains(SystemUiStateFlags::STATUS_BAR_KEYGUARD_SHOWING_OCCLUDED)
    {
        return device_locked_consumer(sel, params);
    }

    if sel.running_task.is_none() && !shared.going_to_launcher && !shared.finish_interrupted {
        return InputConsumer::ResetGesture;
    }

    if shared.finish_interrupted {
        // Keep swiping from the task that was launching when the last animation was cut off.
        let running_task = shared
            .next_running_task_id
            .map(|task_id| RunningTaskInfo::new(task_id, None));
        return InputConsumer::OtherActivity(SwipeConsumer::new(
            params,
            running_task,
            sel.use_shared_state,
            sel.deferred_down,
            sel.disable_horizontal_swipe,
        ));
    }

    if shared.going_to_launcher || sel.activity_resumed {
        return overview_consumer(sel, params, shared);
    }

    if let (Some(blocking), Some(task)) = (&sel.gesture_blocking_activity, &sel.running_task) {
        if task.top_activity.as_ref() == Some(blocking) {
            debug!("gesture blocked by {blocking}");
            return InputConsumer::ResetGesture;
        }
    }

    if params.mode == NavigationMode::NoButton && !sel.home_and_overview_same {
        return InputConsumer::FallbackNoButton(FallbackNoButtonConsumer::new(
            params,
            sel.disable_horizontal_swipe,
        ));
    }

    InputConsumer::OtherActivity(SwipeConsumer::new(
        params,
        sel.running_task.clone(),
        sel.use_shared_state,
        sel.deferred_down,
        sel.disable_horizontal_swipe,
    ))
}

fn device_locked_consumer(sel: &ConsumerSelection, params: ConsumerParams) -> InputConsumer {
    match &sel.running_task {
        Some(task) if params.mode == NavigationMode::NoButton => {
            InputConsumer::DeviceLocked(DeviceLockedConsumer::new(params, task.task_id))
        }
        _ => InputConsumer::ResetGesture,
    }
}

fn overview_consumer(
    sel: &ConsumerSelection,
    params: ConsumerParams,
    shared: SharedSnapshot,
) -> InputConsumer {
    if !sel.activity_created {
        return InputConsumer::ResetGesture;
    }

    if sel.has_window_focus || shared.going_to_launcher {
        InputConsumer::Overview(OverviewConsumer {})
    } else {
        InputConsumer::OverviewWithoutFocus(OverviewWithoutFocusConsumer::new(
            params,
            sel.disable_horizontal_swipe,
        ))
    }
}
