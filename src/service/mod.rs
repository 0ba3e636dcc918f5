//! The touch interaction service: owns the input stream, picks a consumer for every swipe from
//! the navigation bar and routes recents animation events to the swipe handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use calloop::channel::{self, Sender};
use calloop::LoopHandle;
use quickstep_config::Config;
use tracing::{debug, info, trace, warn};

use crate::activity::ActivityInterface;
use crate::animation::Clock;
use crate::executor::BackgroundExecutor;
use crate::gesture_state::{GestureId, GestureState};
use crate::motion::{MotionAction, MotionEvent};
use crate::overview_command::{OverviewCommand, OverviewCommandHelper, OverviewCommandKind};
use crate::recents_animation::{ListenerKey, RecentsDispatch, RecentsEvent};
use crate::swipe::{HandlerAction, HandlerContext, HandlerMsg, SwipeUpHandler};
use crate::system::os::{ActivityManager, OsServices, RunningTaskInfo, UserId};
use crate::system::{BinderState, DeviceState, NavigationMode, SystemUiStateFlags};
use crate::tasks::model::{ModelNotifier, RecentsModel};
use crate::utils::{EventLog, Rect, Region};

pub mod consumer;
pub mod shared_state;
pub mod touch_region;

use consumer::{
    AssistantConsumer, ConsumerEffect, ConsumerParams, ConsumerSelection, InputConsumer,
    SharedSnapshot,
};
pub use shared_state::SwipeSharedState;
pub use touch_region::{DisplayInfo, Rotation, TouchRegions};

const CURRENT_USER: UserId = 0;

/// Messages from the binder thread to the UI loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServiceMsg {
    Initialized,
    Overview(OverviewCommand),
    SystemUiStateChanged,
}

/// Which consumer sees the rest of the current touch stream.
#[derive(Debug)]
enum UncheckedConsumer {
    Main,
    /// A consumer for this stream only, leaving the main one untouched.
    Other(InputConsumer),
}

pub struct TouchInteractionService {
    config: Config,
    clock: Clock,
    device: DeviceState,
    binder: Arc<BinderState>,
    os: OsServices,
    executor: BackgroundExecutor,
    activity: Box<dyn ActivityInterface>,

    shared: SwipeSharedState,
    handlers: HashMap<GestureId, SwipeUpHandler>,
    next_gesture_id: u64,
    /// The last gesture to end, for a follow-up swipe to continue from.
    previous_gesture: Option<GestureState<HandlerAction>>,

    consumer: InputConsumer,
    unchecked: UncheckedConsumer,
    display: DisplayInfo,
    regions: TouchRegions,
    initialized: bool,

    touch_log: EventLog,
    gesture_log: EventLog,

    model: RecentsModel,
    overview_commands: OverviewCommandHelper,

    handler_tx: Sender<HandlerMsg>,
    recents_tx: Sender<RecentsEvent>,
}

impl TouchInteractionService {
    /// Creates the service and registers its channels on the event loop.
    ///
    /// Returns the binder endpoint, which system UI calls from its own threads.
    pub fn new(
        config: Config,
        os: OsServices,
        activity: Box<dyn ActivityInterface>,
        mode: NavigationMode,
        display: DisplayInfo,
        executor: BackgroundExecutor,
        clock: Clock,
        handle: &LoopHandle<'static, Self>,
    ) -> anyhow::Result<(Self, OverviewProxy)> {
        let _span = tracy_client::span!("TouchInteractionService::new");

        let (service_tx, service_rx) = channel::channel();
        handle
            .insert_source(service_rx, |event, _, service: &mut Self| match event {
                channel::Event::Msg(msg) => service.on_service_msg(msg),
                channel::Event::Closed => (),
            })
            .map_err(|err| anyhow!("error inserting the service channel: {}", err.error))?;

        let (recents_tx, recents_rx) = channel::channel();
        handle
            .insert_source(recents_rx, |event, _, service: &mut Self| match event {
                channel::Event::Msg(event) => service.on_recents_event(event),
                channel::Event::Closed => (),
            })
            .map_err(|err| anyhow!("error inserting the recents channel: {}", err.error))?;

        let (handler_tx, handler_rx) = channel::channel();
        handle
            .insert_source(handler_rx, |event, _, service: &mut Self| match event {
                channel::Event::Msg(msg) => service.on_handler_msg(msg),
                channel::Event::Closed => (),
            })
            .map_err(|err| anyhow!("error inserting the handler channel: {}", err.error))?;

        let (model, model_rx) =
            RecentsModel::new(&config.recents, os.clone(), executor.clone(), CURRENT_USER);
        handle
            .insert_source(model_rx, |event, _, service: &mut Self| match event {
                channel::Event::Msg(msg) => service.model.handle_msg(msg),
                channel::Event::Closed => (),
            })
            .map_err(|err| anyhow!("error inserting the model channel: {}", err.error))?;

        let binder = Arc::new(BinderState::default());
        let proxy = OverviewProxy {
            binder: binder.clone(),
            tx: service_tx,
            activity_manager: os.activity_manager.clone(),
            epoch: clock.epoch(),
        };

        let regions = TouchRegions::compute(mode, display, &config.touch_region);
        let service = Self {
            touch_log: EventLog::new("touch interaction log", config.debug.touch_log_size),
            gesture_log: EventLog::new("active gesture log", config.debug.gesture_log_size),
            overview_commands: OverviewCommandHelper::new(&config.overview),
            device: DeviceState::new(mode),
            binder,
            os,
            executor,
            activity,
            clock,
            shared: SwipeSharedState::new(),
            handlers: HashMap::new(),
            next_gesture_id: 0,
            previous_gesture: None,
            consumer: InputConsumer::NoOp,
            unchecked: UncheckedConsumer::Main,
            display,
            regions,
            initialized: false,
            model,
            handler_tx,
            recents_tx,
            config,
        };
        Ok((service, proxy))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn shared_state(&self) -> &SwipeSharedState {
        &self.shared
    }

    pub fn consumer(&self) -> &InputConsumer {
        &self.consumer
    }

    pub fn regions(&self) -> &TouchRegions {
        &self.regions
    }

    pub fn handler(&self, id: GestureId) -> Option<&SwipeUpHandler> {
        self.handlers.get(&id)
    }

    /// The newest live swipe handler.
    pub fn current_handler(&self) -> Option<&SwipeUpHandler> {
        self.handlers
            .iter()
            .max_by_key(|(id, _)| **id)
            .map(|(_, handler)| handler)
    }

    #[cfg(test)]
    pub(crate) fn current_handler_mut(&mut self) -> Option<&mut SwipeUpHandler> {
        self.handlers
            .iter_mut()
            .max_by_key(|(id, _)| **id)
            .map(|(_, handler)| handler)
    }

    pub fn previous_gesture(&self) -> Option<&GestureState<HandlerAction>> {
        self.previous_gesture.as_ref()
    }

    pub fn model(&mut self) -> &mut RecentsModel {
        &mut self.model
    }

    /// Entry point for the OS task-stack listener.
    pub fn model_notifier(&self) -> ModelNotifier {
        self.model.notifier()
    }

    pub fn activity(&mut self) -> &mut dyn ActivityInterface {
        &mut *self.activity
    }

    // =========================================================================
    // Device state
    // =========================================================================

    pub fn on_user_unlocked(&mut self) {
        if self.device.user_unlocked {
            return;
        }
        info!("user unlocked");
        self.device.user_unlocked = true;
        self.reset_consumer();
        if !self.config.recents.disable_thumbnail_preload {
            self.model.preload_tasks();
        }
    }

    pub fn on_user_locked(&mut self) {
        debug!("user locked");
        self.device.user_unlocked = false;
    }

    pub fn on_navigation_mode_changed(&mut self, mode: NavigationMode) {
        if !self.device.nav_mode.update_mode(mode) {
            return;
        }
        self.update_touch_regions();
    }

    pub fn on_display_changed(&mut self, display: DisplayInfo) {
        if self.display == display {
            return;
        }
        self.display = display;
        self.update_touch_regions();
    }

    fn update_touch_regions(&mut self) {
        self.regions =
            TouchRegions::compute(self.device.mode(), self.display, &self.config.touch_region);
        debug!(
            "touch regions for {}: swipe {}",
            self.device.mode(),
            self.regions.swipe
        );
    }

    fn on_service_msg(&mut self, msg: ServiceMsg) {
        trace!("service message: {msg:?}");
        match msg {
            ServiceMsg::Initialized => {
                self.initialized = true;
                self.device.system_ui_flags = self.binder.system_ui_flags();
                if self.device.user_unlocked && !self.config.recents.disable_thumbnail_preload {
                    self.model.preload_tasks();
                }
            }
            ServiceMsg::Overview(command) => self.run_overview_command(command),
            ServiceMsg::SystemUiStateChanged => {
                self.device.system_ui_flags = self.binder.system_ui_flags();
            }
        }
    }

    // =========================================================================
    // Input
    // =========================================================================

    pub fn on_input_event(&mut self, event: MotionEvent) {
        let _span = tracy_client::span!("TouchInteractionService::on_input_event");

        if !self.device.mode().has_gestures() {
            trace!("dropping {} without gesture navigation", event.action);
            return;
        }

        let now = self.clock.now();
        self.touch_log.add_with(now, "onMotionEvent", event.action);

        if event.action == MotionAction::Down {
            self.device.system_ui_flags = self.binder.system_ui_flags();

            if self.regions.in_swipe_region(event.pos) {
                let use_shared_state = self
                    .consumer
                    .active_handler()
                    .is_some_and(|id| self.handlers.contains_key(&id));
                self.on_consumer_about_to_be_switched();
                self.consumer = self.new_consumer(use_shared_state, &event);
                self.touch_log
                    .add_with(now, "setInputConsumer", self.consumer.name());
                self.unchecked = UncheckedConsumer::Main;
            } else if self.device.user_unlocked
                && self.device.is_fully_gestural()
                && self.can_trigger_assistant(event.pos)
            {
                // An ongoing quick switch is only interrupted by another quick switch, so the
                // main consumer stays.
                let params = self.consumer_params();
                self.unchecked = UncheckedConsumer::Other(InputConsumer::Assistant(
                    AssistantConsumer::new(params, InputConsumer::NoOp),
                ));
            } else {
                self.unchecked = UncheckedConsumer::Other(InputConsumer::NoOp);
            }
        }

        let effects = match &mut self.unchecked {
            UncheckedConsumer::Main => self.consumer.on_motion(&event),
            UncheckedConsumer::Other(consumer) => consumer.on_motion(&event),
        };
        self.apply_effects(effects);
    }

    /// Touch on the system input consumer, which takes over input while a finished swipe
    /// settles into overview.
    pub fn on_recents_input_consumer_event(&mut self, event: MotionEvent) -> bool {
        let target = self
            .handlers
            .iter()
            .filter(|(_, handler)| handler.wants_input_proxy_events())
            .map(|(id, _)| *id)
            .max();
        let Some(id) = target else {
            return false;
        };
        self.with_handler(id, |handler, ctx| handler.on_input_proxy_event(ctx, &event))
            .unwrap_or(false)
    }

    fn consumer_params(&self) -> ConsumerParams {
        ConsumerParams::new(&self.config, self.device.mode(), &self.regions)
    }

    fn can_trigger_assistant(&self, pos: crate::utils::Point) -> bool {
        self.binder.is_assistant_available()
            && !self.device.system_ui_flags.is_assistant_gesture_disabled()
            && self.regions.in_assistant_region(pos)
            && !self.os.activity_manager.is_lock_to_app_active()
    }

    fn new_consumer(&mut self, use_shared_state: bool, event: &MotionEvent) -> InputConsumer {
        let mode = self.device.mode();
        let disable_horizontal_swipe =
            mode == NavigationMode::NoButton && self.binder.exclusion_region().contains(event.pos);
        let deferred_down = self
            .binder
            .active_nav_bar_region()
            .map_or(true, |region| !region.contains(event.pos));

        let sel = ConsumerSelection {
            flags: self.device.system_ui_flags,
            user_unlocked: self.device.user_unlocked,
            running_task: self.os.activity_manager.running_task(),
            use_shared_state,
            can_trigger_assistant: self.can_trigger_assistant(event.pos),
            disable_horizontal_swipe,
            deferred_down,
            activity_created: self.activity.created_activity().is_some(),
            activity_resumed: self.activity.is_resumed(),
            has_window_focus: self.activity.has_window_focus(),
            home_and_overview_same: self.activity.is_home_and_overview_same(),
            gesture_blocking_activity: self.config.touch_region.gesture_blocking_activity.clone(),
        };
        let params = self.consumer_params();

        let shared = &mut self.shared;
        let mut orphaned = Vec::new();
        let consumer = consumer::new_consumer(&sel, params, || {
            if !use_shared_state {
                orphaned = shared.clear_all_state(false);
            }
            SharedSnapshot {
                going_to_launcher: shared.going_to_launcher(),
                finish_interrupted: shared.recents_animation_finish_interrupted(),
                next_running_task_id: shared.next_running_task_id(),
            }
        });
        self.cancel_orphans(orphaned);

        debug!("new input consumer: {}", consumer.name());
        consumer
    }

    fn on_consumer_about_to_be_switched(&mut self) {
        if let Some(id) = self.consumer.active_handler() {
            self.hand_over_handler(id);
        }
    }

    /// The handler `id` stops driving its consumer. Called when the handler ends.
    fn on_consumer_inactive(&mut self, id: GestureId) {
        if self.consumer.active_handler() == Some(id) {
            self.reset_consumer();
        }
    }

    fn reset_consumer(&mut self) {
        self.consumer = InputConsumer::ResetGesture;
        self.unchecked = UncheckedConsumer::Main;
    }

    fn apply_effects(&mut self, effects: Vec<ConsumerEffect>) {
        for effect in effects {
            trace!("consumer effect: {effect:?}");
            match effect {
                ConsumerEffect::StartGesture {
                    running_task,
                    touch_time,
                    use_shared_state,
                } => self.start_gesture(running_task, touch_time, use_shared_state),
                ConsumerEffect::Handler(input) => {
                    if let Some(id) = self.consumer.active_handler() {
                        self.with_handler(id, |handler, ctx| handler.handle_input(ctx, input));
                    }
                }
                ConsumerEffect::GestureAbandoned => {
                    if let Some(id) = self.consumer.active_handler() {
                        self.hand_over_handler(id);
                        self.on_consumer_inactive(id);
                    }
                    // The OS may still start the animation if it handles the UP first.
                    let am = self.os.activity_manager.clone();
                    self.executor.execute(move || am.cancel_recents_animation(true));
                }
                ConsumerEffect::ResetSharedState => {
                    if self.shared.active_callbacks_id().is_some() {
                        let orphaned = self.shared.clear_all_state(true);
                        self.cancel_orphans(orphaned);
                    }
                }
                ConsumerEffect::OverviewTouch(event) => {
                    self.activity.dispatch_overview_touch(&event)
                }
                ConsumerEffect::CloseSystemWindows(reason) => {
                    let am = self.os.activity_manager.clone();
                    self.executor.execute(move || am.close_system_windows(reason));
                }
                ConsumerEffect::StartHome => {
                    let am = self.os.activity_manager.clone();
                    self.executor.execute(move || am.start_home());
                }
                ConsumerEffect::StartOverview => self.activity.start_overview(),
                ConsumerEffect::StartAssistant => {
                    let system_ui = self.os.system_ui.clone();
                    self.executor.execute(move || system_ui.start_assistant());
                }
                ConsumerEffect::StopScreenPinning => {
                    let system_ui = self.os.system_ui.clone();
                    self.executor.execute(move || system_ui.stop_screen_pinning());
                }
                ConsumerEffect::AccessibilityClicked { long_click } => {
                    let system_ui = self.os.system_ui.clone();
                    self.executor.execute(move || {
                        if long_click {
                            system_ui.notify_accessibility_button_long_clicked();
                        } else {
                            system_ui.notify_accessibility_button_clicked();
                        }
                    });
                }
                ConsumerEffect::HapticFeedback => self.activity.perform_haptic_feedback(),
            }
        }
    }

    // =========================================================================
    // Swipe handlers
    // =========================================================================

    fn start_gesture(
        &mut self,
        running_task: Option<RunningTaskInfo>,
        touch_time: std::time::Duration,
        use_shared_state: bool,
    ) {
        let _span = tracy_client::span!("TouchInteractionService::start_gesture");

        self.next_gesture_id += 1;
        let id = GestureId(self.next_gesture_id);

        let mut gesture = match &self.previous_gesture {
            Some(previous) if use_shared_state => GestureState::continue_from(previous, id),
            _ => GestureState::new(id, self.device.mode()),
        };
        if let Some(task) = running_task {
            gesture.update_running_task(task);
        }

        let continuing = self.shared.active_callbacks_id().is_some();
        debug!("starting gesture {id} (continuing: {continuing})");
        self.gesture_log
            .add_with(self.clock.now(), "startGesture", id);

        let handler = SwipeUpHandler::new(gesture, &self.config, touch_time, continuing);
        self.handlers.insert(id, handler);
        if let Some(swipe) = self.consumer.swipe_consumer_mut() {
            swipe.attach_handler(id);
        }

        self.with_handler(id, |handler, ctx| handler.init_when_ready(ctx));

        if let Some(callbacks) = self.shared.active_callbacks() {
            callbacks.add_listener(ListenerKey::Gesture(id));
            if let Some(dispatch) = self.shared.active_recents_animation_state() {
                self.with_handler(id, |handler, ctx| handler.on_recents_dispatch(ctx, dispatch));
            }
        } else {
            let (callbacks, orphaned) = self.shared.new_recents_animation_callbacks(
                self.recents_tx.clone(),
                self.os.system_ui.clone(),
                true,
            );
            callbacks.add_listener(ListenerKey::Gesture(id));
            let runner = callbacks.runner();
            self.cancel_orphans(orphaned);

            let am = self.os.activity_manager.clone();
            self.executor.execute(move || am.start_recents_activity(runner));
        }
    }

    /// Runs `f` with the handler and its context, then retires the handler if it ended.
    fn with_handler<R>(
        &mut self,
        id: GestureId,
        f: impl FnOnce(&mut SwipeUpHandler, &mut HandlerContext<'_>) -> R,
    ) -> Option<R> {
        let handler = self.handlers.get_mut(&id)?;
        let mut ctx = HandlerContext {
            config: &self.config,
            clock: &self.clock,
            device: &self.device,
            os: &self.os,
            executor: &self.executor,
            activity: &mut *self.activity,
            shared: &mut self.shared,
            log: &mut self.gesture_log,
            handler_tx: &self.handler_tx,
        };
        let result = f(handler, &mut ctx);

        if handler.is_ended() {
            self.retire_handler(id);
            self.on_consumer_inactive(id);
        }
        Some(result)
    }

    /// A new consumer takes over from the one driving `id`.
    fn hand_over_handler(&mut self, id: GestureId) {
        let end_target = self
            .handlers
            .get(&id)
            .and_then(|handler| handler.gesture().end_target());
        self.shared.on_gesture_handed_over(end_target);

        if let Some(callbacks) = self.shared.active_callbacks() {
            callbacks.remove_listener(ListenerKey::Gesture(id));
        }
        self.with_handler(id, |handler, ctx| handler.on_consumer_about_to_be_switched(ctx));
        self.retire_handler(id);

        if let Some(swipe) = self.consumer.swipe_consumer_mut() {
            if swipe.handler() == Some(id) {
                swipe.detach_handler();
            }
        }
    }

    fn retire_handler(&mut self, id: GestureId) {
        let Some(handler) = self.handlers.remove(&id) else {
            return;
        };
        debug!("gesture {id} retired");
        if let Some(callbacks) = self.shared.active_callbacks() {
            callbacks.remove_listener(ListenerKey::Gesture(id));
        }
        self.previous_gesture = Some(handler.into_gesture());
    }

    /// Tells handlers left on replaced callbacks that their animation is gone.
    fn cancel_orphans(&mut self, orphaned: Vec<ListenerKey>) {
        for listener in orphaned {
            if let ListenerKey::Gesture(id) = listener {
                debug!("gesture {id}: recents animation replaced");
                self.with_handler(id, |handler, ctx| {
                    handler.on_recents_dispatch(ctx, RecentsDispatch::Canceled(None))
                });
            }
        }
    }

    fn on_recents_event(&mut self, event: RecentsEvent) {
        let _span = tracy_client::span!("TouchInteractionService::on_recents_event");

        let id = event.id();
        if self.shared.active_callbacks_id() != Some(id) {
            debug!("{id}: dropping {event:?} from replaced callbacks");
            // Nobody listens anymore; an animation starting now goes straight back to the app.
            if let RecentsEvent::Started { controller, .. }
            | RecentsEvent::FinishToApp { controller, .. } = event
            {
                self.executor.execute(move || controller.finish(false, false));
            }
            return;
        }

        let Some(callbacks) = self.shared.active_callbacks() else {
            return;
        };
        let listeners = callbacks.listeners();
        let Some(dispatch) = callbacks.on_event(event, &self.executor) else {
            return;
        };

        for listener in listeners {
            match listener {
                ListenerKey::SharedState => self.shared.on_dispatch(&dispatch),
                ListenerKey::Gesture(gesture) => {
                    let dispatch = dispatch.clone();
                    self.with_handler(gesture, |handler, ctx| {
                        handler.on_recents_dispatch(ctx, dispatch)
                    });
                }
            }
        }
    }

    fn on_handler_msg(&mut self, msg: HandlerMsg) {
        let id = msg.gesture();
        let handled = match msg {
            HandlerMsg::TaskLaunched {
                task_id,
                success,
                previously_appeared,
                ..
            } => self.with_handler(id, |handler, ctx| {
                handler.on_task_launched(ctx, task_id, success, previously_appeared)
            }),
        };
        if handled.is_none() {
            debug!("gesture {id} is gone, dropping {msg:?}");
        }
    }

    /// Advances every running window animation by one frame.
    pub fn advance_animations(&mut self) {
        let _span = tracy_client::span!("TouchInteractionService::advance_animations");

        let ids: Vec<_> = self.handlers.keys().copied().collect();
        for id in ids {
            self.with_handler(id, |handler, ctx| handler.advance_animations(ctx));
        }
        profiling::finish_frame!();
    }

    pub fn are_animations_ongoing(&self) -> bool {
        self.handlers.values().any(SwipeUpHandler::has_window_anim)
    }

    // =========================================================================
    // Launcher activity hooks
    // =========================================================================

    fn for_each_handler(&mut self, mut f: impl FnMut(&mut SwipeUpHandler, &mut HandlerContext<'_>)) {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            self.with_handler(id, &mut f);
        }
    }

    pub fn on_activity_created(&mut self, already_on_home: bool) {
        self.for_each_handler(|handler, ctx| handler.on_activity_created(ctx, already_on_home));
    }

    pub fn on_launcher_started(&mut self) {
        self.for_each_handler(|handler, ctx| handler.on_launcher_started(ctx));
    }

    pub fn on_launcher_frame_drawn(&mut self) {
        self.for_each_handler(|handler, ctx| handler.on_launcher_frame_drawn(ctx));
    }

    pub fn on_page_transition_end(&mut self) {
        self.for_each_handler(|handler, ctx| handler.on_page_transition_end(ctx));
    }

    /// The OS tried to restart an activity that is already in front.
    pub fn on_activity_restart_attempt(&mut self, task: RunningTaskInfo) {
        self.for_each_handler(|handler, ctx| handler.on_activity_restart_attempt(ctx, &task));
    }

    pub fn on_overview_transition_complete(&mut self) {
        self.overview_commands
            .on_transition_complete(&mut *self.activity);
    }

    fn run_overview_command(&mut self, command: OverviewCommand) {
        let name = match command.kind {
            OverviewCommandKind::Toggle => "onOverviewToggle",
            OverviewCommandKind::Show { .. } => "onOverviewShown",
            OverviewCommandKind::Hide => "onOverviewHidden",
        };
        self.touch_log.add(self.clock.now(), name);

        let outcome = self.overview_commands.run(command, &mut *self.activity);
        debug!("{:?}: {outcome:?}", command.kind);
    }

    // =========================================================================
    // Dump
    // =========================================================================

    /// Writes the service state, or runs a debug command when `args` start with `cmd`.
    pub fn dump(&mut self, args: &[&str], out: &mut impl fmt::Write) -> fmt::Result {
        match args {
            ["cmd"] => {
                writeln!(out, "Available commands:")?;
                return writeln!(out, "  clear-touch-log: Clears the touch interaction log");
            }
            ["cmd", "clear-touch-log", ..] => {
                self.touch_log.clear();
                return Ok(());
            }
            ["cmd", other, ..] => return writeln!(out, "Unknown command: {other}"),
            _ => (),
        }

        let flags = self.device.system_ui_flags;
        writeln!(out, "TouchState:")?;
        writeln!(out, "  navMode={}", self.device.mode())?;
        writeln!(out, "  validSystemUiFlags={}", flags.is_valid_for_gestures())?;
        writeln!(out, "  systemUiFlags={}", flags.bits())?;
        writeln!(out, "  systemUiFlagsDesc={}", SystemUiFlagsDesc(flags))?;
        writeln!(
            out,
            "  assistantAvailable={}",
            self.binder.is_assistant_available()
        )?;
        writeln!(
            out,
            "  assistantDisabled={}",
            flags.is_assistant_gesture_disabled()
        )?;
        writeln!(out, "  resumed={}", self.activity.is_resumed())?;
        let use_shared_state = self.consumer.active_handler().is_some();
        writeln!(out, "  useSharedState={use_shared_state}")?;
        if use_shared_state {
            self.shared.dump("    ", out)?;
        }
        writeln!(out, "  consumer={}", self.consumer.name())?;

        self.touch_log.dump("", out)?;
        self.gesture_log.dump("", out)?;
        for handler in self.handlers.values() {
            handler.dump("  ", out)?;
        }
        writeln!(out, "RecentsModel:")?;
        self.model.dump("  ", out)
    }
}

impl fmt::Debug for TouchInteractionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TouchInteractionService")
            .field("mode", &self.device.mode())
            .field("consumer", &self.consumer.name())
            .field("handlers", &self.handlers.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}

struct SystemUiFlagsDesc(SystemUiStateFlags);

impl fmt::Display for SystemUiFlagsDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, _) in self.0.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

// =============================================================================
// Binder endpoint
// =============================================================================

/// The calls system UI makes into the launcher. Safe to use from any thread.
#[derive(Clone)]
pub struct OverviewProxy {
    binder: Arc<BinderState>,
    tx: Sender<ServiceMsg>,
    activity_manager: Arc<dyn ActivityManager>,
    epoch: Instant,
}

impl OverviewProxy {
    fn post(&self, msg: ServiceMsg) {
        if self.tx.send(msg).is_err() {
            warn!("UI loop is gone, dropping {msg:?}");
        }
    }

    fn command(&self, kind: OverviewCommandKind) -> OverviewCommand {
        OverviewCommand::new(kind, self.epoch.elapsed())
    }

    pub fn on_initialize(&self) {
        debug!("system UI connected");
        self.post(ServiceMsg::Initialized);
    }

    pub fn on_overview_toggle(&self) {
        let pinned = self
            .binder
            .system_ui_flags()
            .contains(SystemUiStateFlags::SCREEN_PINNING);
        if pinned || self.activity_manager.is_lock_to_app_active() {
            debug!("ignoring overview toggle while screen pinning is active");
            return;
        }
        self.activity_manager
            .close_system_windows(consumer::CLOSE_SYSTEM_WINDOWS_REASON_RECENTS);
        self.post(ServiceMsg::Overview(self.command(OverviewCommandKind::Toggle)));
    }

    pub fn on_overview_shown(&self, from_alt_tab: bool) {
        let kind = OverviewCommandKind::Show { from_alt_tab };
        self.post(ServiceMsg::Overview(self.command(kind)));
    }

    pub fn on_overview_hidden(&self, from_alt_tab: bool, from_home_key: bool) {
        if from_alt_tab && !from_home_key {
            self.post(ServiceMsg::Overview(self.command(OverviewCommandKind::Hide)));
        }
    }

    pub fn on_tip(&self, action_type: i32, view_type: i32) {
        debug!("tip shown: action {action_type}, view {view_type}");
    }

    pub fn on_assistant_available(&self, available: bool) {
        self.binder.set_assistant_available(available);
    }

    pub fn on_assistant_visibility_changed(&self, visibility: f32) {
        self.binder.set_assistant_visibility(visibility);
    }

    pub fn on_system_ui_state_changed(&self, flags: SystemUiStateFlags) {
        self.binder.set_system_ui_flags(flags);
        self.post(ServiceMsg::SystemUiStateChanged);
    }

    pub fn on_active_nav_bar_region_changes(&self, region: Option<Rect>) {
        self.binder.set_active_nav_bar_region(region);
    }

    pub fn on_exclusion_changed(&self, region: Region) {
        self.binder.set_exclusion_region(region);
    }
}

impl fmt::Debug for OverviewProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverviewProxy")
            .field("binder", &self.binder)
            .finish()
    }
}
