use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use calloop::EventLoop;
use quickstep_config::Config;

use super::fakes::{
    component, CallLog, FakeActivity, FakeAnimationController, FakeOs, LauncherState,
    RecentsState,
};
use crate::animation::Clock;
use crate::executor::BackgroundExecutor;
use crate::motion::{MotionAction, MotionEvent};
use crate::service::{DisplayInfo, OverviewProxy, Rotation, TouchInteractionService};
use crate::swipe::SwipeUpHandler;
use crate::system::os::{RemoteAnimationTarget, RunningTaskInfo, TaskId};
use crate::system::NavigationMode;
use crate::utils::Rect;

pub const RUNNING_TASK: TaskId = 5;
pub const OTHER_TASK: TaskId = 3;

const X: f64 = 540.;
/// Inside the 48 px gesture strip at the bottom of a 2340 px display.
pub const STRIP_Y: f64 = 2320.;

pub struct Fixture {
    pub event_loop: EventLoop<'static, TouchInteractionService>,
    pub service: TouchInteractionService,
    pub proxy: OverviewProxy,
    pub os: FakeOs,
    pub log: CallLog,
    pub launcher: Rc<RefCell<LauncherState>>,
    pub recents: Rc<RefCell<RecentsState>>,
    pub clock: Clock,
    pub animation: Arc<FakeAnimationController>,
    now: Duration,
    y: f64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_mode(NavigationMode::NoButton)
    }

    pub fn with_mode(mode: NavigationMode) -> Self {
        Self::build(mode, BackgroundExecutor::immediate())
    }

    pub fn with_executor(executor: BackgroundExecutor) -> Self {
        Self::build(NavigationMode::NoButton, executor)
    }

    /// A fixture with an app in front of the launcher, which is created but stopped.
    fn build(mode: NavigationMode, executor: BackgroundExecutor) -> Self {
        let os = FakeOs::new();
        os.activity_manager.set_running_task(Some(RunningTaskInfo::new(
            RUNNING_TASK,
            Some(component("com.example.app")),
        )));

        let activity = FakeActivity::new(os.log.clone());
        let launcher = activity.state.clone();
        let recents = activity.recents_state();
        {
            let mut recents = recents.borrow_mut();
            recents.tasks = vec![OTHER_TASK, RUNNING_TASK];
            recents.running = Some(1);
            recents.next_page = 1;
        }

        let clock = Clock::with_time(Duration::ZERO);
        let event_loop = EventLoop::try_new().unwrap();
        let display = DisplayInfo::new(1080., 2340., Rotation::R0);
        let (service, proxy) = TouchInteractionService::new(
            Config::default(),
            os.services(),
            Box::new(activity),
            mode,
            display,
            executor,
            clock.clone(),
            &event_loop.handle(),
        )
        .unwrap();

        // System UI reports the gesture strip, so touches there start a gesture on DOWN.
        let strip = service.regions().swipe;
        proxy.on_active_nav_bar_region_changes(Some(strip));

        let mut fixture = Self {
            event_loop,
            service,
            proxy,
            log: os.log.clone(),
            animation: os.animation_controller(),
            os,
            launcher,
            recents,
            clock,
            now: Duration::ZERO,
            y: STRIP_Y,
        };
        fixture.proxy.on_initialize();
        fixture.dispatch();
        fixture
    }

    /// Runs the event loop until posted messages settle.
    pub fn dispatch(&mut self) {
        for _ in 0..5 {
            self.event_loop
                .dispatch(Some(Duration::ZERO), &mut self.service)
                .unwrap();
        }
    }

    fn tick(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
        self.clock.set_time(self.now);
    }

    fn send(&mut self, action: MotionAction) {
        let event = MotionEvent::new(action, X, self.y, self.now);
        self.service.on_input_event(event);
        self.dispatch();
    }

    pub fn down(&mut self) {
        self.tick(16);
        self.y = STRIP_Y;
        self.send(MotionAction::Down);
    }

    /// Moves the finger by `dy` px over `ms` milliseconds.
    pub fn move_by(&mut self, dy: f64, ms: u64) {
        self.tick(ms);
        self.y += dy;
        self.send(MotionAction::Move);
    }

    /// Keeps the finger still for `ms` milliseconds, reporting a move every frame.
    pub fn hold(&mut self, ms: u64) {
        for _ in 0..ms / 16 {
            self.move_by(0., 16);
        }
    }

    pub fn up(&mut self) {
        self.tick(8);
        self.send(MotionAction::Up);
    }

    /// The launcher comes to the front and draws its first frame.
    pub fn launcher_ready(&mut self) {
        self.service.on_launcher_started();
        self.service.on_launcher_frame_drawn();
        self.dispatch();
    }

    /// The OS starts the last requested recents animation with the running app as the target.
    pub fn start_animation(&mut self) {
        let runner = self
            .os
            .activity_manager
            .last_runner()
            .expect("no recents animation was requested");
        runner.on_animation_start(
            self.animation.clone(),
            vec![RemoteAnimationTarget::app(
                RUNNING_TASK,
                Rect::new(0., 0., 1080., 2340.),
            )],
            Vec::new(),
            Rect::default(),
            None,
        );
        self.dispatch();
    }

    /// Lets every running animation run to its end.
    pub fn finish_animations(&mut self) {
        for _ in 0..3 {
            self.tick(1000);
            self.service.advance_animations();
            self.dispatch();
        }
    }

    pub fn handler(&self) -> &SwipeUpHandler {
        self.service
            .current_handler()
            .expect("no swipe handler is running")
    }

    pub fn consumer_name(&self) -> String {
        self.service.consumer().name()
    }

    /// Starts a gesture with the launcher ready and the animation running.
    pub fn start_swipe(&mut self) {
        self.down();
        self.launcher_ready();
        self.start_animation();
    }
}
