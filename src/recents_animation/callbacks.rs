use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use calloop::channel::Sender;
use tracing::{debug, warn};

use super::{CallbacksId, RecentsAnimationController, RecentsAnimationTargets, RecentsEvent};
use crate::executor::BackgroundExecutor;
use crate::gesture_state::GestureId;
use crate::system::os::{
    ActivityType, RemoteAnimationTarget, SystemAnimationController, SystemUiProxy, TaskId,
    ThumbnailData,
};
use crate::utils::Rect;

// =============================================================================
// Binder side
// =============================================================================

/// The OS facing end of one recents animation. Safe to call from any thread.
#[derive(Clone)]
pub struct RecentsAnimationRunner {
    id: CallbacksId,
    tx: Sender<RecentsEvent>,
    cancelled: Arc<AtomicBool>,
    system_ui: Arc<dyn SystemUiProxy>,
}

impl RecentsAnimationRunner {
    pub fn id(&self) -> CallbacksId {
        self.id
    }

    pub fn on_animation_start(
        &self,
        controller: Arc<dyn SystemAnimationController>,
        apps: Vec<RemoteAnimationTarget>,
        wallpapers: Vec<RemoteAnimationTarget>,
        home_content_insets: Rect,
        minimized_home_bounds: Option<Rect>,
    ) {
        let cancelled = self.cancelled.load(Ordering::Acquire);

        let non_home_apps: Vec<_> = apps
            .iter()
            .filter(|target| target.activity_type != ActivityType::Home)
            .cloned()
            .collect();
        let non_apps = self
            .system_ui
            .on_going_to_recents_legacy(cancelled, &non_home_apps);

        let event = if cancelled {
            RecentsEvent::FinishToApp {
                id: self.id,
                controller,
            }
        } else {
            RecentsEvent::Started {
                id: self.id,
                controller,
                targets: RecentsAnimationTargets {
                    apps,
                    wallpapers,
                    non_apps,
                    home_content_insets,
                    minimized_home_bounds,
                },
            }
        };
        self.post(event);
    }

    pub fn on_animation_canceled(&self, thumbnails: Option<HashMap<TaskId, ThumbnailData>>) {
        self.post(RecentsEvent::Canceled {
            id: self.id,
            thumbnails,
        });
    }

    pub fn on_tasks_appeared(&self, apps: Vec<RemoteAnimationTarget>) {
        self.post(RecentsEvent::TasksAppeared { id: self.id, apps });
    }

    /// Cancels from the launcher side. A start arriving later finishes straight back to the
    /// app.
    pub fn notify_animation_canceled(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.on_animation_canceled(None);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn post(&self, event: RecentsEvent) {
        if self.tx.send(event).is_err() {
            warn!("{}: UI loop is gone, dropping recents animation event", self.id);
        }
    }
}

impl fmt::Debug for RecentsAnimationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentsAnimationRunner")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// =============================================================================
// UI side
// =============================================================================

/// Who to tell about a recents animation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    SharedState,
    /// The swipe handler of a gesture, together with its gesture state.
    Gesture(GestureId),
}

/// An event, resolved on the UI thread, to fan out to every listener.
#[derive(Debug, Clone)]
pub enum RecentsDispatch {
    Start {
        controller: RecentsAnimationController,
        targets: Arc<RecentsAnimationTargets>,
    },
    Canceled(Option<HashMap<TaskId, ThumbnailData>>),
    TasksAppeared(Vec<RemoteAnimationTarget>),
    Finished(RecentsAnimationController),
}

pub struct RecentsAnimationCallbacks {
    runner: RecentsAnimationRunner,
    listeners: Vec<ListenerKey>,
    controller: Option<RecentsAnimationController>,
    allow_minimize_split_screen: bool,
}

impl RecentsAnimationCallbacks {
    pub fn new(
        id: CallbacksId,
        tx: Sender<RecentsEvent>,
        system_ui: Arc<dyn SystemUiProxy>,
        allow_minimize_split_screen: bool,
    ) -> Self {
        Self {
            runner: RecentsAnimationRunner {
                id,
                tx,
                cancelled: Arc::new(AtomicBool::new(false)),
                system_ui,
            },
            listeners: Vec::new(),
            controller: None,
            allow_minimize_split_screen,
        }
    }

    pub fn id(&self) -> CallbacksId {
        self.runner.id
    }

    pub fn runner(&self) -> RecentsAnimationRunner {
        self.runner.clone()
    }

    pub fn controller(&self) -> Option<&RecentsAnimationController> {
        self.controller.as_ref()
    }

    pub fn add_listener(&mut self, listener: ListenerKey) {
        if !self.listeners.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    pub fn remove_listener(&mut self, listener: ListenerKey) {
        self.listeners.retain(|l| *l != listener);
    }

    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Snapshot of the listeners; changes made while dispatching apply to the next event.
    pub fn listeners(&self) -> Vec<ListenerKey> {
        self.listeners.clone()
    }

    pub fn notify_animation_canceled(&self) {
        self.runner.notify_animation_canceled();
    }

    /// Resolves a binder event into what the listeners should see.
    pub fn on_event(
        &mut self,
        event: RecentsEvent,
        executor: &BackgroundExecutor,
    ) -> Option<RecentsDispatch> {
        let _span = tracy_client::span!("RecentsAnimationCallbacks::on_event");

        match event {
            RecentsEvent::Started {
                controller,
                targets,
                ..
            } => {
                let controller = self.new_controller(controller, executor);
                debug!(
                    "{}: recents animation started with {} app targets",
                    self.id(),
                    targets.apps.len()
                );
                Some(RecentsDispatch::Start {
                    controller,
                    targets: Arc::new(targets),
                })
            }
            RecentsEvent::FinishToApp { controller, .. } => {
                debug!("{}: started after cancel, finishing to app", self.id());
                let controller = self.new_controller(controller, executor);
                controller.finish_animation_to_app();
                None
            }
            RecentsEvent::Canceled { thumbnails, .. } => {
                debug!("{}: recents animation canceled", self.id());
                Some(RecentsDispatch::Canceled(thumbnails))
            }
            RecentsEvent::TasksAppeared { apps, .. } => Some(RecentsDispatch::TasksAppeared(apps)),
            RecentsEvent::Finished { .. } => {
                let Some(controller) = self.controller.clone() else {
                    warn!("{}: finished without a controller", self.id());
                    return None;
                };
                Some(RecentsDispatch::Finished(controller))
            }
        }
    }

    fn new_controller(
        &mut self,
        os: Arc<dyn SystemAnimationController>,
        executor: &BackgroundExecutor,
    ) -> RecentsAnimationController {
        let controller = RecentsAnimationController::new(
            self.id(),
            os,
            executor.clone(),
            self.runner.tx.clone(),
            self.allow_minimize_split_screen,
        );
        self.controller = Some(controller.clone());
        controller
    }
}

impl fmt::Debug for RecentsAnimationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentsAnimationCallbacks")
            .field("id", &self.id())
            .field("listeners", &self.listeners)
            .field("controller", &self.controller)
            .finish()
    }
}
