//! State handed from one swipe to the next, so that a new gesture can pick up the recents
//! animation a previous one left running.

use std::fmt;
use std::sync::Arc;

use calloop::channel::Sender;
use tracing::{debug, warn};

use crate::gesture_state::GestureEndTarget;
use crate::recents_animation::{
    CallbacksId, ListenerKey, RecentsAnimationCallbacks, RecentsAnimationController,
    RecentsAnimationTargets, RecentsDispatch, RecentsEvent,
};
use crate::system::os::{SystemUiProxy, TaskId};

#[derive(Debug, Default)]
pub struct SwipeSharedState {
    next_callbacks_id: u64,
    callbacks: Option<RecentsAnimationCallbacks>,
    /// The running animation as last dispatched, replayed to listeners that join late.
    last_animation: Option<(RecentsAnimationController, Arc<RecentsAnimationTargets>)>,
    last_animation_cancelled: bool,
    last_animation_running: bool,

    going_to_launcher: bool,
    can_gesture_be_continued: bool,
    recents_animation_finish_interrupted: bool,
    next_running_task_id: Option<TaskId>,
}

impl SwipeSharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn going_to_launcher(&self) -> bool {
        self.going_to_launcher
    }

    pub fn can_gesture_be_continued(&self) -> bool {
        self.can_gesture_be_continued
    }

    pub fn recents_animation_finish_interrupted(&self) -> bool {
        self.recents_animation_finish_interrupted
    }

    pub fn next_running_task_id(&self) -> Option<TaskId> {
        self.next_running_task_id
    }

    /// Creates the callbacks for a new recents animation, replacing the previous ones.
    ///
    /// Returns the listeners of the replaced callbacks; they must be told the animation was
    /// cancelled.
    pub fn new_recents_animation_callbacks(
        &mut self,
        tx: Sender<RecentsEvent>,
        system_ui: Arc<dyn SystemUiProxy>,
        allow_minimize_split_screen: bool,
    ) -> (&mut RecentsAnimationCallbacks, Vec<ListenerKey>) {
        if self.last_animation_running {
            warn!("new recents animation started before the old one completed");
        }
        let orphaned = self.clear_listener_state(false);

        self.next_callbacks_id += 1;
        let id = CallbacksId(self.next_callbacks_id);
        let mut callbacks =
            RecentsAnimationCallbacks::new(id, tx, system_ui, allow_minimize_split_screen);
        callbacks.add_listener(ListenerKey::SharedState);
        debug!("{id}: new recents animation callbacks");

        (self.callbacks.insert(callbacks), orphaned)
    }

    pub fn active_callbacks(&mut self) -> Option<&mut RecentsAnimationCallbacks> {
        self.callbacks.as_mut()
    }

    pub fn active_callbacks_id(&self) -> Option<CallbacksId> {
        self.callbacks.as_ref().map(|callbacks| callbacks.id())
    }

    /// Tracks the animation through its own listener slot.
    pub fn on_dispatch(&mut self, dispatch: &RecentsDispatch) {
        match dispatch {
            RecentsDispatch::Start {
                controller,
                targets,
            } => {
                self.last_animation = Some((controller.clone(), targets.clone()));
                self.last_animation_cancelled = false;
                self.last_animation_running = true;
            }
            RecentsDispatch::Canceled(_) => {
                self.last_animation = None;
                self.last_animation_cancelled = true;
                self.last_animation_running = false;
            }
            RecentsDispatch::TasksAppeared(_) => (),
            RecentsDispatch::Finished(controller) => {
                let ours = self
                    .last_animation
                    .as_ref()
                    .is_some_and(|(last, _)| last.ptr_eq(controller));
                if ours {
                    self.last_animation_running = false;
                }
            }
        }
    }

    /// What a listener joining now has missed.
    pub fn active_recents_animation_state(&self) -> Option<RecentsDispatch> {
        if let Some((controller, targets)) = &self.last_animation {
            Some(RecentsDispatch::Start {
                controller: controller.clone(),
                targets: targets.clone(),
            })
        } else if self.last_animation_cancelled {
            Some(RecentsDispatch::Canceled(None))
        } else {
            None
        }
    }

    /// The animation was cut short while `next_task` was launching. The next gesture continues
    /// with that task as the running one, and without the old targets.
    pub fn set_recents_animation_finish_interrupted(&mut self, next_task: Option<TaskId>) {
        self.recents_animation_finish_interrupted = true;
        self.next_running_task_id = next_task;
        if let Some((_, targets)) = &mut self.last_animation {
            *targets = Arc::new(RecentsAnimationTargets {
                apps: Vec::new(),
                wallpapers: Vec::new(),
                non_apps: Vec::new(),
                ..RecentsAnimationTargets::clone(targets)
            });
        }
    }

    /// Records how the gesture being replaced ended.
    pub fn on_gesture_handed_over(&mut self, end_target: Option<GestureEndTarget>) {
        self.can_gesture_be_continued = end_target.is_some_and(GestureEndTarget::can_be_continued);
        self.going_to_launcher = end_target.is_some_and(GestureEndTarget::is_launcher);
    }

    /// Drops the callbacks, finishing or cancelling an animation that is still running.
    ///
    /// Returns the listeners that were still attached.
    fn clear_listener_state(&mut self, finish_animation: bool) -> Vec<ListenerKey> {
        let mut orphaned = Vec::new();
        if let Some(mut callbacks) = self.callbacks.take() {
            callbacks.remove_listener(ListenerKey::SharedState);
            callbacks.notify_animation_canceled();
            orphaned = callbacks.listeners();

            if self.last_animation_running {
                if let Some((controller, _)) = self.last_animation.take() {
                    debug!(
                        "{}: {} leftover recents animation",
                        controller.id(),
                        if finish_animation { "finishing" } else { "cancelling" }
                    );
                    controller.finish(finish_animation, false);
                }
            }
        }

        self.last_animation = None;
        self.last_animation_cancelled = false;
        self.last_animation_running = false;
        orphaned
    }

    /// Forgets everything carried between gestures.
    pub fn clear_all_state(&mut self, finish_animation: bool) -> Vec<ListenerKey> {
        let orphaned = self.clear_listener_state(finish_animation);
        self.can_gesture_be_continued = false;
        self.recents_animation_finish_interrupted = false;
        self.next_running_task_id = None;
        self.going_to_launcher = false;
        orphaned
    }

    pub fn dump(&self, prefix: &str, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{prefix}goingToLauncher={}", self.going_to_launcher)?;
        writeln!(
            out,
            "{prefix}canGestureBeContinued={}",
            self.can_gesture_be_continued
        )?;
        writeln!(
            out,
            "{prefix}recentsAnimationFinishInterrupted={}",
            self.recents_animation_finish_interrupted
        )?;
        match self.next_running_task_id {
            Some(id) => writeln!(out, "{prefix}nextRunningTaskId={id}")?,
            None => writeln!(out, "{prefix}nextRunningTaskId=none")?,
        }
        writeln!(out, "{prefix}lastAnimationCancelled={}", self.last_animation_cancelled)?;
        writeln!(out, "{prefix}lastAnimationRunning={}", self.last_animation_running)
    }
}
