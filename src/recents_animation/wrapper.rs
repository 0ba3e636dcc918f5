use std::sync::Arc;

use tracing::debug;

use super::{RecentsAnimationController, RecentsAnimationTargets};
use crate::motion::{MotionAction, MotionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// A touch is in progress; the controller finishes on the next UP or CANCEL. The caller
    /// treats the finish as complete.
    Deferred,
    /// The OS was asked to finish; completion arrives as a finished event.
    Finishing,
    /// There was no controller left to finish.
    NoController,
}

/// What the owner should do with an event from the system input consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputProxyEvent {
    /// The first DOWN created the input proxy.
    pub proxy_created: bool,
    /// A deferred finish was flushed by this event.
    pub finished: bool,
}

/// Owns the controller of a swipe handler's recents animation and sequences finishing it
/// against touches routed through the system input consumer.
///
/// `A` is the owner's action type for work deferred until the controller arrives.
#[derive(Debug)]
pub struct RecentsAnimationWrapper<A> {
    controller: Option<(RecentsAnimationController, Arc<RecentsAnimationTargets>)>,
    on_init: Vec<A>,
    window_threshold_crossed: bool,
    touch_in_progress: bool,
    finish_pending: bool,
    input_proxy_created: bool,
}

impl<A> RecentsAnimationWrapper<A> {
    pub fn new() -> Self {
        Self {
            controller: None,
            on_init: Vec::new(),
            window_threshold_crossed: false,
            touch_in_progress: false,
            finish_pending: false,
            input_proxy_created: false,
        }
    }

    pub fn controller(&self) -> Option<&RecentsAnimationController> {
        self.controller.as_ref().map(|(controller, _)| controller)
    }

    pub fn targets(&self) -> Option<&Arc<RecentsAnimationTargets>> {
        self.controller.as_ref().map(|(_, targets)| targets)
    }

    pub fn has_targets(&self) -> bool {
        self.targets().is_some_and(|targets| targets.has_targets())
    }

    /// Installs or clears the controller. Returns the actions deferred until it arrived.
    pub fn set_controller(
        &mut self,
        controller: Option<(RecentsAnimationController, Arc<RecentsAnimationTargets>)>,
    ) -> Vec<A> {
        self.controller = controller;

        let Some((controller, _)) = &self.controller else {
            return Vec::new();
        };
        controller.set_use_launcher_system_bar_flags(self.window_threshold_crossed);

        std::mem::take(&mut self.on_init)
    }

    /// Returns `action` to run now if the controller is there, otherwise keeps it for
    /// [`Self::set_controller`].
    #[must_use]
    pub fn run_on_init(&mut self, action: A) -> Option<A> {
        if self.controller.is_some() {
            Some(action)
        } else {
            self.on_init.push(action);
            None
        }
    }

    pub fn finish(&mut self, to_recents: bool) -> FinishOutcome {
        self.finish_with_hint(to_recents, false)
    }

    pub fn finish_with_hint(&mut self, to_recents: bool, send_user_leave_hint: bool) -> FinishOutcome {
        if to_recents && self.touch_in_progress {
            debug!("touch in progress, deferring finish");
            self.finish_pending = true;
            return FinishOutcome::Deferred;
        }
        self.finish_and_clear(to_recents, send_user_leave_hint)
    }

    fn finish_and_clear(&mut self, to_recents: bool, send_user_leave_hint: bool) -> FinishOutcome {
        match self.controller.take() {
            Some((controller, _)) => {
                controller.finish(to_recents, send_user_leave_hint);
                FinishOutcome::Finishing
            }
            None => FinishOutcome::NoController,
        }
    }

    pub fn enable_input_consumer(&self) {
        if let Some(controller) = self.controller() {
            controller.enable_input_consumer();
        }
    }

    pub fn set_window_threshold_crossed(&mut self, crossed: bool) {
        if self.window_threshold_crossed == crossed {
            return;
        }
        self.window_threshold_crossed = crossed;
        if let Some(controller) = self.controller() {
            controller.set_use_launcher_system_bar_flags(crossed);
        }
    }

    pub fn is_touch_in_progress(&self) -> bool {
        self.touch_in_progress
    }

    pub fn is_finish_pending(&self) -> bool {
        self.finish_pending
    }

    /// Tracks a touch delivered through the system input consumer.
    pub fn on_input_consumer_motion(&mut self, event: &MotionEvent) -> InputProxyEvent {
        let mut result = InputProxyEvent {
            proxy_created: false,
            finished: false,
        };

        match event.action {
            MotionAction::Down => {
                self.touch_in_progress = true;
                if !self.input_proxy_created {
                    self.input_proxy_created = true;
                    result.proxy_created = true;
                }
            }
            MotionAction::Up | MotionAction::Cancel => {
                self.touch_in_progress = false;
                if self.finish_pending {
                    self.finish_pending = false;
                    self.finish_and_clear(true, false);
                    result.finished = true;
                }
            }
            _ => (),
        }

        result
    }

    pub fn has_input_proxy(&self) -> bool {
        self.input_proxy_created
    }

    /// Drops the input proxy along with any touch it was tracking.
    pub fn destroy_input_proxy(&mut self) {
        self.input_proxy_created = false;
        self.touch_in_progress = false;
    }
}

impl<A> Default for RecentsAnimationWrapper<A> {
    fn default() -> Self {
        Self::new()
    }
}
