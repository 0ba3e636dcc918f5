use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use calloop::channel::Sender;
use tracing::{debug, trace, warn};

use super::{CallbacksId, RecentsEvent};
use crate::executor::BackgroundExecutor;
use crate::system::os::{SystemAnimationController, TaskId, ThumbnailData};

/// UI thread handle to a running recents animation.
///
/// Clones share the same state. Every OS call except the screenshot goes through the
/// background executor.
#[derive(Clone)]
pub struct RecentsAnimationController {
    inner: Rc<Inner>,
}

struct Inner {
    id: CallbacksId,
    os: Arc<dyn SystemAnimationController>,
    executor: BackgroundExecutor,
    tx: Sender<RecentsEvent>,
    allow_minimize_split_screen: bool,
    finish_requested: Cell<bool>,
    use_launcher_system_bar_flags: Cell<bool>,
    split_screen_minimized: Cell<bool>,
}

impl RecentsAnimationController {
    pub fn new(
        id: CallbacksId,
        os: Arc<dyn SystemAnimationController>,
        executor: BackgroundExecutor,
        tx: Sender<RecentsEvent>,
        allow_minimize_split_screen: bool,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                id,
                os,
                executor,
                tx,
                allow_minimize_split_screen,
                finish_requested: Cell::new(false),
                use_launcher_system_bar_flags: Cell::new(false),
                split_screen_minimized: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> CallbacksId {
        self.inner.id
    }

    pub fn is_finish_requested(&self) -> bool {
        self.inner.finish_requested.get()
    }

    /// Whether both handles refer to the same animation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Lets the launcher, rather than the app behind, drive the system bar appearance.
    pub fn set_use_launcher_system_bar_flags(&self, use_launcher: bool) {
        if self.inner.use_launcher_system_bar_flags.replace(use_launcher) == use_launcher {
            return;
        }

        trace!("{}: use launcher system bar flags: {use_launcher}", self.inner.id);
        let os = self.inner.os.clone();
        self.inner
            .executor
            .execute(move || os.set_animation_targets_behind_system_bars(!use_launcher));
    }

    pub fn set_split_screen_minimized(&self, minimized: bool) {
        if !self.inner.allow_minimize_split_screen {
            return;
        }
        if self.inner.split_screen_minimized.replace(minimized) == minimized {
            return;
        }

        let os = self.inner.os.clone();
        self.inner
            .executor
            .execute(move || os.set_split_screen_minimized(minimized));
    }

    pub fn enable_input_consumer(&self) {
        let os = self.inner.os.clone();
        self.inner
            .executor
            .execute(move || os.set_input_consumer_enabled(true));
    }

    /// Takes a screenshot of the task synchronously.
    pub fn screenshot_task(&self, task_id: TaskId) -> Option<ThumbnailData> {
        let _span = tracy_client::span!("RecentsAnimationController::screenshot_task");
        self.inner.os.screenshot_task(task_id)
    }

    pub fn set_defer_cancel_until_next_transition(&self, defer: bool, screenshot: bool) {
        let os = self.inner.os.clone();
        self.inner
            .executor
            .execute(move || os.set_defer_cancel_until_next_transition(defer, screenshot));
    }

    pub fn set_will_finish_to_home(&self, will_finish_to_home: bool) {
        let os = self.inner.os.clone();
        self.inner
            .executor
            .execute(move || os.set_will_finish_to_home(will_finish_to_home));
    }

    pub fn cleanup_screenshot(&self) {
        let os = self.inner.os.clone();
        self.inner.executor.execute(move || os.cleanup_screenshot());
    }

    pub fn finish_animation_to_home(&self) {
        self.finish(true, true);
    }

    pub fn finish_animation_to_app(&self) {
        self.finish(false, false);
    }

    /// Finishes the animation, leaving the launcher in front when `to_recents`.
    ///
    /// Only the first request reaches the OS. Completion arrives as [`RecentsEvent::Finished`].
    pub fn finish(&self, to_recents: bool, send_user_leave_hint: bool) {
        if self.inner.finish_requested.replace(true) {
            debug!("{}: finish already requested", self.inner.id);
            return;
        }

        debug!("{}: finishing (to recents: {to_recents})", self.inner.id);
        let os = self.inner.os.clone();
        let tx = self.inner.tx.clone();
        let id = self.inner.id;
        self.inner.executor.execute(move || {
            os.finish(to_recents, send_user_leave_hint);
            if tx.send(RecentsEvent::Finished { id }).is_err() {
                warn!("{id}: UI loop is gone, dropping finish notification");
            }
        });
    }
}

impl fmt::Debug for RecentsAnimationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentsAnimationController")
            .field("id", &self.inner.id)
            .field("finish_requested", &self.inner.finish_requested.get())
            .finish()
    }
}
