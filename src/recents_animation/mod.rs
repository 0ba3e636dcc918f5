//! The OS recents animation, adapted onto the UI loop.
//!
//! The OS calls [`RecentsAnimationRunner`] on a binder thread. Every call becomes a
//! [`RecentsEvent`] on a calloop channel; the UI side ([`RecentsAnimationCallbacks`]) turns
//! events into [`RecentsDispatch`] values that the service fans out to its listeners.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::system::os::{RemoteAnimationTarget, SystemAnimationController, TaskId, ThumbnailData};
use crate::utils::Rect;

pub mod callbacks;
pub mod controller;
pub mod wrapper;

pub use callbacks::{ListenerKey, RecentsAnimationCallbacks, RecentsAnimationRunner, RecentsDispatch};
pub use controller::RecentsAnimationController;
pub use wrapper::{FinishOutcome, RecentsAnimationWrapper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbacksId(pub u64);

impl fmt::Display for CallbacksId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The surfaces taking part in one recents animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentsAnimationTargets {
    pub apps: Vec<RemoteAnimationTarget>,
    pub wallpapers: Vec<RemoteAnimationTarget>,
    pub non_apps: Vec<RemoteAnimationTarget>,
    pub home_content_insets: Rect,
    pub minimized_home_bounds: Option<Rect>,
}

impl RecentsAnimationTargets {
    pub fn has_targets(&self) -> bool {
        !self.apps.is_empty()
    }

    pub fn find_task(&self, task_id: TaskId) -> Option<&RemoteAnimationTarget> {
        self.apps.iter().find(|target| target.task_id == task_id)
    }
}

/// Messages from the binder thread and the background executor to the UI loop.
pub enum RecentsEvent {
    Started {
        id: CallbacksId,
        controller: Arc<dyn SystemAnimationController>,
        targets: RecentsAnimationTargets,
    },
    /// The animation started after it had already been cancelled.
    FinishToApp {
        id: CallbacksId,
        controller: Arc<dyn SystemAnimationController>,
    },
    Canceled {
        id: CallbacksId,
        thumbnails: Option<HashMap<TaskId, ThumbnailData>>,
    },
    TasksAppeared {
        id: CallbacksId,
        apps: Vec<RemoteAnimationTarget>,
    },
    /// The OS finished the animation after a finish request.
    Finished { id: CallbacksId },
}

impl RecentsEvent {
    pub fn id(&self) -> CallbacksId {
        match self {
            RecentsEvent::Started { id, .. }
            | RecentsEvent::FinishToApp { id, .. }
            | RecentsEvent::Canceled { id, .. }
            | RecentsEvent::TasksAppeared { id, .. }
            | RecentsEvent::Finished { id } => *id,
        }
    }
}

impl fmt::Debug for RecentsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecentsEvent::Started { id, targets, .. } => f
                .debug_struct("Started")
                .field("id", id)
                .field("apps", &targets.apps.len())
                .finish(),
            RecentsEvent::FinishToApp { id, .. } => {
                f.debug_struct("FinishToApp").field("id", id).finish()
            }
            RecentsEvent::Canceled { id, thumbnails } => f
                .debug_struct("Canceled")
                .field("id", id)
                .field("thumbnails", &thumbnails.as_ref().map(HashMap::len))
                .finish(),
            RecentsEvent::TasksAppeared { id, apps } => f
                .debug_struct("TasksAppeared")
                .field("id", id)
                .field("apps", &apps.len())
                .finish(),
            RecentsEvent::Finished { id } => f.debug_struct("Finished").field("id", id).finish(),
        }
    }
}
