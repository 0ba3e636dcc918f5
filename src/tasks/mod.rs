//! Recent task data: the versioned task list, thumbnail and icon caches, and the model tying
//! them to OS notifications.

use std::fmt;

use calloop::channel::Sender;
use quickstep_config::ComponentName;
use tracing::warn;

use crate::system::os::{
    Icon, RecentTaskInfo, RunningTaskInfo, SplitBounds, TaskId, ThumbnailData, UserId,
    WindowingMode,
};

pub mod cancellable;
pub mod icon_cache;
pub mod list;
pub mod lru;
pub mod model;
pub mod thumbnail_cache;

pub use cancellable::CancellableTask;
pub use icon_cache::{IconCacheEntry, TaskIconCache};
pub use list::{RecentTasksList, TaskLoadResult};
pub use lru::TaskKeyLruCache;
pub use model::{ModelNotifier, RecentsModel, TaskVisualsChangeListener, TrimMemoryLevel};
pub use thumbnail_cache::{HighResLoadingState, TaskThumbnailCache};

/// Identity of a task at a point in time. A changed `last_active_time` means cached data for
/// the task is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub id: TaskId,
    pub user_id: UserId,
    pub component: Option<ComponentName>,
    pub source_component: Option<ComponentName>,
    pub last_active_time: u64,
    pub windowing_mode: WindowingMode,
}

impl TaskKey {
    pub fn package(&self) -> Option<&str> {
        self.component.as_ref().map(|c| c.package.as_str())
    }
}

impl From<&RecentTaskInfo> for TaskKey {
    fn from(info: &RecentTaskInfo) -> Self {
        Self {
            id: info.task_id,
            user_id: info.user_id,
            component: info.component.clone(),
            source_component: info.top_activity.clone().or_else(|| info.component.clone()),
            last_active_time: info.last_active_time,
            windowing_mode: info.windowing_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub key: TaskKey,
    pub is_locked: bool,
    /// Stands in for a whole freeform desktop.
    pub desktop_tile: bool,
    pub top_activity: Option<ComponentName>,
    pub title: Option<String>,
    pub title_description: Option<String>,
    pub thumbnail: Option<ThumbnailData>,
    pub icon: Option<Icon>,
}

impl Task {
    /// A task with only its key loaded.
    pub fn from_key(key: TaskKey) -> Self {
        Self {
            top_activity: key.source_component.clone(),
            key,
            is_locked: false,
            desktop_tile: false,
            title: None,
            title_description: None,
            thumbnail: None,
            icon: None,
        }
    }

    pub fn from_info(info: &RecentTaskInfo, is_locked: bool) -> Self {
        let mut task = Self::from_key(TaskKey::from(info));
        task.is_locked = is_locked;
        task.title = info.label.clone();
        task
    }
}

/// One tile of the recents view: a task, or a split pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTask {
    pub task1: Task,
    pub task2: Option<Task>,
    pub split_bounds: Option<SplitBounds>,
}

impl GroupTask {
    pub fn single(task: Task) -> Self {
        Self {
            task1: task,
            task2: None,
            split_bounds: None,
        }
    }

    pub fn has_multiple_tasks(&self) -> bool {
        self.task2.is_some()
    }

    pub fn contains_task(&self, task_id: TaskId) -> bool {
        self.task1.key.id == task_id || self.task2.as_ref().is_some_and(|t| t.key.id == task_id)
    }
}

pub type TasksCallback = Box<dyn FnOnce(Vec<GroupTask>)>;

/// What to do with a task list once it arrives on the UI thread.
pub(crate) enum TasksConsumer {
    Callback(TasksCallback),
    /// Fill the thumbnail cache for every task but the running one.
    PreloadThumbnails { running_task_id: Option<TaskId> },
    /// Look up one task and hand its key to the callback.
    FindTask {
        task_id: TaskId,
        callback: Box<dyn FnOnce(Option<TaskKey>)>,
    },
    /// Only warms the cache.
    Discard,
}

impl fmt::Debug for TasksConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TasksConsumer::Callback(_) => f.write_str("Callback"),
            TasksConsumer::PreloadThumbnails { running_task_id } => f
                .debug_struct("PreloadThumbnails")
                .field("running_task_id", running_task_id)
                .finish(),
            TasksConsumer::FindTask { task_id, .. } => {
                f.debug_struct("FindTask").field("task_id", task_id).finish()
            }
            TasksConsumer::Discard => f.write_str("Discard"),
        }
    }
}

/// Messages into the UI loop for the recents model.
pub enum ModelMsg {
    /// A list served from the UI cache, or a keys-only load.
    Tasks { token: u64, tasks: Vec<GroupTask> },
    /// A full load that should also replace the UI cache.
    Loaded { token: u64, result: TaskLoadResult },
    Thumbnail {
        token: u64,
        thumbnail: Option<ThumbnailData>,
    },
    Icon { token: u64, entry: IconCacheEntry },
    RecentTasksChanged,
    RunningTaskAppeared(RunningTaskInfo),
    RunningTaskVanished(RunningTaskInfo),
    TaskStackChanged,
    TaskSnapshotChanged {
        task_id: TaskId,
        snapshot: ThumbnailData,
    },
    TaskRemoved(TaskId),
    PackageIconChanged { package: String, user_id: UserId },
    TrimMemory(TrimMemoryLevel),
}

impl fmt::Debug for ModelMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelMsg::Tasks { token, tasks } => write!(f, "Tasks({token}, {} tasks)", tasks.len()),
            ModelMsg::Loaded { token, result } => {
                write!(f, "Loaded({token}, {} tasks)", result.tasks.len())
            }
            ModelMsg::Thumbnail { token, .. } => write!(f, "Thumbnail({token})"),
            ModelMsg::Icon { token, .. } => write!(f, "Icon({token})"),
            ModelMsg::RecentTasksChanged => f.write_str("RecentTasksChanged"),
            ModelMsg::RunningTaskAppeared(info) => {
                write!(f, "RunningTaskAppeared({})", info.task_id)
            }
            ModelMsg::RunningTaskVanished(info) => {
                write!(f, "RunningTaskVanished({})", info.task_id)
            }
            ModelMsg::TaskStackChanged => f.write_str("TaskStackChanged"),
            ModelMsg::TaskSnapshotChanged { task_id, .. } => {
                write!(f, "TaskSnapshotChanged({task_id})")
            }
            ModelMsg::TaskRemoved(task_id) => write!(f, "TaskRemoved({task_id})"),
            ModelMsg::PackageIconChanged { package, user_id } => {
                write!(f, "PackageIconChanged({package}, {user_id})")
            }
            ModelMsg::TrimMemory(level) => write!(f, "TrimMemory({level:?})"),
        }
    }
}

pub(crate) fn post(tx: &Sender<ModelMsg>, msg: ModelMsg) {
    if tx.send(msg).is_err() {
        warn!("UI loop is gone, dropping recents model message");
    }
}
