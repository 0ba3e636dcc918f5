use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use calloop::channel::{self, Channel, Sender};
use quickstep_config::Recents;
use tracing::{debug, trace};

use super::{
    post, GroupTask, ModelMsg, RecentTasksList, Task, TaskIconCache, TaskKey, TaskThumbnailCache,
    TasksConsumer,
};
use crate::executor::BackgroundExecutor;
use crate::system::os::{OsServices, RunningTaskInfo, TaskId, ThumbnailData, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMemoryLevel {
    /// The launcher UI went to the background.
    UiHidden,
    RunningCritical,
    Other,
}

/// Views showing task visuals implement this to hear about updates.
pub trait TaskVisualsChangeListener {
    fn on_task_thumbnail_changed(&mut self, task_id: TaskId, thumbnail: &ThumbnailData);
    fn on_task_icon_changed(&mut self, package: &str, user_id: UserId);
}

/// Binder side handle that forwards task stack and system UI notifications to the model.
#[derive(Debug, Clone)]
pub struct ModelNotifier {
    tx: Sender<ModelMsg>,
}

impl ModelNotifier {
    pub fn on_recent_tasks_changed(&self) {
        post(&self.tx, ModelMsg::RecentTasksChanged);
    }

    pub fn on_running_task_appeared(&self, info: RunningTaskInfo) {
        post(&self.tx, ModelMsg::RunningTaskAppeared(info));
    }

    pub fn on_running_task_vanished(&self, info: RunningTaskInfo) {
        post(&self.tx, ModelMsg::RunningTaskVanished(info));
    }

    pub fn on_task_stack_changed(&self) {
        post(&self.tx, ModelMsg::TaskStackChanged);
    }

    pub fn on_task_snapshot_changed(&self, task_id: TaskId, snapshot: ThumbnailData) {
        post(&self.tx, ModelMsg::TaskSnapshotChanged { task_id, snapshot });
    }

    pub fn on_task_removed(&self, task_id: TaskId) {
        post(&self.tx, ModelMsg::TaskRemoved(task_id));
    }

    pub fn on_package_icon_changed(&self, package: &str, user_id: UserId) {
        post(
            &self.tx,
            ModelMsg::PackageIconChanged {
                package: package.to_owned(),
                user_id,
            },
        );
    }

    pub fn on_trim_memory(&self, level: TrimMemoryLevel) {
        post(&self.tx, ModelMsg::TrimMemory(level));
    }
}

/// Recent tasks and their visuals, owned by the UI loop.
pub struct RecentsModel {
    os: OsServices,
    tx: Sender<ModelMsg>,
    task_list: RecentTasksList,
    icon_cache: TaskIconCache,
    thumbnail_cache: TaskThumbnailCache,
    visuals_listeners: Vec<Rc<RefCell<dyn TaskVisualsChangeListener>>>,
}

impl RecentsModel {
    /// Creates the model and the channel its background replies and notifications arrive on.
    /// Insert the channel into the event loop and feed it to [`Self::handle_msg`].
    pub fn new(
        config: &Recents,
        os: OsServices,
        executor: BackgroundExecutor,
        current_user: UserId,
    ) -> (Self, Channel<ModelMsg>) {
        let (tx, rx) = channel::channel();

        let task_list = RecentTasksList::new(os.clone(), executor.clone(), tx.clone(), current_user);
        let icon_cache = TaskIconCache::new(
            config,
            os.icon_loader.clone(),
            executor.clone(),
            tx.clone(),
            current_user,
        );
        let thumbnail_cache = TaskThumbnailCache::new(config, os.clone(), executor, tx.clone());

        let model = Self {
            os,
            tx,
            task_list,
            icon_cache,
            thumbnail_cache,
            visuals_listeners: Vec::new(),
        };
        (model, rx)
    }

    pub fn notifier(&self) -> ModelNotifier {
        ModelNotifier {
            tx: self.tx.clone(),
        }
    }

    pub fn task_list(&mut self) -> &mut RecentTasksList {
        &mut self.task_list
    }

    pub fn icon_cache(&mut self) -> &mut TaskIconCache {
        &mut self.icon_cache
    }

    pub fn thumbnail_cache(&mut self) -> &mut TaskThumbnailCache {
        &mut self.thumbnail_cache
    }

    /// Fetches the recent tasks. The callback runs on a later loop turn.
    ///
    /// Returns the change id of the list the request was made against.
    pub fn get_tasks(&mut self, callback: impl FnOnce(Vec<GroupTask>) + 'static) -> i32 {
        self.task_list
            .get_tasks(false, TasksConsumer::Callback(Box::new(callback)))
    }

    /// Warms the task list cache.
    pub fn preload_tasks(&mut self) -> i32 {
        self.task_list.get_tasks(false, TasksConsumer::Discard)
    }

    pub fn is_task_list_valid(&self, change_id: i32) -> bool {
        self.task_list.is_task_list_valid(change_id)
    }

    /// Looks up the key of `task_id` with a keys-only load.
    pub fn find_task_with_id(
        &mut self,
        task_id: TaskId,
        callback: impl FnOnce(Option<TaskKey>) + 'static,
    ) {
        self.task_list.get_tasks(
            true,
            TasksConsumer::FindTask {
                task_id,
                callback: Box::new(callback),
            },
        );
    }

    pub fn add_visuals_change_listener(
        &mut self,
        listener: Rc<RefCell<dyn TaskVisualsChangeListener>>,
    ) {
        self.visuals_listeners.push(listener);
    }

    pub fn remove_visuals_change_listener(
        &mut self,
        listener: &Rc<RefCell<dyn TaskVisualsChangeListener>>,
    ) {
        self.visuals_listeners.retain(|l| !Rc::ptr_eq(l, listener));
    }

    pub fn handle_msg(&mut self, msg: ModelMsg) {
        trace!("recents model: {msg:?}");

        match msg {
            ModelMsg::Tasks { token, tasks } => {
                if let Some((consumer, tasks)) = self.task_list.on_tasks_delivered(token, tasks) {
                    self.consume_tasks(consumer, tasks);
                }
            }
            ModelMsg::Loaded { token, result } => {
                if let Some((consumer, tasks)) = self.task_list.on_tasks_loaded(token, result) {
                    self.consume_tasks(consumer, tasks);
                }
            }
            ModelMsg::Thumbnail { token, thumbnail } => {
                self.thumbnail_cache.on_thumbnail_loaded(token, thumbnail);
            }
            ModelMsg::Icon { token, entry } => self.icon_cache.on_icon_loaded(token, entry),
            ModelMsg::RecentTasksChanged => self.task_list.on_recent_tasks_changed(),
            ModelMsg::RunningTaskAppeared(info) => self.task_list.on_running_task_appeared(info),
            ModelMsg::RunningTaskVanished(info) => self.task_list.on_running_task_vanished(&info),
            ModelMsg::TaskStackChanged => self.on_task_stack_changed(),
            ModelMsg::TaskSnapshotChanged { task_id, snapshot } => {
                self.on_task_snapshot_changed(task_id, snapshot)
            }
            ModelMsg::TaskRemoved(task_id) => self.on_task_removed(task_id),
            ModelMsg::PackageIconChanged { package, user_id } => {
                self.on_package_icon_changed(&package, user_id)
            }
            ModelMsg::TrimMemory(level) => self.on_trim_memory(level),
        }
    }

    /// Keeps the thumbnail cache warm for the next time overview opens.
    pub fn on_task_stack_changed(&mut self) {
        if !self.thumbnail_cache.is_preloading_enabled() {
            return;
        }

        let running_task_id = self.os.activity_manager.running_task().map(|t| t.task_id);
        let cache_size = self.thumbnail_cache.cache_size();
        self.task_list.get_task_keys(
            cache_size,
            TasksConsumer::PreloadThumbnails { running_task_id },
        );
    }

    pub fn on_task_snapshot_changed(&mut self, task_id: TaskId, snapshot: ThumbnailData) {
        self.thumbnail_cache
            .update_task_snapshot(task_id, snapshot.clone());

        for listener in self.visuals_listeners.iter().rev() {
            listener
                .borrow_mut()
                .on_task_thumbnail_changed(task_id, &snapshot);
        }
    }

    pub fn on_task_removed(&mut self, task_id: TaskId) {
        self.thumbnail_cache.remove(task_id);
        self.icon_cache.on_task_removed(task_id);
    }

    pub fn on_trim_memory(&mut self, level: TrimMemoryLevel) {
        match level {
            TrimMemoryLevel::UiHidden => {
                self.thumbnail_cache
                    .high_res_loading_state()
                    .set_visible(false);
            }
            TrimMemoryLevel::RunningCritical => {
                debug!("memory is critical, clearing task caches");
                self.thumbnail_cache.clear();
                self.icon_cache.clear();
            }
            TrimMemoryLevel::Other => (),
        }
    }

    pub fn on_package_icon_changed(&mut self, package: &str, user_id: UserId) {
        self.icon_cache.invalidate_cache_entries(package, user_id);
        for listener in self.visuals_listeners.iter().rev() {
            listener.borrow_mut().on_task_icon_changed(package, user_id);
        }
    }

    pub fn dump(&self, prefix: &str, out: &mut impl fmt::Write) -> fmt::Result {
        self.task_list.dump(prefix, out)
    }

    fn consume_tasks(&mut self, consumer: TasksConsumer, tasks: Vec<GroupTask>) {
        match consumer {
            TasksConsumer::Callback(callback) => callback(tasks),
            TasksConsumer::PreloadThumbnails { running_task_id } => {
                // The running task will have a newer snapshot by the time overview shows.
                for task in tasks.iter().flat_map(group_tasks) {
                    if Some(task.key.id) != running_task_id {
                        self.thumbnail_cache.update_thumbnail_in_cache(task);
                    }
                }
            }
            TasksConsumer::FindTask { task_id, callback } => {
                let key = tasks
                    .iter()
                    .flat_map(group_tasks)
                    .find(|task| task.key.id == task_id)
                    .map(|task| task.key.clone());
                callback(key);
            }
            TasksConsumer::Discard => (),
        }
    }
}

impl fmt::Debug for RecentsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentsModel")
            .field("task_list", &self.task_list)
            .field("icon_cache", &self.icon_cache)
            .field("thumbnail_cache", &self.thumbnail_cache)
            .field("visuals_listeners", &self.visuals_listeners.len())
            .finish()
    }
}

fn group_tasks(group: &GroupTask) -> impl Iterator<Item = &Task> {
    std::iter::once(&group.task1).chain(group.task2.as_ref())
}
