use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use calloop::channel::Sender;
use tracing::{debug, trace};

use super::{post, CancellableTask, ModelMsg, Task, TaskKey, TaskKeyLruCache};
use crate::executor::BackgroundExecutor;
use crate::system::os::{Icon, IconLoader, TaskId, UserId};

/// What the icon cache stores per task.
#[derive(Debug, Clone, PartialEq)]
pub struct IconCacheEntry {
    pub icon: Icon,
    /// Empty unless accessibility is on.
    pub content_description: String,
}

pub type IconCallback = Box<dyn FnOnce(IconCacheEntry)>;

struct PendingLoad {
    task: CancellableTask,
    task_id: TaskId,
    callback: IconCallback,
}

/// Icons and content descriptions of recent tasks.
///
/// Unlike the thumbnail cache, lookups happen on the background executor, so the LRU sits behind
/// a mutex.
pub struct TaskIconCache {
    icon_loader: Arc<dyn IconLoader>,
    executor: BackgroundExecutor,
    tx: Sender<ModelMsg>,
    current_user: UserId,
    cache: Arc<Mutex<TaskKeyLruCache<IconCacheEntry>>>,
    default_icons: Arc<Mutex<HashMap<UserId, Icon>>>,
    pending: HashMap<u64, PendingLoad>,
    next_token: u64,
}

impl TaskIconCache {
    pub fn new(
        config: &quickstep_config::Recents,
        icon_loader: Arc<dyn IconLoader>,
        executor: BackgroundExecutor,
        tx: Sender<ModelMsg>,
        current_user: UserId,
    ) -> Self {
        Self {
            icon_loader,
            executor,
            tx,
            current_user,
            cache: Arc::new(Mutex::new(TaskKeyLruCache::new(config.icon_cache_size))),
            default_icons: Arc::new(Mutex::new(HashMap::new())),
            pending: HashMap::new(),
            next_token: 0,
        }
    }

    /// Loads the icon and content description for `task`.
    ///
    /// A task that already has its icon calls back right away and returns `None`.
    pub fn update_icon_in_background(
        &mut self,
        task: &Task,
        callback: impl FnOnce(IconCacheEntry) + 'static,
    ) -> Option<CancellableTask> {
        if let Some(icon) = &task.icon {
            callback(IconCacheEntry {
                icon: icon.clone(),
                content_description: task.title_description.clone().unwrap_or_default(),
            });
            return None;
        }

        self.pending.retain(|_, pending| !pending.task.is_cancelled());

        let request = CancellableTask::new();
        let token = self.next_token;
        self.next_token += 1;

        let bg_request = request.clone();
        let loader = EntryLoader {
            icon_loader: self.icon_loader.clone(),
            cache: self.cache.clone(),
            default_icons: self.default_icons.clone(),
            current_user: self.current_user,
        };
        let key = task.key.clone();
        let label = task.title.clone();
        let tx = self.tx.clone();
        self.executor.execute(move || {
            if bg_request.is_cancelled() {
                return;
            }
            let entry = loader.cache_entry(&key, label.as_deref());
            if bg_request.is_cancelled() {
                return;
            }
            post(&tx, ModelMsg::Icon { token, entry });
        });

        self.pending.insert(
            token,
            PendingLoad {
                task: request.clone(),
                task_id: task.key.id,
                callback: Box::new(callback),
            },
        );
        Some(request)
    }

    pub(crate) fn on_icon_loaded(&mut self, token: u64, entry: IconCacheEntry) {
        let Some(pending) = self.pending.remove(&token) else {
            return;
        };
        if pending.task.is_cancelled() {
            debug!("dropping cancelled icon for task {}", pending.task_id);
            return;
        }
        (pending.callback)(entry);
    }

    pub fn clear(&mut self) {
        self.lock_cache().evict_all();
    }

    pub fn on_task_removed(&mut self, task_id: TaskId) {
        self.lock_cache().remove(task_id);
    }

    /// Drops every cached entry of `package` for `user_id`, on the background executor.
    pub fn invalidate_cache_entries(&self, package: &str, user_id: UserId) {
        let cache = self.cache.clone();
        let package = package.to_owned();
        self.executor.execute(move || {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove_all(|key| key.package() == Some(package.as_str()) && key.user_id == user_id);
        });
    }

    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, TaskKeyLruCache<IconCacheEntry>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TaskIconCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskIconCache")
            .field("cached", &self.cached_len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// The background half of an icon request.
struct EntryLoader {
    icon_loader: Arc<dyn IconLoader>,
    cache: Arc<Mutex<TaskKeyLruCache<IconCacheEntry>>>,
    default_icons: Arc<Mutex<HashMap<UserId, Icon>>>,
    current_user: UserId,
}

impl EntryLoader {
    fn cache_entry(&self, key: &TaskKey, task_label: Option<&str>) -> IconCacheEntry {
        let _span = tracy_client::span!("TaskIconCache::cache_entry");

        if let Some(entry) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_and_invalidate_if_modified(key)
        {
            trace!("icon for task {} served from cache", key.id);
            return entry.clone();
        }

        let icon = self
            .icon_loader
            .task_description_icon(key.id)
            .or_else(|| {
                key.component
                    .as_ref()
                    .and_then(|component| self.icon_loader.activity_icon(component, key.user_id))
            })
            .unwrap_or_else(|| self.default_icon(key.user_id));

        let content_description = if self.icon_loader.is_accessibility_enabled() {
            self.content_description(key, task_label).unwrap_or_default()
        } else {
            String::new()
        };

        let entry = IconCacheEntry {
            icon,
            content_description,
        };
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key.clone(), entry.clone());
        entry
    }

    /// The app label, badged for other users, followed by the task label when it differs.
    fn content_description(&self, key: &TaskKey, task_label: Option<&str>) -> Option<String> {
        let package = key.package()?;
        let app_label = self.icon_loader.application_label(package, key.user_id)?;
        let app_label = app_label.trim();

        let task_label = task_label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(app_label);

        let badged = if key.user_id != self.current_user {
            self.icon_loader.badged_label(app_label, key.user_id)
        } else {
            app_label.to_owned()
        };

        if app_label == task_label {
            Some(badged)
        } else {
            Some(format!("{badged} {task_label}"))
        }
    }

    fn default_icon(&self, user_id: UserId) -> Icon {
        self.default_icons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_insert_with(|| self.icon_loader.default_icon(user_id))
            .clone()
    }
}
