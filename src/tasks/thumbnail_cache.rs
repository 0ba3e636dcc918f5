use std::collections::HashMap;
use std::fmt;

use calloop::channel::Sender;
use tracing::{debug, trace, warn};

use super::{post, CancellableTask, ModelMsg, Task, TaskKey, TaskKeyLruCache};
use crate::executor::BackgroundExecutor;
use crate::system::os::{OsServices, TaskId, ThumbnailData};

pub type ThumbnailCallback = Box<dyn FnOnce(ThumbnailData)>;

/// Decides whether thumbnails load at full resolution.
pub struct HighResLoadingState {
    force_high_res: bool,
    visible: bool,
    flinging_fast: bool,
    enabled: bool,
    callbacks: Vec<(u64, Box<dyn FnMut(bool)>)>,
    next_callback_id: u64,
}

impl HighResLoadingState {
    pub fn new(force_high_res: bool) -> Self {
        Self {
            force_high_res,
            visible: false,
            flinging_fast: false,
            enabled: force_high_res,
            callbacks: Vec::new(),
            next_callback_id: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Registers a callback for changes of [`Self::is_enabled`]. Returns an id for removal.
    pub fn add_callback(&mut self, callback: impl FnMut(bool) + 'static) -> u64 {
        let id = self.next_callback_id;
        self.next_callback_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn remove_callback(&mut self, id: u64) {
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.update_state();
    }

    pub fn set_flinging_fast(&mut self, flinging_fast: bool) {
        self.flinging_fast = flinging_fast;
        self.update_state();
    }

    fn update_state(&mut self) {
        let enabled = self.force_high_res || (self.visible && !self.flinging_fast);
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;

        trace!("high res loading enabled: {enabled}");
        // Newest first.
        for (_, callback) in self.callbacks.iter_mut().rev() {
            callback(enabled);
        }
    }
}

impl fmt::Debug for HighResLoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighResLoadingState")
            .field("force_high_res", &self.force_high_res)
            .field("visible", &self.visible)
            .field("flinging_fast", &self.flinging_fast)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

struct PendingLoad {
    task: CancellableTask,
    key: TaskKey,
    callback: Option<ThumbnailCallback>,
}

pub struct TaskThumbnailCache {
    os: OsServices,
    executor: BackgroundExecutor,
    tx: Sender<ModelMsg>,
    cache: TaskKeyLruCache<ThumbnailData>,
    high_res_loading_state: HighResLoadingState,
    preloading_configured: bool,
    pending: HashMap<u64, PendingLoad>,
    next_token: u64,
}

impl TaskThumbnailCache {
    pub fn new(
        config: &quickstep_config::Recents,
        os: OsServices,
        executor: BackgroundExecutor,
        tx: Sender<ModelMsg>,
    ) -> Self {
        Self {
            os,
            executor,
            tx,
            cache: TaskKeyLruCache::new(config.thumbnail_cache_size),
            high_res_loading_state: HighResLoadingState::new(config.force_high_res),
            preloading_configured: !config.disable_thumbnail_preload,
            pending: HashMap::new(),
            next_token: 0,
        }
    }

    /// Starts a low resolution load into the cache unless the task already has a thumbnail.
    pub fn update_thumbnail_in_cache(&mut self, task: &Task) {
        if task.thumbnail.is_none() {
            let _ = self.load(task.key.clone(), true, None);
        }
    }

    /// Replaces the thumbnail of a task only if it is already cached.
    pub fn update_task_snapshot(&mut self, task_id: TaskId, thumbnail: ThumbnailData) {
        self.cache.update_if_already_in_cache(task_id, thumbnail);
    }

    /// Fetches a thumbnail for `task` at the resolution the loading state asks for.
    ///
    /// Calls back right away when the task or the cache already has a good enough thumbnail and
    /// returns `None`. Otherwise the load runs in the background and the returned handle can
    /// cancel it.
    pub fn update_thumbnail_in_background(
        &mut self,
        task: &Task,
        callback: impl FnOnce(ThumbnailData) + 'static,
    ) -> Option<CancellableTask> {
        let low_resolution = !self.high_res_loading_state.is_enabled();
        if let Some(thumbnail) = &task.thumbnail {
            if is_good_enough(thumbnail, low_resolution) {
                callback(thumbnail.clone());
                return None;
            }
        }

        self.load(task.key.clone(), low_resolution, Some(Box::new(callback)))
    }

    fn load(
        &mut self,
        key: TaskKey,
        low_resolution: bool,
        callback: Option<ThumbnailCallback>,
    ) -> Option<CancellableTask> {
        if let Some(cached) = self.cache.get_and_invalidate_if_modified(&key) {
            if is_good_enough(cached, low_resolution) {
                trace!("thumbnail for task {} served from cache", key.id);
                if let Some(callback) = callback {
                    callback(cached.clone());
                }
                return None;
            }
        }

        // Cancelled jobs bail out without replying.
        self.prune_cancelled();

        let task = CancellableTask::new();
        let token = self.next_token;
        self.next_token += 1;

        let bg_task = task.clone();
        let activity_manager = self.os.activity_manager.clone();
        let tx = self.tx.clone();
        let task_id = key.id;
        self.executor.execute(move || {
            if bg_task.is_cancelled() {
                return;
            }
            let thumbnail = match activity_manager.task_thumbnail(task_id, low_resolution) {
                Ok(thumbnail) => Some(thumbnail),
                Err(err) => {
                    warn!("error loading thumbnail for task {task_id}: {err:?}");
                    None
                }
            };
            if bg_task.is_cancelled() {
                return;
            }
            post(&tx, ModelMsg::Thumbnail { token, thumbnail });
        });

        self.pending.insert(
            token,
            PendingLoad {
                task: task.clone(),
                key,
                callback,
            },
        );
        Some(task)
    }

    pub(crate) fn on_thumbnail_loaded(&mut self, token: u64, thumbnail: Option<ThumbnailData>) {
        let Some(pending) = self.pending.remove(&token) else {
            return;
        };
        if pending.task.is_cancelled() {
            debug!("dropping cancelled thumbnail for task {}", pending.key.id);
            return;
        }
        let Some(thumbnail) = thumbnail else {
            return;
        };

        self.cache.put(pending.key, thumbnail.clone());
        if let Some(callback) = pending.callback {
            callback(thumbnail);
        }
    }

    pub fn clear(&mut self) {
        self.cache.evict_all();
    }

    pub fn remove(&mut self, task_id: TaskId) {
        self.cache.remove(task_id);
    }

    pub fn cache_size(&self) -> usize {
        self.cache.max_size()
    }

    pub fn high_res_loading_state(&mut self) -> &mut HighResLoadingState {
        &mut self.high_res_loading_state
    }

    pub fn is_preloading_enabled(&self) -> bool {
        self.preloading_configured && self.high_res_loading_state.is_visible()
    }

    /// Drops pending loads that were cancelled before their result arrived.
    fn prune_cancelled(&mut self) {
        self.pending.retain(|_, pending| !pending.task.is_cancelled());
    }
}

impl fmt::Debug for TaskThumbnailCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskThumbnailCache")
            .field("cached", &self.cache.len())
            .field("pending", &self.pending.len())
            .field("high_res_loading_state", &self.high_res_loading_state)
            .finish()
    }
}

/// A full resolution thumbnail always serves; a reduced one only serves low resolution requests.
fn is_good_enough(thumbnail: &ThumbnailData, low_resolution: bool) -> bool {
    thumbnail.bitmap.is_some() && (!thumbnail.reduced_resolution || low_resolution)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn high_res_state_edges() {
        let mut state = HighResLoadingState::new(false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        state.add_callback(move |enabled| seen2.borrow_mut().push(enabled));

        assert!(!state.is_enabled());
        state.set_visible(true);
        assert!(state.is_enabled());
        state.set_flinging_fast(true);
        assert!(!state.is_enabled());
        state.set_flinging_fast(true);
        state.set_flinging_fast(false);
        state.set_visible(false);

        assert_eq!(*seen.borrow(), [true, false, true, false]);
    }

    #[test]
    fn forced_high_res_never_changes() {
        let mut state = HighResLoadingState::new(true);
        let id = state.add_callback(|_| panic!("must not fire"));
        state.set_visible(true);
        state.set_flinging_fast(true);
        assert!(state.is_enabled());
        state.remove_callback(id);
    }
}
