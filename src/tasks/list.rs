use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use calloop::channel::Sender;
use tracing::{debug, trace};

use super::{post, GroupTask, ModelMsg, Task, TaskKey, TasksConsumer};
use crate::executor::BackgroundExecutor;
use crate::system::os::{GroupedRecentTaskInfo, OsServices, RecentTaskInfo, RunningTaskInfo, UserId};

/// Request id of a result that matches no request.
pub const INVALID_REQUEST_ID: i32 = -1;

/// A loaded task list, tagged with the change id it was loaded for.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLoadResult {
    pub request_id: i32,
    /// Only the task keys were loaded.
    pub keys_only: bool,
    pub tasks: Vec<GroupTask>,
}

impl TaskLoadResult {
    pub fn invalid() -> Self {
        Self {
            request_id: INVALID_REQUEST_ID,
            keys_only: false,
            tasks: Vec::new(),
        }
    }

    /// A full result serves keys-only requests too, but not the other way around.
    pub fn is_valid_for_request(&self, request_id: i32, keys_only: bool) -> bool {
        self.request_id == request_id && (!self.keys_only || keys_only)
    }
}

/// Versioned cache of the recent task list, plus the set of running tasks.
///
/// Lives on the UI thread. Loads run on the background executor and come back as
/// [`ModelMsg`]s, so callbacks always run on a later loop turn than the request.
pub struct RecentTasksList {
    os: OsServices,
    executor: BackgroundExecutor,
    tx: Sender<ModelMsg>,
    current_user: UserId,

    change_id: i32,
    loading_in_background: bool,
    results_ui: TaskLoadResult,
    /// Only touched from the background executor.
    results_bg: Arc<Mutex<TaskLoadResult>>,

    pending: HashMap<u64, TasksConsumer>,
    next_token: u64,

    /// Least recently launched first.
    running_tasks: Vec<RunningTaskInfo>,
    running_tasks_listener: Option<Box<dyn FnMut(&[RunningTaskInfo])>>,
}

impl RecentTasksList {
    pub fn new(
        os: OsServices,
        executor: BackgroundExecutor,
        tx: Sender<ModelMsg>,
        current_user: UserId,
    ) -> Self {
        // Appeared and vanished events may later overlap with this snapshot; both handlers
        // tolerate that.
        let mut running_tasks = os.system_ui.running_tasks(usize::MAX);
        running_tasks.reverse();

        Self {
            os,
            executor,
            tx,
            current_user,
            change_id: 1,
            loading_in_background: false,
            results_ui: TaskLoadResult::invalid(),
            results_bg: Arc::new(Mutex::new(TaskLoadResult::invalid())),
            pending: HashMap::new(),
            next_token: 0,
            running_tasks,
            running_tasks_listener: None,
        }
    }

    pub fn change_id(&self) -> i32 {
        self.change_id
    }

    pub fn is_loading_tasks_in_background(&self) -> bool {
        self.loading_in_background
    }

    pub fn is_task_list_valid(&self, change_id: i32) -> bool {
        self.change_id == change_id
    }

    /// Fetches the recent tasks, reusing the cached list when it is still current.
    ///
    /// Returns the change id the request was made against.
    pub(crate) fn get_tasks(&mut self, keys_only: bool, consumer: TasksConsumer) -> i32 {
        let request_id = self.change_id;
        let token = self.register(consumer);

        if self.results_ui.is_valid_for_request(request_id, keys_only) {
            trace!("serving request {request_id} from cache");
            // Copy now, the change id may move before the next turn.
            post(
                &self.tx,
                ModelMsg::Tasks {
                    token,
                    tasks: self.results_ui.tasks.clone(),
                },
            );
            return request_id;
        }

        debug!("loading recent tasks for request {request_id} (keys only: {keys_only})");
        self.loading_in_background = true;

        let os = self.os.clone();
        let tx = self.tx.clone();
        let results_bg = self.results_bg.clone();
        let user = self.current_user;
        self.executor.execute(move || {
            let mut results = results_bg.lock().unwrap_or_else(PoisonError::into_inner);
            if !results.is_valid_for_request(request_id, keys_only) {
                *results = load_tasks(&os, user, usize::MAX, request_id, keys_only);
            }
            post(
                &tx,
                ModelMsg::Loaded {
                    token,
                    result: results.clone(),
                },
            );
        });

        request_id
    }

    /// Loads the keys of the `num_tasks` most recent tasks, skipping every cache.
    pub(crate) fn get_task_keys(&mut self, num_tasks: usize, consumer: TasksConsumer) {
        let token = self.register(consumer);

        let os = self.os.clone();
        let tx = self.tx.clone();
        let user = self.current_user;
        self.executor.execute(move || {
            let result = load_tasks(&os, user, num_tasks, INVALID_REQUEST_ID, true);
            post(
                &tx,
                ModelMsg::Tasks {
                    token,
                    tasks: result.tasks,
                },
            );
        });
    }

    pub(crate) fn on_tasks_delivered(
        &mut self,
        token: u64,
        tasks: Vec<GroupTask>,
    ) -> Option<(TasksConsumer, Vec<GroupTask>)> {
        self.pending.remove(&token).map(|consumer| (consumer, tasks))
    }

    pub(crate) fn on_tasks_loaded(
        &mut self,
        token: u64,
        result: TaskLoadResult,
    ) -> Option<(TasksConsumer, Vec<GroupTask>)> {
        self.loading_in_background = false;
        let tasks = result.tasks.clone();
        self.results_ui = result;
        self.on_tasks_delivered(token, tasks)
    }

    pub fn on_recent_tasks_changed(&mut self) {
        let results_bg = self.results_bg.clone();
        self.executor.execute(move || {
            *results_bg.lock().unwrap_or_else(PoisonError::into_inner) = TaskLoadResult::invalid();
        });
        self.results_ui = TaskLoadResult::invalid();
        self.change_id += 1;
        trace!("recent tasks changed, change id is now {}", self.change_id);
    }

    pub fn running_tasks(&self) -> &[RunningTaskInfo] {
        &self.running_tasks
    }

    /// Replaces the running tasks listener; there is at most one.
    pub fn set_running_tasks_listener(&mut self, listener: impl FnMut(&[RunningTaskInfo]) + 'static) {
        self.running_tasks_listener = Some(Box::new(listener));
    }

    pub fn clear_running_tasks_listener(&mut self) {
        self.running_tasks_listener = None;
    }

    pub fn on_running_task_appeared(&mut self, info: RunningTaskInfo) {
        if self.running_tasks.iter().any(|t| t.task_id == info.task_id) {
            return;
        }
        self.running_tasks.push(info);
        self.notify_running_tasks_changed();
    }

    pub fn on_running_task_vanished(&mut self, info: &RunningTaskInfo) {
        let Some(idx) = self.running_tasks.iter().position(|t| t.task_id == info.task_id) else {
            return;
        };
        self.running_tasks.remove(idx);
        self.notify_running_tasks_changed();
    }

    pub fn dump(&self, prefix: &str, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{prefix}RecentTasksList:")?;
        writeln!(out, "{prefix}  mChangeId={}", self.change_id)?;
        writeln!(out, "{prefix}  mResultsUi=[id={}, tasks=", self.results_ui.request_id)?;
        for task in &self.results_ui.tasks {
            let t2 = task.task2.as_ref().map_or(-1, |t| t.key.id);
            writeln!(out, "{prefix}    t1={} t2={t2}", task.task1.key.id)?;
        }
        writeln!(out, "{prefix}  ]")?;

        let raw_tasks = self.os.system_ui.recent_tasks(usize::MAX, self.current_user);
        writeln!(out, "{prefix}  rawTasks=[")?;
        for task in &raw_tasks {
            let (t1, t2) = match task {
                GroupedRecentTaskInfo::Single(info) => (info.task_id, -1),
                GroupedRecentTaskInfo::Split { task1, task2, .. } => (task1.task_id, task2.task_id),
                GroupedRecentTaskInfo::Freeform(infos) => {
                    (infos.first().map_or(-1, |info| info.task_id), -1)
                }
            };
            writeln!(out, "{prefix}    t1={t1} t2={t2}")?;
        }
        writeln!(out, "{prefix}  ]")
    }

    fn register(&mut self, consumer: TasksConsumer) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.pending.insert(token, consumer);
        token
    }

    fn notify_running_tasks_changed(&mut self) {
        if let Some(listener) = &mut self.running_tasks_listener {
            listener(&self.running_tasks);
        }
    }
}

impl fmt::Debug for RecentTasksList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentTasksList")
            .field("change_id", &self.change_id)
            .field("loading_in_background", &self.loading_in_background)
            .field("results_ui", &self.results_ui.request_id)
            .field("pending", &self.pending.len())
            .field("running_tasks", &self.running_tasks.len())
            .finish()
    }
}

/// Queries system UI and builds the task list, least recent first.
fn load_tasks(
    os: &OsServices,
    user: UserId,
    num_tasks: usize,
    request_id: i32,
    keys_only: bool,
) -> TaskLoadResult {
    let _span = tracy_client::span!("load_tasks");

    let mut raw_tasks = os.system_ui.recent_tasks(num_tasks, user);
    // Given most recent first.
    raw_tasks.reverse();

    let mut locked_users = HashMap::new();
    let mut make_task = |info: &RecentTaskInfo| {
        if keys_only {
            Task::from_key(TaskKey::from(info))
        } else {
            let is_locked = *locked_users
                .entry(info.user_id)
                .or_insert_with(|| os.activity_manager.is_device_locked(info.user_id));
            Task::from_info(info, is_locked)
        }
    };

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for raw in &raw_tasks {
        let group = match raw {
            GroupedRecentTaskInfo::Single(info) => GroupTask::single(make_task(info)),
            GroupedRecentTaskInfo::Split {
                task1,
                task2,
                bounds,
            } => GroupTask {
                task1: make_task(task1),
                task2: Some(make_task(task2)),
                split_bounds: Some(*bounds),
            },
            GroupedRecentTaskInfo::Freeform(infos) => {
                // The first task stands in for the whole desktop.
                let Some(first) = infos.first() else {
                    continue;
                };
                let mut task = Task::from_key(TaskKey::from(first));
                task.desktop_tile = true;
                GroupTask::single(task)
            }
        };
        tasks.push(group);
    }

    TaskLoadResult {
        request_id,
        keys_only,
        tasks,
    }
}
