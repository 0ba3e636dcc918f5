//! Per-gesture record shared by the input consumer, the swipe handler and the recents animation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use tracing::debug;

use crate::multi_state::{FlagNames, MultiStateCallback};
use crate::system::os::{RunningTaskInfo, TaskId, ThumbnailData};
use crate::system::NavigationMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GestureId(pub u64);

impl fmt::Display for GestureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GestureFlags: u32 {
        const END_TARGET_SET = 1;
        const END_TARGET_ANIMATION_FINISHED = 1 << 1;
        const RECENTS_ANIMATION_INITIALIZED = 1 << 2;
        const RECENTS_ANIMATION_STARTED = 1 << 3;
        const RECENTS_ANIMATION_CANCELED = 1 << 4;
        const RECENTS_ANIMATION_FINISHED = 1 << 5;
        const RECENTS_ANIMATION_ENDED = 1 << 6;
        const RECENTS_SCROLLING_FINISHED = 1 << 7;
    }
}

/// Where a released gesture settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureEndTarget {
    Home,
    Recents,
    NewTask,
    LastTask,
}

impl GestureEndTarget {
    /// Whether the gesture ends inside the launcher.
    pub fn is_launcher(self) -> bool {
        matches!(self, Self::Home | Self::Recents)
    }

    pub fn recents_attached_to_app_window(self) -> bool {
        !matches!(self, Self::Home)
    }

    /// Whether a following gesture can pick up this one's recents animation.
    pub fn can_be_continued(self) -> bool {
        matches!(self, Self::NewTask | Self::LastTask)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Recents => "RECENTS",
            Self::NewTask => "NEW_TASK",
            Self::LastTask => "LAST_TASK",
        }
    }
}

impl fmt::Display for GestureEndTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of one gesture, from touch down until the next gesture replaces it.
///
/// `A` is the owner's action type for registrations on the gesture flags.
pub struct GestureState<A> {
    id: GestureId,
    nav_mode: NavigationMode,
    running_tasks: Vec<RunningTaskInfo>,
    end_target: Option<GestureEndTarget>,
    last_appeared_task_id: Option<TaskId>,
    previously_appeared_task_ids: HashSet<TaskId>,
    last_started_task_id: Option<TaskId>,
    swipe_up_start_time: Option<Duration>,
    handling_atomic_event: bool,
    canceled_thumbnails: Option<HashMap<TaskId, ThumbnailData>>,
    state: MultiStateCallback<GestureFlags, A>,
}

impl<A> GestureState<A> {
    pub fn new(id: GestureId, nav_mode: NavigationMode) -> Self {
        Self {
            id,
            nav_mode,
            running_tasks: Vec::new(),
            end_target: None,
            last_appeared_task_id: None,
            previously_appeared_task_ids: HashSet::new(),
            last_started_task_id: None,
            swipe_up_start_time: None,
            handling_atomic_event: false,
            canceled_thumbnails: None,
            state: MultiStateCallback::new(),
        }
    }

    /// Starts a gesture that picks up where `previous` left off.
    pub fn continue_from<B>(previous: &GestureState<B>, id: GestureId) -> Self {
        let mut state = Self::new(id, previous.nav_mode);
        state.running_tasks = previous.running_tasks.clone();
        state.last_appeared_task_id = previous.last_appeared_task_id;
        state.previously_appeared_task_ids = previous.previously_appeared_task_ids.clone();
        state.last_started_task_id = previous.last_started_task_id;
        state
    }

    pub fn id(&self) -> GestureId {
        self.id
    }

    pub fn nav_mode(&self) -> NavigationMode {
        self.nav_mode
    }

    // =========================================================================
    // Flags
    // =========================================================================

    pub fn flags(&self) -> GestureFlags {
        self.state.state()
    }

    pub fn set_state(&mut self, flags: GestureFlags) -> Vec<A> {
        self.state.set_state(flags)
    }

    #[must_use]
    pub fn run_once_at_state(&mut self, mask: GestureFlags, action: A) -> Option<A> {
        self.state.run_once_at_state(mask, action)
    }

    /// Whether any flag of `mask` is set.
    pub fn has_state(&self, mask: GestureFlags) -> bool {
        self.state.has_state(mask)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn update_running_task(&mut self, task: RunningTaskInfo) {
        self.running_tasks = vec![task];
    }

    /// Split screen supplies two tasks.
    pub fn update_running_tasks(&mut self, tasks: Vec<RunningTaskInfo>) {
        self.running_tasks = tasks;
    }

    pub fn running_task(&self) -> Option<&RunningTaskInfo> {
        self.running_tasks.first()
    }

    pub fn running_tasks(&self) -> &[RunningTaskInfo] {
        &self.running_tasks
    }

    pub fn running_task_id(&self) -> Option<TaskId> {
        self.running_task().map(|task| task.task_id)
    }

    pub fn update_last_appeared_task(&mut self, task_id: TaskId) {
        self.last_appeared_task_id = Some(task_id);
        self.previously_appeared_task_ids.insert(task_id);
    }

    pub fn last_appeared_task_id(&self) -> Option<TaskId> {
        self.last_appeared_task_id
    }

    pub fn previously_appeared_task_ids(&self) -> &HashSet<TaskId> {
        &self.previously_appeared_task_ids
    }

    pub fn update_last_started_task_id(&mut self, task_id: TaskId) {
        self.last_started_task_id = Some(task_id);
    }

    pub fn last_started_task_id(&self) -> Option<TaskId> {
        self.last_started_task_id
    }

    // =========================================================================
    // End target
    // =========================================================================

    pub fn end_target(&self) -> Option<GestureEndTarget> {
        self.end_target
    }

    /// Sets the end target; atomic targets have no animation to wait for.
    ///
    /// Once set, the target only changes between NEW_TASK and LAST_TASK.
    pub fn set_end_target(&mut self, target: GestureEndTarget, is_atomic: bool) -> Vec<A> {
        debug!("gesture {}: end target {target} (atomic: {is_atomic})", self.id);
        debug_assert!(
            self.end_target.map_or(true, |old| {
                use GestureEndTarget::{LastTask, NewTask};
                old == target || matches!((old, target), (NewTask, LastTask) | (LastTask, NewTask))
            }),
            "gesture {}: end target {:?} cannot become {target:?}",
            self.id,
            self.end_target,
        );
        self.end_target = Some(target);

        let mut flags = GestureFlags::END_TARGET_SET;
        if is_atomic {
            flags |= GestureFlags::END_TARGET_ANIMATION_FINISHED;
        }
        self.set_state(flags)
    }

    pub fn set_swipe_up_start_time(&mut self, time: Duration) {
        self.swipe_up_start_time = Some(time);
    }

    pub fn swipe_up_start_time(&self) -> Option<Duration> {
        self.swipe_up_start_time
    }

    pub fn set_handling_atomic_event(&mut self, handling: bool) {
        self.handling_atomic_event = handling;
    }

    pub fn is_handling_atomic_event(&self) -> bool {
        self.handling_atomic_event
    }

    // =========================================================================
    // Recents animation
    // =========================================================================

    pub fn is_recents_animation_running(&self) -> bool {
        self.state.has_states(GestureFlags::RECENTS_ANIMATION_STARTED)
            && !self.state.has_state(GestureFlags::RECENTS_ANIMATION_ENDED)
    }

    pub fn is_running_animation_to_launcher(&self) -> bool {
        self.is_recents_animation_running()
            && self.end_target.is_some_and(GestureEndTarget::is_launcher)
    }

    pub fn on_recents_animation_start(&mut self) -> Vec<A> {
        self.set_state(GestureFlags::RECENTS_ANIMATION_STARTED)
    }

    pub fn on_recents_animation_canceled(
        &mut self,
        thumbnails: Option<HashMap<TaskId, ThumbnailData>>,
    ) -> Vec<A> {
        self.canceled_thumbnails = thumbnails;
        self.set_state(GestureFlags::RECENTS_ANIMATION_CANCELED | GestureFlags::RECENTS_ANIMATION_ENDED)
    }

    pub fn on_recents_animation_finished(&mut self) -> Vec<A> {
        self.set_state(GestureFlags::RECENTS_ANIMATION_FINISHED | GestureFlags::RECENTS_ANIMATION_ENDED)
    }

    /// Hands out the thumbnails the OS sent with a cancel, once.
    pub fn consume_canceled_thumbnails(&mut self) -> Option<HashMap<TaskId, ThumbnailData>> {
        self.canceled_thumbnails.take()
    }

    pub fn dump(&self, prefix: &str, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{prefix}GestureState:")?;
        writeln!(out, "{prefix}\tgestureID={}", self.id)?;
        match self.running_task_id() {
            Some(id) => writeln!(out, "{prefix}\trunningTask={id}")?,
            None => writeln!(out, "{prefix}\trunningTask=null")?,
        }
        match self.end_target {
            Some(target) => writeln!(out, "{prefix}\tendTarget={target}")?,
            None => writeln!(out, "{prefix}\tendTarget=null")?,
        }
        writeln!(
            out,
            "{prefix}\tlastAppearedTaskTargetId={}",
            self.last_appeared_task_id.unwrap_or(-1)
        )?;
        writeln!(
            out,
            "{prefix}\tlastStartedTaskId={}",
            self.last_started_task_id.unwrap_or(-1)
        )?;
        writeln!(
            out,
            "{prefix}\tisRecentsAnimationRunning={}",
            self.is_recents_animation_running()
        )?;
        writeln!(out, "{prefix}\tstate={}", FlagNames(self.flags()))
    }
}

impl<A> fmt::Debug for GestureState<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureState")
            .field("id", &self.id)
            .field("running_task", &self.running_task_id())
            .field("end_target", &self.end_target)
            .field("flags", &FlagNames(self.flags()).to_string())
            .finish()
    }
}
