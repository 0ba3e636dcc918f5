//! Operating system collaborators and the data they hand over.
//!
//! Every trait here is implemented by the embedder. Methods may block, so the core only calls
//! them from the background executor, except for the cheap queries noted on the trait.

use std::sync::Arc;

use quickstep_config::ComponentName;

use crate::recents_animation::RecentsAnimationRunner;
use crate::utils::Rect;

pub type TaskId = i32;
pub type UserId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityType {
    Standard,
    Home,
    Recents,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowingMode {
    Fullscreen,
    Freeform,
    MultiWindow,
}

/// A task the OS reports as running.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningTaskInfo {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub top_activity: Option<ComponentName>,
    pub activity_type: ActivityType,
    pub windowing_mode: WindowingMode,
}

impl RunningTaskInfo {
    pub fn new(task_id: TaskId, top_activity: Option<ComponentName>) -> Self {
        Self {
            task_id,
            user_id: 0,
            top_activity,
            activity_type: ActivityType::Standard,
            windowing_mode: WindowingMode::Fullscreen,
        }
    }

    pub fn is_home(&self) -> bool {
        self.activity_type == ActivityType::Home
    }
}

/// One window surface handed to the launcher for the recents animation.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAnimationTarget {
    pub task_id: TaskId,
    pub activity_type: ActivityType,
    pub is_translucent: bool,
    pub bounds: Rect,
}

impl RemoteAnimationTarget {
    pub fn app(task_id: TaskId, bounds: Rect) -> Self {
        Self {
            task_id,
            activity_type: ActivityType::Standard,
            is_translucent: false,
            bounds,
        }
    }
}

/// Decoded image data. The core never looks at the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl Bitmap {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Arc::from(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailData {
    pub bitmap: Option<Bitmap>,
    pub reduced_resolution: bool,
    pub scale: f32,
    pub system_ui_visibility: u32,
}

impl ThumbnailData {
    pub fn new(bitmap: Bitmap, reduced_resolution: bool) -> Self {
        Self {
            bitmap: Some(bitmap),
            reduced_resolution,
            scale: if reduced_resolution { 0.5 } else { 1. },
            system_ui_visibility: 0,
        }
    }
}

pub type Icon = Bitmap;

/// A recent task as returned by system UI.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentTaskInfo {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub component: Option<ComponentName>,
    pub top_activity: Option<ComponentName>,
    pub last_active_time: u64,
    pub windowing_mode: WindowingMode,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitBounds {
    pub left_top: Rect,
    pub right_bottom: Rect,
    pub divider: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupedRecentTaskInfo {
    Single(RecentTaskInfo),
    Split {
        task1: RecentTaskInfo,
        task2: RecentTaskInfo,
        bounds: SplitBounds,
    },
    Freeform(Vec<RecentTaskInfo>),
}

/// Task management calls into the OS.
pub trait ActivityManager: Send + Sync {
    /// Cheap; may be called on the UI thread.
    fn running_task(&self) -> Option<RunningTaskInfo>;
    fn start_activity_from_recents(&self, task_id: TaskId) -> bool;
    /// Starts the recents animation; the OS reports back through `runner`.
    fn start_recents_activity(&self, runner: RecentsAnimationRunner);
    fn cancel_recents_animation(&self, restore_home_root_task: bool);
    fn start_home(&self);
    fn close_system_windows(&self, reason: &str);
    /// Cheap; may be called on the UI thread.
    fn is_lock_to_app_active(&self) -> bool;
    fn is_device_locked(&self, user_id: UserId) -> bool;
    fn task_thumbnail(&self, task_id: TaskId, low_resolution: bool)
        -> anyhow::Result<ThumbnailData>;
}

/// The system UI service the launcher is bound to.
pub trait SystemUiProxy: Send + Sync {
    /// Most recent first.
    fn recent_tasks(&self, max: usize, user_id: UserId) -> Vec<GroupedRecentTaskInfo>;
    /// Most recent first.
    fn running_tasks(&self, max: usize) -> Vec<RunningTaskInfo>;
    /// Returns the non-app targets that take part in the animation.
    fn on_going_to_recents_legacy(
        &self,
        cancelled: bool,
        apps: &[RemoteAnimationTarget],
    ) -> Vec<RemoteAnimationTarget>;
    fn notify_swipe_to_home_finished(&self);
    fn on_overview_shown(&self, from_home: bool);
    fn start_assistant(&self);
    fn stop_screen_pinning(&self);
    fn notify_accessibility_button_clicked(&self);
    fn notify_accessibility_button_long_clicked(&self);
}

/// The OS side of a running recents animation.
pub trait SystemAnimationController: Send + Sync {
    fn finish(&self, to_home: bool, send_user_leave_hint: bool);
    fn set_input_consumer_enabled(&self, enabled: bool);
    fn screenshot_task(&self, task_id: TaskId) -> Option<ThumbnailData>;
    fn set_animation_targets_behind_system_bars(&self, behind: bool);
    fn set_split_screen_minimized(&self, minimized: bool);
    fn set_defer_cancel_until_next_transition(&self, defer: bool, screenshot: bool);
    fn set_will_finish_to_home(&self, will_finish_to_home: bool);
    fn cleanup_screenshot(&self);
}

/// Icon and label lookups for recent tasks.
pub trait IconLoader: Send + Sync {
    fn task_description_icon(&self, task_id: TaskId) -> Option<Icon>;
    fn activity_icon(&self, component: &ComponentName, user_id: UserId) -> Option<Icon>;
    fn default_icon(&self, user_id: UserId) -> Icon;
    fn application_label(&self, package: &str, user_id: UserId) -> Option<String>;
    /// Decorates `label` for a non-primary user, like "Work Gmail".
    fn badged_label(&self, label: &str, user_id: UserId) -> String;
    fn is_accessibility_enabled(&self) -> bool;
}

/// Handles to every OS collaborator.
#[derive(Clone)]
pub struct OsServices {
    pub activity_manager: Arc<dyn ActivityManager>,
    pub system_ui: Arc<dyn SystemUiProxy>,
    pub icon_loader: Arc<dyn IconLoader>,
}
