//! The launcher UI as seen by the gesture core.
//!
//! The embedder owns the real activity and recents view. The core only calls into them through
//! these traits, always from the UI loop.

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;

use crate::motion::MotionEvent;
use crate::system::os::{RunningTaskInfo, TaskId, ThumbnailData};

/// Identity of one launcher activity instance. Changes when the activity is recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "activity#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShelfState {
    Peek,
    Hide,
    Overview,
    Cancel,
}

bitflags! {
    /// Reasons for the launcher to stay invisible while a gesture animates over it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InvisibilityFlags: u8 {
        const BY_STATE_HANDLER = 1;
        const PENDING_BY_WALLPAPER_ANIMATION = 1 << 1;
    }
}

impl InvisibilityFlags {
    /// The flags a swipe handler controls.
    pub const STATE_HANDLER: Self =
        Self::BY_STATE_HANDLER.union(Self::PENDING_BY_WALLPAPER_ANIMATION);
}

/// The strip of task views shown in overview.
pub trait RecentsView {
    /// Page of the task the gesture started from, if it is in the list.
    fn running_task_index(&self) -> Option<usize>;
    /// Page the view is scrolling to, or showing when idle.
    fn next_page(&self) -> usize;
    fn page_nearest_to_center(&self) -> usize;
    fn task_view_count(&self) -> usize;
    fn task_id_at(&self, index: usize) -> Option<TaskId>;
    fn task_index_for_id(&self, task_id: TaskId) -> Option<usize>;
    /// System UI appearance the thumbnail at `index` asks for.
    fn task_system_ui_flags_at(&self, index: usize) -> u32;

    fn snap_to_page(&mut self, page: usize, duration: Duration);
    /// Whether a page scroll is still settling.
    fn is_page_in_transition(&self) -> bool;
    /// Duration of the current scroll, zero when idle.
    fn scroller_duration(&self) -> Duration;
    /// Advances the scroll by one frame even while the view is invisible.
    fn compute_scroll(&mut self);

    fn on_gesture_animation_start(&mut self, running_task: Option<&RunningTaskInfo>);
    fn on_gesture_animation_end(&mut self);
    fn on_swipe_up_animation_success(&mut self);
    /// Returns whether a task view picked the thumbnail up.
    fn update_thumbnail(&mut self, task_id: TaskId, thumbnail: &ThumbnailData) -> bool;
    fn set_running_task_hidden(&mut self, hidden: bool);
    fn reset_task_visuals(&mut self);

    fn show_next_task(&mut self);
    fn start_home(&mut self);
    fn launch_task(&mut self, index: usize);
    /// Focuses the task view at `index`, or the view itself for `None`.
    fn request_focus(&mut self, index: Option<usize>);
}

/// The launcher activity that hosts overview.
pub trait ActivityInterface {
    fn created_activity(&self) -> Option<ActivityId>;
    fn is_resumed(&self) -> bool;
    fn has_window_focus(&self) -> bool;
    /// Whether home and overview live in the same activity.
    fn is_home_and_overview_same(&self) -> bool;

    fn recents_view(&mut self) -> Option<&mut dyn RecentsView>;
    /// The recents view, only while overview is actually showing.
    fn visible_recents_view(&mut self) -> Option<&mut dyn RecentsView>;

    fn prepare_recents_ui(&mut self, activity_visible: bool, animate_activity: bool);
    fn set_recents_attached_to_app_window(&mut self, attached: bool, animate: bool);
    fn set_shelf_state(&mut self, state: ShelfState, duration: Duration);
    fn update_overview_prediction_state(&mut self);

    // =========================================================================
    // Launcher transition driven by the swipe
    // =========================================================================

    fn start_launcher_transition(&mut self, drag_length: f64);
    fn set_launcher_transition_progress(&mut self, progress: f64);
    /// Jumps the launcher transition to its end state.
    fn end_launcher_transition(&mut self);
    fn on_launcher_transition_cancelled(&mut self);

    fn on_swipe_up_to_recents_complete(&mut self);
    fn on_swipe_up_to_home_complete(&mut self);
    fn on_transition_cancelled(&mut self, activity_visible: bool);
    fn on_launch_task_success(&mut self);
    fn on_launch_task_failed(&mut self);
    /// System UI appearance overview should force, zero to follow the launcher.
    fn update_overview_system_ui_flags(&mut self, flags: u32);

    /// Returns `true` if overview was already visible and is now in front.
    fn switch_to_recents_if_visible(&mut self) -> bool;
    fn start_overview(&mut self);

    fn add_force_invisible_flag(&mut self, flags: InvisibilityFlags);
    fn clear_force_invisible_flag(&mut self, flags: InvisibilityFlags);

    fn dispatch_overview_touch(&mut self, event: &MotionEvent);
    fn perform_haptic_feedback(&mut self);
    fn show_toast(&mut self, message: &str);
}
