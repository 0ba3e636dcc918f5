//! Overview commands from system UI (the recents button, alt-tab), run one at a time on the UI
//! loop.

use std::time::Duration;

use tracing::{debug, trace};

use crate::activity::ActivityInterface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewCommandKind {
    Toggle,
    Show { from_alt_tab: bool },
    Hide,
}

/// A command, stamped on the binder thread when it was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewCommand {
    pub kind: OverviewCommandKind,
    pub create_time: Duration,
}

impl OverviewCommand {
    pub fn new(kind: OverviewCommandKind, create_time: Duration) -> Self {
        Self { kind, create_time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command was fully handled by the visible overview, or dropped as a double tap.
    Handled,
    /// Overview was visible and is being brought to front.
    SwitchedToRecents,
    /// The overview activity is starting.
    StartedOverview,
}

#[derive(Debug)]
pub struct OverviewCommandHelper {
    double_tap_timeout: Duration,
    last_toggle_time: Option<Duration>,
    /// Command waiting for its overview transition to finish.
    awaiting_transition: Option<OverviewCommandKind>,
}

impl OverviewCommandHelper {
    pub fn new(config: &quickstep_config::Overview) -> Self {
        Self {
            double_tap_timeout: Duration::from_millis(config.double_tap_timeout_ms),
            last_toggle_time: None,
            awaiting_transition: None,
        }
    }

    pub fn run(
        &mut self,
        command: OverviewCommand,
        activity: &mut dyn ActivityInterface,
    ) -> CommandOutcome {
        let _span = tracy_client::span!("OverviewCommandHelper::run");

        let elapsed = self
            .last_toggle_time
            .map(|last| command.create_time.saturating_sub(last));
        self.last_toggle_time = Some(command.create_time);

        if self.handle(command.kind, elapsed, activity) {
            debug!("{:?} handled by the visible overview", command.kind);
            return CommandOutcome::Handled;
        }

        self.awaiting_transition = Some(command.kind);
        if activity.switch_to_recents_if_visible() {
            debug!("{:?}: switching to visible overview", command.kind);
            return CommandOutcome::SwitchedToRecents;
        }

        debug!("{:?}: starting the overview activity", command.kind);
        activity.start_overview();
        CommandOutcome::StartedOverview
    }

    /// Finishes the last command once its transition into overview completes.
    pub fn on_transition_complete(&mut self, activity: &mut dyn ActivityInterface) {
        let Some(kind) = self.awaiting_transition.take() else {
            return;
        };
        trace!("overview transition complete for {kind:?}");

        if kind != (OverviewCommandKind::Show { from_alt_tab: true }) {
            return;
        }
        let Some(recents) = activity.visible_recents_view() else {
            return;
        };

        // Alt-tab lands on the task after the running one.
        let count = recents.task_view_count();
        let next = recents.running_task_index().map_or(0, |index| index + 1);
        let focus = if next < count {
            Some(next)
        } else if count > 0 {
            Some(0)
        } else {
            None
        };
        recents.request_focus(focus);
    }

    fn handle(
        &mut self,
        kind: OverviewCommandKind,
        elapsed: Option<Duration>,
        activity: &mut dyn ActivityInterface,
    ) -> bool {
        match kind {
            OverviewCommandKind::Toggle => {
                if let Some(recents) = activity.visible_recents_view() {
                    recents.show_next_task();
                    return true;
                }
                // Second tap of a double tap.
                elapsed.is_some_and(|elapsed| elapsed < self.double_tap_timeout)
            }
            OverviewCommandKind::Show { .. } => activity.visible_recents_view().is_some(),
            OverviewCommandKind::Hide => {
                let Some(recents) = activity.visible_recents_view() else {
                    return false;
                };
                let page = recents.next_page();
                if page < recents.task_view_count() {
                    recents.launch_task(page);
                } else {
                    recents.start_home();
                }
                true
            }
        }
    }
}
