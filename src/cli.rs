use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use crate::gesture_state::GestureEndTarget;
use crate::swipe::end_target::{calculate_end_target, EndTargetParams};
use crate::swipe::release::{ReleaseAnimation, ReleaseParams};
use crate::system::NavigationMode;
use crate::utils::Point;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    /// Path to config file (default: `$XDG_CONFIG_HOME/quickstep/config.kdl`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: Option<Sub>,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Validate the config file.
    Validate,
    /// Compute where a released swipe ends and how it animates there.
    EndTarget(EndTargetArgs),
    /// Generate shell completions.
    Completions { shell: Shell },
}

#[derive(clap::Args, Debug, Clone)]
pub struct EndTargetArgs {
    /// Navigation mode.
    #[arg(long, value_enum, default_value_t = ModeArg::NoButton)]
    pub mode: ModeArg,
    /// Swipe progress at release; 1 is the overview position.
    #[arg(long, default_value_t = 0.)]
    pub shift: f64,
    /// Horizontal release velocity in px/s.
    #[arg(long, default_value_t = 0., allow_hyphen_values = true)]
    pub velocity_x: f64,
    /// Vertical release velocity in px/s, negative when swiping up.
    #[arg(long, default_value_t = 0., allow_hyphen_values = true)]
    pub velocity_y: f64,
    /// The finger was lifted while the recents view was moving to another task.
    #[arg(long)]
    pub new_task: bool,
    /// The swipe paused long enough to show the shelf.
    #[arg(long)]
    pub shelf_peeking: bool,
    /// The gesture was cancelled instead of released.
    #[arg(long)]
    pub cancel: bool,
    /// Overview is disabled by system UI.
    #[arg(long)]
    pub overview_disabled: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    TwoButtons,
    NoButton,
}

impl From<ModeArg> for NavigationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::TwoButtons => NavigationMode::TwoButtons,
            ModeArg::NoButton => NavigationMode::NoButton,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndTargetReport {
    pub mode: NavigationMode,
    pub is_fling: bool,
    pub target: GestureEndTarget,
    pub release: ReleaseAnimation,
}

/// Runs the same decision a swipe handler makes on release.
pub fn end_target(args: &EndTargetArgs, config: &quickstep_config::Config) -> EndTargetReport {
    let gestures = &config.gestures;
    let mode = NavigationMode::from(args.mode);
    let fully_gestural = mode == NavigationMode::NoButton;

    let velocity = Point::new(args.velocity_x, args.velocity_y);
    let end_velocity = args.velocity_y;
    let is_fling = end_velocity.abs() > gestures.fling_threshold_velocity.0;

    let target = calculate_end_target(&EndTargetParams {
        velocity,
        end_velocity,
        is_fling,
        is_cancel: args.cancel,
        fully_gestural,
        is_shelf_peeking: args.shelf_peeking,
        going_to_new_task: args.new_task,
        reached_overview_threshold: args.shift >= crate::swipe::release::MIN_PROGRESS_FOR_OVERVIEW,
        gesture_started: true,
        overview_disabled: args.overview_disabled,
    });

    let release = ReleaseAnimation::compute(&ReleaseParams {
        target,
        current_shift: args.shift,
        velocity,
        end_velocity,
        is_fling,
        fully_gestural,
        transition_drag_length: gestures.transition_drag_length.0,
        drag_length_factor: gestures.drag_length_factor.0,
        min_fling_velocity: gestures.fling_min_velocity.0,
        single_frame_ms: f64::from(gestures.single_frame_ms),
    });

    EndTargetReport {
        mode,
        is_fling,
        target,
        release,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn args(extra: &[&str]) -> EndTargetArgs {
        let mut argv = vec!["quickstep", "end-target"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).subcommand {
            Some(Sub::EndTarget(args)) => args,
            _ => panic!("expected end-target"),
        }
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn slow_release_past_threshold_goes_home() {
        let report = end_target(&args(&["--shift", "0.9"]), &Default::default());
        assert!(!report.is_fling);
        assert_eq!(report.target, GestureEndTarget::Home);
        assert_eq!(report.release.end, 1.);
    }

    #[test]
    fn two_button_fling_up_goes_to_recents() {
        let report = end_target(
            &args(&["--mode", "two-buttons", "--shift", "0.3", "--velocity-y", "-3000"]),
            &Default::default(),
        );
        assert!(report.is_fling);
        assert_eq!(report.target, GestureEndTarget::Recents);
    }

    #[test]
    fn report_serializes_kebab_case_mode() {
        let report = end_target(&args(&["--cancel"]), &Default::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "no-button");
        assert_eq!(json["target"], "LAST_TASK");
    }
}
