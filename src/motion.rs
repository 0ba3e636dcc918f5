use std::fmt;
use std::time::Duration;

use crate::utils::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionAction {
    Down,
    Move,
    Up,
    Cancel,
    PointerDown,
    PointerUp,
}

impl MotionAction {
    pub fn name(self) -> &'static str {
        match self {
            MotionAction::Down => "ACTION_DOWN",
            MotionAction::Move => "ACTION_MOVE",
            MotionAction::Up => "ACTION_UP",
            MotionAction::Cancel => "ACTION_CANCEL",
            MotionAction::PointerDown => "ACTION_POINTER_DOWN",
            MotionAction::PointerUp => "ACTION_POINTER_UP",
        }
    }

    /// Whether the action ends the touch stream.
    pub fn is_end(self) -> bool {
        matches!(self, MotionAction::Up | MotionAction::Cancel)
    }
}

impl fmt::Display for MotionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single touch sample in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub action: MotionAction,
    pub pos: Point,
    pub time: Duration,
    pub pointer_count: usize,
}

impl MotionEvent {
    pub fn new(action: MotionAction, x: f64, y: f64, time: Duration) -> Self {
        Self {
            action,
            pos: Point::new(x, y),
            time,
            pointer_count: 1,
        }
    }

    pub fn with_action(self, action: MotionAction) -> Self {
        Self { action, ..self }
    }
}
