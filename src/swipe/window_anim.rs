use crate::animation::Animation;

/// The window animation that runs after the finger lifts.
#[derive(Debug, Clone)]
pub enum RunningWindowAnim {
    /// Spring of the app window into its home screen position.
    Home(Animation),
    /// Swipe progress animating toward the end target.
    Shift(Animation),
}

/// How a window animation stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowAnimEnd {
    /// Ran to completion, or was jumped to its end value.
    Success { kind: WindowAnimKind, value: f64 },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAnimKind {
    Home,
    Shift,
}

impl RunningWindowAnim {
    pub fn kind(&self) -> WindowAnimKind {
        match self {
            RunningWindowAnim::Home(_) => WindowAnimKind::Home,
            RunningWindowAnim::Shift(_) => WindowAnimKind::Shift,
        }
    }

    fn anim(&self) -> &Animation {
        match self {
            RunningWindowAnim::Home(anim) | RunningWindowAnim::Shift(anim) => anim,
        }
    }

    pub fn value(&self) -> f64 {
        self.anim().value()
    }

    pub fn is_done(&self) -> bool {
        self.anim().is_done()
    }

    /// Stops the animation. Ending jumps to the target value and counts as success.
    pub fn stop(self, cancel: bool) -> WindowAnimEnd {
        if cancel {
            return WindowAnimEnd::Cancelled;
        }
        WindowAnimEnd::Success {
            kind: self.kind(),
            value: self.anim().to(),
        }
    }
}
