//! Screen areas where a touch can start a system gesture.

use quickstep_config::TouchRegion;

use crate::system::NavigationMode;
use crate::utils::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

/// Size of the display in its current orientation, in px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    pub width: f64,
    pub height: f64,
    pub rotation: Rotation,
}

impl DisplayInfo {
    pub fn new(width: f64, height: f64, rotation: Rotation) -> Self {
        Self {
            width,
            height,
            rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchRegions {
    pub swipe: Rect,
    pub assistant_left: Rect,
    pub assistant_right: Rect,
}

impl TouchRegions {
    pub fn compute(mode: NavigationMode, display: DisplayInfo, config: &TouchRegion) -> Self {
        let DisplayInfo {
            width,
            height,
            rotation,
        } = display;

        if mode == NavigationMode::NoButton {
            let touch_height = config.navbar_bottom_gesture_size.0;
            let swipe = Rect::new(0., height - touch_height, width, height);

            let corner_height = touch_height.max(config.window_corner_radius.0);
            let corner_width = config.assistant_width.0;
            let top = height - corner_height;
            return Self {
                swipe,
                assistant_left: Rect::new(0., top, corner_width, height),
                assistant_right: Rect::new(width - corner_width, top, width, height),
            };
        }

        let landscape = config.navbar_landscape_size.0;
        let swipe = match rotation {
            Rotation::R90 => Rect::new(width - landscape, 0., width, height),
            Rotation::R270 => Rect::new(0., 0., landscape, height),
            Rotation::R0 | Rotation::R180 => {
                Rect::new(0., height - config.navbar_bottom_gesture_size.0, width, height)
            }
        };
        Self {
            swipe,
            ..Self::default()
        }
    }

    pub fn in_swipe_region(&self, pos: Point) -> bool {
        self.swipe.contains(pos)
    }

    pub fn in_assistant_region(&self, pos: Point) -> bool {
        self.assistant_left.contains(pos) || self.assistant_right.contains(pos)
    }
}
