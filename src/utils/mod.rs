use std::fmt;

pub mod event_log;

pub use event_log::EventLog;

/// A point in screen coordinates, in px.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// An axis-aligned rectangle. Empty when `right <= left` or `bottom <= top`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Half-open containment, like the platform's `RectF.contains`.
    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty()
            && point.x >= self.left
            && point.x < self.right
            && point.y >= self.top
            && point.y < self.bottom
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.0},{:.0}][{:.0},{:.0}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// A union of rectangles, as reported for system gesture exclusion.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new(rects: Vec<Rect>) -> Self {
        Self { rects }
    }

    pub fn contains(&self, point: Point) -> bool {
        self.rects.iter().any(|rect| rect.contains(point))
    }

    pub fn is_empty(&self) -> bool {
        self.rects.iter().all(Rect::is_empty)
    }
}

/// Clamps `value` to `[min, max]`.
pub fn bound_to_range(value: f64, min: f64, max: f64) -> f64 {
    value.clamp(min, max)
}

/// Linear interpolation between `from` and `to`.
pub fn map_range(progress: f64, from: f64, to: f64) -> f64 {
    from + (to - from) * progress
}

pub fn squared_hypot(x: f64, y: f64) -> f64 {
    x * x + y * y
}
