//! Pixel geometry shared by the selector, the capture engine and the overlay.
//!
//! Two coordinate spaces exist:
//!   - monitor-local: relative to one monitor's top-left corner
//!   - virtual-screen: the combined space spanning every attached monitor
//!
//! `SelectionRect` lives in the first, `ScreenBox` in the second.

use serde::{Deserialize, Serialize};

/// A pointer position in monitor-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamp the point into `[0, width] x [0, height]`.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        Self {
            x: self.x.clamp(0, width as i32),
            y: self.y.clamp(0, height as i32),
        }
    }
}

/// A selection in monitor-local pixels.
///
/// Always normalized: (x, y) is the top-left corner and the extent is never
/// negative. A zero-area rectangle is a valid value, just not a capturable one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl SelectionRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized bounding box of two corner points, whatever the drag direction.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        Self {
            x: left,
            y: top,
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// True if the rectangle lies entirely inside a `width x height` monitor.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.right() <= width as i64
            && self.bottom() <= height as i64
    }
}

/// An absolute box in virtual-screen pixels, edges exclusive on the right/bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box of a `width x height` area whose top-left corner is at (x, y).
    pub fn from_origin(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width as i32,
            bottom: y + height as i32,
        }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn intersect(&self, other: ScreenBox) -> Option<ScreenBox> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);
        if left < right && top < bottom {
            Some(ScreenBox {
                left,
                top,
                right,
                bottom,
            })
        } else {
            None
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: ScreenBox) -> ScreenBox {
        ScreenBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Every edge multiplied by `factor`, rounded. Shared edges of
    /// neighbouring boxes stay shared.
    pub fn scaled(&self, factor: f64) -> ScreenBox {
        let edge = |v: i32| (v as f64 * factor).round() as i32;
        ScreenBox {
            left: edge(self.left),
            top: edge(self.top),
            right: edge(self.right),
            bottom: edge(self.bottom),
        }
    }
}
