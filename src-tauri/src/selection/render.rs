//! Overlay frame geometry.
//!
//! The overlay canvas paints exactly what a frame describes: the `mask`
//! bands in translucent black and the `border` bands in the accent colour.
//! The selection itself is never covered, so it shows the live screen.

use crate::geometry::SelectionRect;
use serde::Serialize;

/// Border stroke around the selection, in physical pixels.
pub const BORDER_WIDTH: u32 = 2;

/// Alpha of the dimming mask (0-255).
pub const DIM_ALPHA: u8 = 100;

/// Everything the overlay needs for one redraw, in monitor-local pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayFrame {
    /// Strictly increasing within one drag; the canvas drops anything older
    /// than the last frame it painted.
    pub generation: u64,
    pub selection: SelectionRect,
    /// Dimmed area: the monitor minus the selection, as up to four bands.
    pub mask: Vec<SelectionRect>,
    /// Stroke drawn just outside the selection, as up to four bands.
    pub border: Vec<SelectionRect>,
    pub dim_alpha: u8,
}

impl OverlayFrame {
    pub fn new(generation: u64, width: u32, height: u32, selection: SelectionRect) -> Self {
        Self {
            generation,
            selection,
            mask: mask_bands(width, height, &selection),
            border: border_bands(&selection, BORDER_WIDTH),
            dim_alpha: DIM_ALPHA,
        }
    }
}

/// Split the monitor minus the selection into non-overlapping bands:
/// full-width top and bottom, then left and right beside the selection.
fn mask_bands(width: u32, height: u32, sel: &SelectionRect) -> Vec<SelectionRect> {
    let top = sel.y.max(0) as u32;
    let bottom = (sel.bottom().max(0) as u32).min(height);
    let left = sel.x.max(0) as u32;
    let right = (sel.right().max(0) as u32).min(width);
    let middle = bottom.saturating_sub(top);

    [
        SelectionRect::new(0, 0, width, top.min(height)),
        SelectionRect::new(0, bottom as i32, width, height.saturating_sub(bottom)),
        SelectionRect::new(0, top as i32, left.min(width), middle),
        SelectionRect::new(right as i32, top as i32, width.saturating_sub(right), middle),
    ]
    .into_iter()
    .filter(|band| !band.is_empty())
    .collect()
}

fn border_bands(sel: &SelectionRect, stroke: u32) -> Vec<SelectionRect> {
    if sel.is_empty() {
        return Vec::new();
    }
    let s = stroke as i32;
    let outer_width = sel.width + 2 * stroke;
    vec![
        SelectionRect::new(sel.x - s, sel.y - s, outer_width, stroke),
        SelectionRect::new(sel.x - s, sel.bottom() as i32, outer_width, stroke),
        SelectionRect::new(sel.x - s, sel.y, stroke, sel.height),
        SelectionRect::new(sel.right() as i32, sel.y, stroke, sel.height),
    ]
}
