//! Monitor registry: enumerates the attached displays.
//!
//! Every call re-queries the platform: displays can be hot-plugged between
//! two snips, so nothing here is cached.
//!
//! Geometry is kept in the units xcap reports, which differ per platform
//! (see `DisplayUnits`). Selections and captures use the same units, so
//! only window placement needs to know which ones they are.

use crate::geometry::ScreenBox;
use serde::Serialize;
use tauri::{LogicalPosition, LogicalSize, PhysicalPosition, PhysicalSize, Position, Size};

/// Units of the monitor geometry xcap reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnits {
    /// Points (macOS). Captures carry `scale_factor` pixels per unit.
    Logical,
    /// Device pixels (Windows, X11).
    Physical,
}

impl DisplayUnits {
    pub const fn native() -> Self {
        if cfg!(target_os = "macos") {
            DisplayUnits::Logical
        } else {
            DisplayUnits::Physical
        }
    }
}

/// Snapshot of one physical display, taken at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    /// Position in the enumeration order (what the monitor picker shows).
    pub index: usize,
    /// Platform display id; 0 for the synthetic whole-screen monitor.
    pub id: u32,
    pub name: String,
    /// Origin in virtual-screen coordinates.
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
    pub scale_factor: f32,
}

impl Monitor {
    /// Single monitor covering a whole `width x height` screen at the origin.
    ///
    /// Used when the platform cannot enumerate displays.
    pub fn whole_screen(width: u32, height: u32) -> Self {
        Self {
            index: 0,
            id: 0,
            name: "Screen".to_string(),
            x: 0,
            y: 0,
            width,
            height,
            is_primary: true,
            scale_factor: 1.0,
        }
    }

    /// This monitor's area in virtual-screen coordinates.
    pub fn bounds(&self) -> ScreenBox {
        ScreenBox::from_origin(self.x, self.y, self.width, self.height)
    }

    /// Window position and inner size that cover this monitor exactly,
    /// given the units its geometry was reported in.
    pub fn window_frame(&self, units: DisplayUnits) -> (Position, Size) {
        match units {
            DisplayUnits::Logical => (
                LogicalPosition::new(self.x as f64, self.y as f64).into(),
                LogicalSize::new(self.width as f64, self.height as f64).into(),
            ),
            DisplayUnits::Physical => (
                PhysicalPosition::new(self.x, self.y).into(),
                PhysicalSize::new(self.width, self.height).into(),
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayEnumerationError {
    #[error("Display enumeration unavailable: {0}")]
    Unavailable(String),

    #[error("Platform reported no displays")]
    NoDisplays,
}

/// List every attached monitor, in platform order.
pub fn list_monitors() -> Result<Vec<Monitor>, DisplayEnumerationError> {
    let start = std::time::Instant::now();
    let raw = xcap::Monitor::all()
        .map_err(|e| DisplayEnumerationError::Unavailable(e.to_string()))?;

    let mut monitors = Vec::with_capacity(raw.len());
    for (index, m) in raw.iter().enumerate() {
        monitors.push(describe(index, m)?);
    }

    if monitors.is_empty() {
        return Err(DisplayEnumerationError::NoDisplays);
    }

    log::info!(
        "[MONITOR] Enumerated {} display(s) in {}ms",
        monitors.len(),
        start.elapsed().as_millis()
    );
    for m in &monitors {
        log::debug!(
            "[MONITOR]   #{} {} ({}x{} at {},{}) primary={}",
            m.index, m.name, m.width, m.height, m.x, m.y, m.is_primary
        );
    }
    Ok(monitors)
}

fn describe(index: usize, m: &xcap::Monitor) -> Result<Monitor, DisplayEnumerationError> {
    let unavailable = |e: xcap::XCapError| DisplayEnumerationError::Unavailable(e.to_string());
    Ok(Monitor {
        index,
        id: m.id().map_err(unavailable)?,
        name: m.name().unwrap_or_else(|_| format!("Display {}", index + 1)),
        x: m.x().map_err(unavailable)?,
        y: m.y().map_err(unavailable)?,
        width: m.width().map_err(unavailable)?,
        height: m.height().map_err(unavailable)?,
        is_primary: m.is_primary().unwrap_or(false),
        scale_factor: m.scale_factor().unwrap_or(1.0),
    })
}

/// The primary monitor, or the first one if none reports as primary.
pub fn primary_or_first(monitors: &[Monitor]) -> Option<&Monitor> {
    monitors
        .iter()
        .find(|m| m.is_primary)
        .or_else(|| monitors.first())
}

/// Bounding box of the whole virtual desktop.
pub fn virtual_bounds(monitors: &[Monitor]) -> Option<ScreenBox> {
    monitors
        .iter()
        .map(Monitor::bounds)
        .reduce(|acc, b| acc.union(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(index: usize, x: i32, y: i32, w: u32, h: u32, primary: bool) -> Monitor {
        Monitor {
            index,
            id: index as u32 + 1,
            name: format!("M{}", index),
            x,
            y,
            width: w,
            height: h,
            is_primary: primary,
            scale_factor: 1.0,
        }
    }

    #[test]
    fn virtual_bounds_spans_negative_origins() {
        let monitors = vec![
            monitor(0, 0, 0, 1920, 1080, true),
            monitor(1, -1280, -200, 1280, 1024, false),
        ];
        assert_eq!(
            virtual_bounds(&monitors),
            Some(ScreenBox::new(-1280, -200, 1920, 1080))
        );
    }

    #[test]
    fn virtual_bounds_of_nothing_is_none() {
        assert_eq!(virtual_bounds(&[]), None);
    }

    #[test]
    fn primary_wins_over_order() {
        let monitors = vec![
            monitor(0, 0, 0, 1920, 1080, false),
            monitor(1, 1920, 0, 2560, 1440, true),
        ];
        assert_eq!(primary_or_first(&monitors).map(|m| m.index), Some(1));
    }

    #[test]
    fn first_monitor_when_none_is_primary() {
        let monitors = vec![
            monitor(0, 0, 0, 1920, 1080, false),
            monitor(1, 1920, 0, 2560, 1440, false),
        ];
        assert_eq!(primary_or_first(&monitors).map(|m| m.index), Some(0));
    }

    #[test]
    fn whole_screen_sits_at_origin() {
        let m = Monitor::whole_screen(1440, 900);
        assert_eq!(m.bounds(), ScreenBox::new(0, 0, 1440, 900));
        assert!(m.is_primary);
    }

    #[test]
    fn physical_frame_is_not_rescaled_on_scaled_displays() {
        // Secondary monitor right of a 150% primary, as Windows reports it.
        let mut m = monitor(1, 2880, 0, 2560, 1440, false);
        m.scale_factor = 1.5;
        let (position, size) = m.window_frame(DisplayUnits::Physical);

        assert_eq!(position.to_physical::<i32>(1.5), PhysicalPosition::new(2880, 0));
        assert_eq!(size.to_physical::<u32>(1.5), PhysicalSize::new(2560, 1440));
        assert_eq!(position.to_physical::<i32>(1.0), PhysicalPosition::new(2880, 0));
    }

    #[test]
    fn logical_frame_scales_with_the_display() {
        // Retina display reported in points.
        let mut m = monitor(0, 0, 0, 1440, 900, true);
        m.scale_factor = 2.0;
        let (position, size) = m.window_frame(DisplayUnits::Logical);

        assert_eq!(position.to_physical::<i32>(2.0), PhysicalPosition::new(0, 0));
        assert_eq!(size.to_physical::<u32>(2.0), PhysicalSize::new(2880, 1800));
        assert_eq!(size.to_logical::<u32>(2.0), LogicalSize::new(1440, 900));
    }

    #[test]
    fn negative_origins_survive_placement() {
        let m = monitor(1, -1920, -120, 1920, 1080, false);
        let (position, _) = m.window_frame(DisplayUnits::Physical);
        assert_eq!(position.to_physical::<i32>(1.25), PhysicalPosition::new(-1920, -120));
    }
}
