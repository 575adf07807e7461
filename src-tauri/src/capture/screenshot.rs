//! Screen capture using the `xcap` crate.
//!
//! This is the infrastructure layer; it talks to the OS.
//! Everything above it works against the `ScreenGrabber` trait.

use super::region::compose_native;
use super::{GrabError, GrabTarget, ScreenGrabber};
use crate::geometry::ScreenBox;
use image::RgbaImage;
use xcap::Monitor;

/// Grabs by capturing every display that overlaps the target and stitching
/// the overlapping parts together, at full device resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapGrabber;

impl ScreenGrabber for XcapGrabber {
    fn grab(&self, target: GrabTarget) -> Result<RgbaImage, GrabError> {
        let monitors = Monitor::all().map_err(classify)?;
        let placed: Vec<(ScreenBox, Monitor)> = monitors
            .into_iter()
            .filter_map(|m| Some((monitor_box(&m)?, m)))
            .collect();

        let target_box = match target {
            GrabTarget::Region(b) => b,
            GrabTarget::AllDisplays => placed
                .iter()
                .map(|(b, _)| *b)
                .reduce(|acc, b| acc.union(b))
                .ok_or(GrabError::OffScreen)?,
        };

        let mut sources = Vec::new();
        for (bounds, monitor) in &placed {
            if target_box.intersect(*bounds).is_none() {
                continue;
            }
            let pixels = monitor.capture_image().map_err(classify)?;
            sources.push((*bounds, pixels));
        }

        if sources.is_empty() {
            return Err(GrabError::OffScreen);
        }
        Ok(compose_native(target_box, sources))
    }
}

fn monitor_box(m: &Monitor) -> Option<ScreenBox> {
    Some(ScreenBox::from_origin(
        m.x().ok()?,
        m.y().ok()?,
        m.width().ok()?,
        m.height().ok()?,
    ))
}

fn classify(e: xcap::XCapError) -> GrabError {
    let message = e.to_string();
    if message.to_lowercase().contains("permission") {
        GrabError::PermissionDenied(message)
    } else {
        GrabError::Platform(message)
    }
}
