//! Screen capture domain, public API.
//!
//! `CaptureEngine` turns a `CaptureRequest` into a `CapturedImage`:
//!   1. validate the request (empty or out-of-monitor rectangles never reach the OS)
//!   2. translate monitor-local rectangles into virtual-screen boxes
//!   3. grab through a `ScreenGrabber`, with one full-desktop fallback

mod region;
mod screenshot;

pub use region::{compose, compose_native, encode_png, EncodeError};
pub use screenshot::XcapGrabber;

use crate::geometry::{ScreenBox, SelectionRect};
use crate::monitor::Monitor;
use image::RgbaImage;

/// What the platform is asked to grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabTarget {
    /// The whole virtual desktop, every display.
    AllDisplays,
    /// An absolute box in virtual-screen coordinates.
    Region(ScreenBox),
}

/// Platform capture primitive. Implemented over xcap; tests use fakes.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self, target: GrabTarget) -> Result<RgbaImage, GrabError>;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GrabError {
    #[error("Screen capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Requested area is not on any display")]
    OffScreen,

    #[error("Platform capture failed: {0}")]
    Platform(String),
}

/// Fully describes one capture. Built through the constructors so a
/// rectangle always comes with the monitor it is relative to.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    monitor: Option<Monitor>,
    rect: Option<SelectionRect>,
}

impl CaptureRequest {
    /// The whole virtual desktop.
    pub fn all_monitors() -> Self {
        Self {
            monitor: None,
            rect: None,
        }
    }

    /// One entire monitor.
    pub fn monitor(monitor: Monitor) -> Self {
        Self {
            monitor: Some(monitor),
            rect: None,
        }
    }

    /// A monitor-local rectangle on `monitor`.
    pub fn area(monitor: Monitor, rect: SelectionRect) -> Self {
        Self {
            monitor: Some(monitor),
            rect: Some(rect),
        }
    }

    pub fn target_monitor(&self) -> Option<&Monitor> {
        self.monitor.as_ref()
    }

    pub fn rect(&self) -> Option<SelectionRect> {
        self.rect
    }

    /// Translate this request into what the platform should grab.
    ///
    /// Fails before any capture for zero-area or out-of-monitor rectangles.
    pub fn resolve(&self) -> Result<GrabTarget, CaptureError> {
        match (&self.monitor, self.rect) {
            (None, _) => Ok(GrabTarget::AllDisplays),
            (Some(m), None) => Ok(GrabTarget::Region(m.bounds())),
            (Some(m), Some(rect)) => {
                if rect.is_empty() {
                    return Err(CaptureError::EmptySelection {
                        width: rect.width,
                        height: rect.height,
                    });
                }
                if !rect.fits_within(m.width, m.height) {
                    return Err(CaptureError::OutOfBounds {
                        rect,
                        monitor: m.index,
                    });
                }
                Ok(GrabTarget::Region(ScreenBox::from_origin(
                    m.x + rect.x,
                    m.y + rect.y,
                    rect.width,
                    rect.height,
                )))
            }
        }
    }
}

/// An owned RGBA bitmap. Moves from the capturer into a task, then to the
/// result consumer; never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pixels: RgbaImage,
}

impl CapturedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn to_png(&self) -> Result<Vec<u8>, EncodeError> {
        encode_png(&self.pixels)
    }

    /// `data:image/png;base64,...` URL for vision requests.
    pub fn to_png_data_url(&self) -> Result<String, EncodeError> {
        let png = self.to_png()?;
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &png);
        Ok(format!("data:image/png;base64,{}", encoded))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CaptureError {
    #[error("Nothing selected ({width}x{height} area)")]
    EmptySelection { width: u32, height: u32 },

    #[error(
        "Selection {}x{} at ({},{}) is outside monitor #{monitor}",
        rect.width, rect.height, rect.x, rect.y
    )]
    OutOfBounds { rect: SelectionRect, monitor: usize },

    #[error("Screen capture failed: {cause}")]
    Failed {
        cause: GrabError,
        /// Error from the full-desktop retry, if one was made.
        fallback: Option<GrabError>,
    },
}

impl CaptureError {
    /// Zero-area selection: the user clicked without dragging.
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, CaptureError::EmptySelection { .. })
    }
}

pub struct CaptureEngine<G> {
    grabber: G,
}

impl<G: ScreenGrabber> CaptureEngine<G> {
    pub fn new(grabber: G) -> Self {
        Self { grabber }
    }

    pub fn grabber(&self) -> &G {
        &self.grabber
    }

    /// Capture what `request` describes.
    ///
    /// A platform failure on a monitor/area target is retried once against
    /// the full virtual desktop; a failure there is final.
    pub fn capture(&self, request: &CaptureRequest) -> Result<CapturedImage, CaptureError> {
        let target = request.resolve()?;
        let start = std::time::Instant::now();

        let cause = match self.grabber.grab(target) {
            Ok(pixels) => {
                log::info!(
                    "[CAPTURE] {:?} -> {}x{} in {}ms",
                    target,
                    pixels.width(),
                    pixels.height(),
                    start.elapsed().as_millis()
                );
                return Ok(CapturedImage::new(pixels));
            }
            Err(e) => e,
        };

        if target == GrabTarget::AllDisplays {
            log::error!("[CAPTURE] Full-desktop capture failed: {}", cause);
            return Err(CaptureError::Failed {
                cause,
                fallback: None,
            });
        }

        log::warn!(
            "[CAPTURE] {:?} failed ({}), retrying once with the full desktop",
            target,
            cause
        );
        match self.grabber.grab(GrabTarget::AllDisplays) {
            Ok(pixels) => {
                log::info!(
                    "[CAPTURE] Fallback full desktop -> {}x{} in {}ms",
                    pixels.width(),
                    pixels.height(),
                    start.elapsed().as_millis()
                );
                Ok(CapturedImage::new(pixels))
            }
            Err(fallback) => {
                log::error!("[CAPTURE] Fallback failed too: {}", fallback);
                Err(CaptureError::Failed {
                    cause,
                    fallback: Some(fallback),
                })
            }
        }
    }
}
