//! Simple Tauri command handlers.
//!
//! Thin wrappers that bridge frontend invoke() calls to Rust. Each command
//! does one thing: read the session, feed the selector, write the clipboard.
//!
//! Multi-step commands live in pipeline.rs instead.

use crate::geometry::{Point, SelectionRect};
use crate::monitor::{self, Monitor};
use crate::selection::OverlayFrame;
use crate::session::{Mode, SessionSnapshot};
use crate::{emit_session, emit_status, pipeline, AppState, StatusMessage};
use tauri::Manager;

/// What the overlay needs on load: its monitor and the first frame.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayInit {
    pub monitor: Monitor,
    pub frame: OverlayFrame,
}

/// Tauri command: list attached displays for the monitor picker.
#[tauri::command]
pub fn list_displays() -> Result<Vec<Monitor>, String> {
    let monitors = monitor::list_monitors().map_err(|e| e.to_string())?;
    if let Some(desktop) = monitor::virtual_bounds(&monitors) {
        log::info!(
            "[MONITOR] Virtual desktop {}x{} at ({},{})",
            desktop.width(),
            desktop.height(),
            desktop.left,
            desktop.top
        );
    }
    Ok(monitors)
}

/// Tauri command: current session snapshot (mode, tabs, busy state).
#[tauri::command]
pub fn get_session(state: tauri::State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let session = state.session.lock().map_err(|e| e.to_string())?;
    Ok(session.snapshot())
}

/// Tauri command: switch between OCR and description mode.
#[tauri::command]
pub fn set_mode(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    mode: Mode,
) -> Result<SessionSnapshot, String> {
    let snapshot = {
        let mut session = state.session.lock().map_err(|e| e.to_string())?;
        session.set_mode(mode);
        session.snapshot()
    };
    log::info!("[SHELL] Mode set to {:?}", mode);
    emit_session(&app);
    Ok(snapshot)
}

/// Tauri command: the overlay's monitor and initial (fully dimmed) frame.
///
/// Called by the overlay on load instead of listening for an event, which
/// could fire before the page is ready.
#[tauri::command]
pub fn get_overlay_frame(state: tauri::State<'_, AppState>) -> Result<OverlayInit, String> {
    let session = state.session.lock().map_err(|e| e.to_string())?;
    let selector = session.selector.as_ref().ok_or("No area selection is open")?;
    let monitor = selector.monitor().clone();
    let frame = OverlayFrame::new(0, monitor.width, monitor.height, SelectionRect::default());
    Ok(OverlayInit { monitor, frame })
}

/// Tauri command: mouse press on the overlay, in monitor-local pixels.
#[tauri::command]
pub fn overlay_pointer_down(
    state: tauri::State<'_, AppState>,
    x: i32,
    y: i32,
) -> Result<OverlayFrame, String> {
    let mut session = state.session.lock().map_err(|e| e.to_string())?;
    let selector = session.selector_mut().map_err(|e| e.to_string())?;
    selector.pointer_down(Point::new(x, y)).map_err(|e| e.to_string())
}

/// Tauri command: mouse move on the overlay. `None` outside a drag.
#[tauri::command]
pub fn overlay_pointer_move(
    state: tauri::State<'_, AppState>,
    x: i32,
    y: i32,
) -> Result<Option<OverlayFrame>, String> {
    let mut session = state.session.lock().map_err(|e| e.to_string())?;
    let selector = session.selector_mut().map_err(|e| e.to_string())?;
    Ok(selector.pointer_move(Point::new(x, y)))
}

/// Tauri command: mouse release on the overlay. Closes it and, for a real
/// selection, starts the capture.
#[tauri::command]
pub async fn overlay_pointer_up(app: tauri::AppHandle, x: i32, y: i32) -> Result<(), String> {
    pipeline::finish_selection(&app, Point::new(x, y)).await
}

/// Tauri command: Escape on the overlay. Nothing is captured afterwards.
#[tauri::command]
pub fn overlay_cancel(app: tauri::AppHandle, state: tauri::State<'_, AppState>) -> Result<(), String> {
    {
        let mut session = state.session.lock().map_err(|e| e.to_string())?;
        if let Ok(selector) = session.selector_mut() {
            selector.cancel();
        }
        session.close_selector();
    }
    close_overlay(&app);
    emit_status(&app, StatusMessage::info("Selection cancelled"));
    Ok(())
}

/// Tauri command: copy text to the system clipboard.
///
/// Uses arboard for native clipboard access; navigator.clipboard is not
/// reliable inside webviews.
#[tauri::command]
pub fn copy_to_clipboard(app: tauri::AppHandle, text: String) -> Result<(), String> {
    if text.trim().is_empty() {
        emit_status(&app, StatusMessage::warn("Nothing to copy"));
        return Ok(());
    }
    let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
    clipboard.set_text(&text).map_err(|e| e.to_string())?;
    log::info!("[SHELL] Copied {} chars to clipboard", text.chars().count());
    emit_status(&app, StatusMessage::info("Copied to clipboard"));
    Ok(())
}

pub(crate) fn close_overlay(app: &tauri::AppHandle) {
    if let Some(window) = app.get_webview_window(pipeline::OVERLAY_LABEL) {
        if let Err(e) = window.destroy() {
            log::warn!("[SHELL] Failed to close overlay: {}", e);
        }
    }
}
