//! Capture-to-result pipeline commands.
//!
//! The multi-step orchestration lives here:
//! - capture_full_screen: hide main window, grab the desktop, run the mode's operation
//! - start_area_capture: open the overlay on one monitor
//! - finish_selection: close the overlay, grab the area, run the mode's operation
//! - run_ocr / summarize / translate / describe: resubmit on the current session
//!
//! Captures run on the blocking pool and service calls go through the
//! `TaskDispatcher`; the main thread only ever waits on a mutex.

use crate::capture::{CaptureError, CaptureRequest, CapturedImage};
use crate::commands::close_overlay;
use crate::dispatch::TaskDispatcher;
use crate::geometry::Point;
use crate::monitor::{self, DisplayUnits, Monitor};
use crate::selection::SelectionOutcome;
use crate::services::{Operation, TaskInput};
use crate::session::{CaptureSession, SessionError, StartError};
use crate::{emit_session, emit_status, AppState, StatusMessage};
use std::sync::Arc;
use std::time::Duration;
use tauri::{AppHandle, Manager};

pub(crate) const MAIN_LABEL: &str = "main";
pub(crate) const OVERLAY_LABEL: &str = "overlay";

/// Tauri command: capture every monitor, then run the mode's default operation.
///
/// The main window is hidden for the configured delay first so it does not
/// end up in the shot.
#[tauri::command]
pub async fn capture_full_screen(app: AppHandle) -> Result<(), String> {
    let delay_ms = {
        let state = app.state::<AppState>();
        let session = state.session.lock().map_err(|e| e.to_string())?;
        if let Err(e) = session.ensure_idle() {
            drop(session);
            emit_status(&app, StatusMessage::warn(e.to_string()));
            return Ok(());
        }
        state.config.capture_delay_ms
    };

    let main = app.get_webview_window(MAIN_LABEL);
    if let Some(window) = &main {
        window.hide().map_err(|e| e.to_string())?;
    }
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let result = capture(&app, CaptureRequest::all_monitors()).await;

    if let Some(window) = &main {
        let _ = window.show();
        let _ = window.set_focus();
    }
    handle_capture(&app, result.map_err(|e| report(&app, e))?)
}

/// Tauri command: open the selection overlay on a monitor.
///
/// `monitor_index` comes from the picker; `None` means the primary monitor.
/// If displays cannot be enumerated the overlay covers the primary screen
/// as reported by the window system.
#[tauri::command]
pub async fn start_area_capture(app: AppHandle, monitor_index: Option<usize>) -> Result<(), String> {
    let monitor = match pick_monitor(&app, monitor_index) {
        Ok(m) => m,
        Err(e) => {
            emit_status(&app, StatusMessage::error(e.clone()));
            return Err(e);
        }
    };

    {
        let state = app.state::<AppState>();
        let mut session = state.session.lock().map_err(|e| e.to_string())?;
        // An overlay closed by the window manager leaves its selector behind.
        if app.get_webview_window(OVERLAY_LABEL).is_none() {
            session.close_selector();
        }
        if let Err(e) = session.open_selector(monitor.clone()) {
            drop(session);
            emit_status(&app, StatusMessage::warn(e.to_string()));
            return Ok(());
        }
    }

    close_overlay(&app);
    let build = tauri::WebviewWindowBuilder::new(
        &app,
        OVERLAY_LABEL,
        tauri::WebviewUrl::App("overlay.html".into()),
    )
    .title("VisionAssist Selection")
    .transparent(true)
    .decorations(false)
    .always_on_top(true)
    .skip_taskbar(true)
    .resizable(false)
    .visible(false)
    .build()
    .and_then(|window| place_on(&window, &monitor).map(|()| window));

    if let Err(e) = build {
        close_overlay(&app);
        let state = app.state::<AppState>();
        if let Ok(mut session) = state.session.lock() {
            session.close_selector();
        }
        let message = format!("Failed to open selection overlay: {}", e);
        emit_status(&app, StatusMessage::error(message.clone()));
        return Err(message);
    }

    log::info!(
        "[SHELL] Overlay open on monitor #{} '{}' at ({},{}) {}x{} @{}x",
        monitor.index,
        monitor.name,
        monitor.x,
        monitor.y,
        monitor.width,
        monitor.height,
        monitor.scale_factor
    );
    Ok(())
}

/// Cover `monitor` exactly, then show the window.
///
/// Size goes last: moving onto a display with a different scale factor
/// makes the platform rescale the window.
fn place_on(window: &tauri::WebviewWindow, monitor: &Monitor) -> tauri::Result<()> {
    let (position, size) = monitor.window_frame(DisplayUnits::native());
    window.set_position(position)?;
    window.set_size(size)?;
    window.show()?;
    window.set_focus()
}

/// Pointer release on the overlay: end the drag and, for a real selection,
/// capture it.
pub(crate) async fn finish_selection(app: &AppHandle, at: Point) -> Result<(), String> {
    let state = app.state::<AppState>();
    let finished = {
        let mut session = state.session.lock().map_err(|e| e.to_string())?;
        session.finish_selection(at)
    };
    close_overlay(app);
    let (outcome, monitor) = finished.map_err(|e| report(app, e))?;
    let delay_ms = state.config.capture_delay_ms;

    let rect = match outcome {
        SelectionOutcome::Selected(rect) => rect,
        SelectionOutcome::Cancelled => {
            emit_status(app, StatusMessage::info("Selection cancelled"));
            return Ok(());
        }
    };

    // The overlay's dimming must be off screen before the grab.
    if !rect.is_empty() {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    let result = capture(app, CaptureRequest::area(monitor, rect)).await;
    handle_capture(app, result.map_err(|e| report(app, e))?)
}

/// Tauri command: OCR the current image again.
#[tauri::command]
pub fn run_ocr(app: AppHandle) -> Result<(), String> {
    submit(&app, Operation::Ocr, |s| s.take_input(Operation::Ocr))
}

/// Tauri command: summarize the current OCR text.
#[tauri::command]
pub fn summarize_text(app: AppHandle) -> Result<(), String> {
    submit(&app, Operation::Summarize, |s| s.take_input(Operation::Summarize))
}

/// Tauri command: summarize the text visible in the current image.
#[tauri::command]
pub fn summarize_image(app: AppHandle) -> Result<(), String> {
    submit(&app, Operation::Summarize, CaptureSession::take_image)
}

/// Tauri command: translate the current OCR text (Japanese <-> English).
#[tauri::command]
pub fn translate_text(app: AppHandle) -> Result<(), String> {
    submit(&app, Operation::Translate, |s| s.take_input(Operation::Translate))
}

/// Tauri command: describe the current image.
#[tauri::command]
pub fn describe_image(app: AppHandle) -> Result<(), String> {
    submit(&app, Operation::Describe, |s| s.take_input(Operation::Describe))
}

/// Entry point for the tray and the shortcut: full-screen capture.
pub(crate) fn trigger_full_screen(app: &AppHandle) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(e) = capture_full_screen(app.clone()).await {
            log::error!("[SHELL] Full-screen capture failed: {}", e);
        }
    });
}

/// Entry point for the tray and the shortcut: area capture on the primary monitor.
pub(crate) fn trigger_area(app: &AppHandle) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(e) = start_area_capture(app.clone(), None).await {
            log::error!("[SHELL] Area capture failed: {}", e);
        }
    });
}

fn pick_monitor(app: &AppHandle, index: Option<usize>) -> Result<Monitor, String> {
    match monitor::list_monitors() {
        Ok(monitors) => {
            let chosen = match index {
                Some(i) => monitors.iter().find(|m| m.index == i),
                None => monitor::primary_or_first(&monitors),
            };
            chosen
                .cloned()
                .ok_or_else(|| format!("No monitor #{}", index.unwrap_or_default()))
        }
        Err(e) => {
            log::warn!("[SHELL] {}; falling back to the primary screen", e);
            let primary = app
                .primary_monitor()
                .map_err(|e| e.to_string())?
                .ok_or("No screen available")?;
            let size = *primary.size();
            let (width, height) = match DisplayUnits::native() {
                DisplayUnits::Physical => (size.width, size.height),
                DisplayUnits::Logical => {
                    let logical = size.to_logical::<u32>(primary.scale_factor());
                    (logical.width, logical.height)
                }
            };
            Ok(Monitor::whole_screen(width, height))
        }
    }
}

/// Run `request` on the blocking pool.
async fn capture(
    app: &AppHandle,
    request: CaptureRequest,
) -> Result<Result<CapturedImage, CaptureError>, String> {
    let engine = Arc::clone(&app.state::<AppState>().engine);
    let start = std::time::Instant::now();
    let result = tauri::async_runtime::spawn_blocking(move || engine.capture(&request))
        .await
        .map_err(|e| format!("Capture worker failed: {}", e))?;
    log::info!("[CAPTURE] Capture finished in {}ms", start.elapsed().as_millis());
    Ok(result)
}

/// Store a fresh capture and run the mode's default operation on it.
/// Capture errors become status messages.
fn handle_capture(app: &AppHandle, result: Result<CapturedImage, CaptureError>) -> Result<(), String> {
    let image = match result {
        Ok(image) => image,
        Err(e) if e.is_empty_selection() => {
            emit_status(app, StatusMessage::warn(e.to_string()));
            return Ok(());
        }
        Err(e) => {
            emit_status(app, StatusMessage::error(e.to_string()));
            return Ok(());
        }
    };
    log::info!("[CAPTURE] Captured {}x{}", image.width(), image.height());

    let stored = {
        let state = app.state::<AppState>();
        let mut session = state.session.lock().map_err(|e| e.to_string())?;
        session
            .store_capture(image)
            .map(|()| session.mode.default_operation())
    };
    match stored {
        Ok(operation) => submit(app, operation, move |s| s.take_input(operation)),
        Err(e) => {
            emit_status(app, StatusMessage::warn(format!("Capture discarded. {}", e)));
            Ok(())
        }
    }
}

/// Take the input out of the session and hand the task to the dispatcher.
///
/// Anything that stops the task from starting (busy, no text, no image) is
/// reported as a warning status rather than a command error.
fn submit<F>(app: &AppHandle, operation: Operation, take: F) -> Result<(), String>
where
    F: FnOnce(&mut CaptureSession) -> Result<TaskInput, SessionError>,
{
    let state = app.state::<AppState>();
    let dispatcher = app.state::<TaskDispatcher>();
    let started = {
        let mut session = state.session.lock().map_err(|e| e.to_string())?;
        session.start_task(&dispatcher, Arc::clone(&state.service), operation, take)
    };
    match started {
        Ok(_) => {}
        Err(StartError::Session(e)) => {
            emit_status(app, StatusMessage::warn(e.to_string()));
            return Ok(());
        }
        Err(e @ StartError::Dispatch(_)) => {
            emit_status(app, StatusMessage::error(e.to_string()));
            emit_session(app);
            return Ok(());
        }
    }
    emit_status(app, StatusMessage::info(format!("Processing {}...", operation.label())));
    emit_session(app);
    Ok(())
}

/// Show `error` as a transient status and hand it back as the command error.
fn report(app: &AppHandle, error: impl std::fmt::Display) -> String {
    let message = error.to_string();
    emit_status(app, StatusMessage::error(message.clone()));
    message
}
