//! Global shortcuts: CmdOrCtrl+Shift+F (full screen), CmdOrCtrl+Shift+A (area).

use crate::pipeline;
use tauri::AppHandle;
use tauri_plugin_global_shortcut::{Code, GlobalShortcutExt, Modifiers, Shortcut, ShortcutState};

pub fn plugin() -> tauri::plugin::TauriPlugin<tauri::Wry> {
    tauri_plugin_global_shortcut::Builder::new().build()
}

#[cfg(target_os = "macos")]
fn primary_modifier() -> Modifiers {
    Modifiers::SUPER
}

#[cfg(not(target_os = "macos"))]
fn primary_modifier() -> Modifiers {
    Modifiers::CONTROL
}

/// Bind both capture shortcuts. A shortcut taken by another app is logged
/// and skipped; the tray still works.
pub fn register(app: &AppHandle) {
    let modifier = primary_modifier() | Modifiers::SHIFT;

    let full = Shortcut::new(Some(modifier), Code::KeyF);
    if let Err(e) = app.global_shortcut().on_shortcut(full, |app, _shortcut, event| {
        if event.state() == ShortcutState::Pressed {
            log::info!("[SHELL] Full-screen shortcut pressed");
            pipeline::trigger_full_screen(app);
        }
    }) {
        log::warn!("[SHELL] Could not bind full-screen shortcut: {}", e);
    }

    let area = Shortcut::new(Some(modifier), Code::KeyA);
    if let Err(e) = app.global_shortcut().on_shortcut(area, |app, _shortcut, event| {
        if event.state() == ShortcutState::Pressed {
            log::info!("[SHELL] Area shortcut pressed");
            pipeline::trigger_area(app);
        }
    }) {
        log::warn!("[SHELL] Could not bind area shortcut: {}", e);
    }
}
