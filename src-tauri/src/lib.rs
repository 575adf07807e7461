//! VisionAssist: Tauri application entry point.
//!
//! Module declarations, plugin registration, state management and the
//! command registry. Domain logic lives in the modules below; the shell
//! only wires them together.
//!
//! Commands are split across:
//!   - commands.rs  (one-step commands: session reads, overlay input, clipboard)
//!   - pipeline.rs  (multi-step orchestration: capture then dispatch)

pub mod capture;
mod commands;
pub mod config;
pub mod dispatch;
pub mod geometry;
pub mod monitor;
mod pipeline;
pub mod selection;
pub mod services;
pub mod session;
mod shortcuts;
mod tray;

use capture::{CaptureEngine, XcapGrabber};
use config::AppConfig;
use dispatch::{CompletionSink, TaskDispatcher, TerminalNotification};
use services::VisionClient;
use session::{Applied, CaptureSession};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tauri::{Emitter, Manager};

/// Everything the commands share. Managed once, lives for the whole app.
pub struct AppState {
    pub config: AppConfig,
    pub session: Mutex<CaptureSession>,
    pub engine: Arc<CaptureEngine<XcapGrabber>>,
    pub service: Arc<VisionClient>,
    closing: AtomicBool,
}

impl AppState {
    fn new(config: AppConfig) -> Self {
        let service = Arc::new(VisionClient::from_config(&config));
        Self {
            config,
            session: Mutex::new(CaptureSession::new()),
            engine: Arc::new(CaptureEngine::new(XcapGrabber)),
            service,
            closing: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Transient status line shown under the toolbar.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusMessage {
    pub level: &'static str,
    pub text: String,
    pub timeout_ms: u64,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: "info", text: text.into(), timeout_ms: 3000 }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self { level: "warn", text: text.into(), timeout_ms: 5000 }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: "error", text: text.into(), timeout_ms: 8000 }
    }
}

pub(crate) fn emit_status(app: &tauri::AppHandle, status: StatusMessage) {
    match status.level {
        "error" => log::error!("[SHELL] {}", status.text),
        "warn" => log::warn!("[SHELL] {}", status.text),
        _ => log::info!("[SHELL] {}", status.text),
    }
    if let Err(e) = app.emit_to("main", "status", &status) {
        log::warn!("[SHELL] Failed to emit status: {}", e);
    }
}

/// Push the session snapshot to the main window.
pub(crate) fn emit_session(app: &tauri::AppHandle) {
    let state = app.state::<AppState>();
    let snapshot = match state.session.lock() {
        Ok(session) => session.snapshot(),
        Err(e) => {
            log::error!("[SHELL] Session lock poisoned: {}", e);
            return;
        }
    };
    let _ = app.emit_to("main", "session-changed", &snapshot);
}

/// Hands terminal notifications to the main thread, where the session and
/// the webview are updated.
struct MainThreadSink {
    app: tauri::AppHandle,
}

impl CompletionSink for MainThreadSink {
    fn deliver(&self, notification: TerminalNotification) {
        let app = self.app.clone();
        let queued = self.app.run_on_main_thread(move || {
            let state = app.state::<AppState>();
            if state.is_closing() {
                return;
            }
            let applied = match state.session.lock() {
                Ok(mut session) => session.apply(notification),
                Err(e) => {
                    log::error!("[SHELL] Session lock poisoned: {}", e);
                    return;
                }
            };
            match applied {
                Applied::Completed { operation } => {
                    emit_status(&app, StatusMessage::info(format!("{} complete", operation.label())));
                }
                Applied::Failed { operation, message } => {
                    emit_status(
                        &app,
                        StatusMessage::error(format!("{} failed: {}", operation.label(), message)),
                    );
                }
                Applied::Stale => return,
            }
            emit_session(&app);
        });
        if let Err(e) = queued {
            log::error!("[SHELL] Could not reach the main thread: {}", e);
        }
    }
}

/// Entry point, called from main.rs.
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::init();

    // No window opens without a credential.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("[CONFIG] {}", e);
            eprintln!("[STARTUP] {}", e);
            std::process::exit(1);
        }
    };

    let app = tauri::Builder::default()
        .plugin(shortcuts::plugin())
        .manage(AppState::new(config))
        .invoke_handler(tauri::generate_handler![
            // Simple commands (commands.rs)
            commands::list_displays,
            commands::get_session,
            commands::set_mode,
            commands::overlay_pointer_down,
            commands::overlay_pointer_move,
            commands::overlay_pointer_up,
            commands::overlay_cancel,
            commands::get_overlay_frame,
            commands::copy_to_clipboard,
            // Pipeline commands (pipeline.rs)
            pipeline::capture_full_screen,
            pipeline::start_area_capture,
            pipeline::run_ocr,
            pipeline::summarize_text,
            pipeline::summarize_image,
            pipeline::translate_text,
            pipeline::describe_image,
        ])
        .setup(|app| {
            log::info!("[SHELL] VisionAssist starting up");

            let runtime = tauri::async_runtime::block_on(async { tokio::runtime::Handle::current() });
            let sink = Arc::new(MainThreadSink {
                app: app.handle().clone(),
            });
            app.manage(TaskDispatcher::new(runtime, sink));

            tray::setup_tray(app.handle())?;
            shortcuts::register(app.handle());

            log::info!("[SHELL] Tray and shortcuts ready");
            Ok(())
        })
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(e) => {
            log::error!("[SHELL] Failed to build application: {}", e);
            std::process::exit(1);
        }
    };

    app.run(|handle, event| {
        if let tauri::RunEvent::ExitRequested { .. } | tauri::RunEvent::Exit = event {
            shut_down(handle);
        }
    });
}

/// Stop in-flight work and wait for it before the process goes away.
fn shut_down(app: &tauri::AppHandle) {
    let state = app.state::<AppState>();
    if state.closing.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(dispatcher) = app.try_state::<TaskDispatcher>() {
        let pending = dispatcher.in_flight();
        log::info!("[SHELL] Shutting down with {} task(s) in flight", pending);
        tauri::async_runtime::block_on(dispatcher.shutdown());
    }
}
