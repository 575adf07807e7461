//! The active capture session: the one value the shell threads through
//! the pipeline instead of ambient per-window fields.
//!
//! Holds the mode, the live selector (while an overlay is open), the last
//! captured image, the in-flight task and the result tabs.

use crate::capture::CapturedImage;
use crate::dispatch::{
    DispatchError, ProcessingTask, Rejected, TaskDispatcher, TaskHandle, TaskOutcome,
    TerminalNotification,
};
use crate::geometry::Point;
use crate::monitor::Monitor;
use crate::selection::{AreaSelector, SelectionError, SelectionOutcome};
use crate::services::{Operation, TaskInput, TextService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Ocr,
    Description,
}

impl Mode {
    /// What runs automatically on a fresh capture.
    pub fn default_operation(&self) -> Operation {
        match self {
            Mode::Ocr => Operation::Ocr,
            Mode::Description => Operation::Describe,
        }
    }
}

/// Result text per operation kind. Each tab only ever holds a complete result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultTabs {
    pub ocr: String,
    pub summary: String,
    pub translation: String,
    pub description: String,
}

impl ResultTabs {
    pub fn get(&self, operation: Operation) -> &str {
        match operation {
            Operation::Ocr => &self.ocr,
            Operation::Summarize => &self.summary,
            Operation::Translate => &self.translation,
            Operation::Describe => &self.description,
        }
    }

    pub fn set(&mut self, operation: Operation, text: String) {
        let slot = match operation {
            Operation::Ocr => &mut self.ocr,
            Operation::Summarize => &mut self.summary,
            Operation::Translate => &mut self.translation,
            Operation::Describe => &mut self.description,
        };
        *slot = text;
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Still processing {0}, wait for it to finish")]
    Busy(&'static str),

    #[error("No text to {0}. Run OCR first.")]
    NoText(&'static str),

    #[error("No captured image. Capture the screen first.")]
    NoImage,

    #[error("An area selection is already open")]
    SelectionOpen,

    #[error("No area selection is open")]
    NoSelection,

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Why `start_task` did not start anything.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StartError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// How a terminal notification changed the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Completed { operation: Operation },
    Failed { operation: Operation, message: String },
    /// Not the task the session was waiting for; ignored.
    Stale,
}

#[derive(Debug, Default)]
pub struct CaptureSession {
    pub mode: Mode,
    pub selector: Option<AreaSelector>,
    pub current_image: Option<CapturedImage>,
    pub in_flight: Option<TaskHandle>,
    pub results: ResultTabs,
    pub active_tab: Option<Operation>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn ensure_idle(&self) -> Result<(), SessionError> {
        match &self.in_flight {
            Some(handle) => Err(SessionError::Busy(handle.operation.label())),
            None => Ok(()),
        }
    }

    /// Switch mode and bring its tab forward.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.active_tab = Some(match mode {
            Mode::Ocr => Operation::Ocr,
            Mode::Description => Operation::Describe,
        });
    }

    /// Open a selector on `monitor`, armed and waiting for the first press.
    pub fn open_selector(&mut self, monitor: Monitor) -> Result<&mut AreaSelector, SessionError> {
        self.ensure_idle()?;
        if self.selector.as_ref().is_some_and(|s| !s.state().is_terminal()) {
            return Err(SessionError::SelectionOpen);
        }
        let mut selector = AreaSelector::new(monitor);
        // A fresh selector is Idle, so activation cannot fail.
        let _ = selector.activate();
        Ok(self.selector.insert(selector))
    }

    pub fn selector_mut(&mut self) -> Result<&mut AreaSelector, SessionError> {
        self.selector.as_mut().ok_or(SessionError::NoSelection)
    }

    /// Pointer release: end the drag and close the selector, whatever the
    /// result. Returns the outcome and the monitor it is relative to.
    pub fn finish_selection(&mut self, at: Point) -> Result<(SelectionOutcome, Monitor), SessionError> {
        let selector = self.selector_mut()?;
        let finished = selector
            .pointer_up(at)
            .map(|outcome| (outcome, selector.monitor().clone()))
            .map_err(SessionError::from);
        self.close_selector();
        finished
    }

    /// Remove the selector once it is done with.
    pub fn close_selector(&mut self) -> Option<AreaSelector> {
        self.selector.take()
    }

    /// Input for `operation`, taken out of the session.
    ///
    /// Image operations move the current image into the task; it comes back
    /// with the terminal notification. Text operations read the OCR tab.
    pub fn take_input(&mut self, operation: Operation) -> Result<TaskInput, SessionError> {
        self.ensure_idle()?;
        match operation {
            Operation::Ocr | Operation::Describe => self.take_image(),
            Operation::Summarize | Operation::Translate => {
                let text = self.results.ocr.trim();
                if text.is_empty() {
                    let verb = if operation == Operation::Summarize {
                        "summarize"
                    } else {
                        "translate"
                    };
                    return Err(SessionError::NoText(verb));
                }
                Ok(TaskInput::Text(text.to_string()))
            }
        }
    }

    /// The current image as task input, for any image-capable operation.
    pub fn take_image(&mut self) -> Result<TaskInput, SessionError> {
        self.ensure_idle()?;
        self.current_image
            .take()
            .map(TaskInput::Image)
            .ok_or(SessionError::NoImage)
    }

    /// Keep a fresh capture as the current image.
    ///
    /// Refused while a task runs: the task owns the previous image and puts
    /// it back on completion, which would silently replace this one.
    pub fn store_capture(&mut self, image: CapturedImage) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.current_image = Some(image);
        Ok(())
    }

    /// Take the input with `take` and hand the task to `dispatcher`.
    ///
    /// The handle is recorded before this returns, so a caller holding the
    /// session lock cannot see the notification first. A refused task gives
    /// its input back.
    pub fn start_task<S, F>(
        &mut self,
        dispatcher: &TaskDispatcher,
        service: Arc<S>,
        operation: Operation,
        take: F,
    ) -> Result<TaskHandle, StartError>
    where
        S: TextService,
        F: FnOnce(&mut Self) -> Result<TaskInput, SessionError>,
    {
        let input = take(self)?;
        match dispatcher.submit(service, ProcessingTask::new(operation, input)) {
            Ok(handle) => {
                self.begin_task(handle);
                Ok(handle)
            }
            Err(Rejected { error, task }) => {
                self.restore_input(task.input);
                Err(error.into())
            }
        }
    }

    pub fn begin_task(&mut self, handle: TaskHandle) {
        self.in_flight = Some(handle);
    }

    /// Put an input back when the task never started.
    pub fn restore_input(&mut self, input: TaskInput) {
        if let TaskInput::Image(image) = input {
            self.current_image = Some(image);
        }
    }

    /// Fold a terminal notification into the session.
    pub fn apply(&mut self, notification: TerminalNotification) -> Applied {
        let expected = self.in_flight.map(|h| h.id);
        if expected != Some(notification.id) {
            log::warn!(
                "[SESSION] Ignoring notification for task {} (waiting for {:?})",
                notification.id,
                expected
            );
            return Applied::Stale;
        }
        self.in_flight = None;

        if let Some(input) = notification.input {
            self.restore_input(input);
        }

        let operation = notification.operation;
        match notification.outcome {
            TaskOutcome::Completed(text) => {
                self.results.set(operation, text);
                self.active_tab = Some(operation);
                Applied::Completed { operation }
            }
            TaskOutcome::Failed(e) => Applied::Failed {
                operation,
                message: e.to_string(),
            },
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            busy: self.in_flight.map(|h| h.operation),
            active_tab: self.active_tab,
            results: self.results.clone(),
            image_size: self
                .current_image
                .as_ref()
                .map(|i| (i.width(), i.height())),
        }
    }
}

/// What the main window renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub busy: Option<Operation>,
    pub active_tab: Option<Operation>,
    pub results: ResultTabs,
    pub image_size: Option<(u32, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{CompletionSink, TaskId};
    use crate::geometry::SelectionRect;
    use crate::services::{ServiceError, ServiceFuture};
    use image::RgbaImage;

    fn image() -> CapturedImage {
        CapturedImage::new(RgbaImage::new(2, 2))
    }

    struct Discard;

    impl CompletionSink for Discard {
        fn deliver(&self, _notification: TerminalNotification) {}
    }

    struct Unused;

    impl TextService for Unused {
        fn run<'a>(&'a self, _operation: Operation, _input: &'a TaskInput) -> ServiceFuture<'a> {
            Box::pin(async { Ok(String::new()) })
        }
    }

    fn notification(id: u64, operation: Operation, outcome: TaskOutcome, input: Option<TaskInput>) -> TerminalNotification {
        TerminalNotification {
            id: TaskId(id),
            operation,
            outcome,
            input,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn image_moves_into_task_and_comes_back() {
        let mut session = CaptureSession::new();
        session.current_image = Some(image());

        let input = session.take_input(Operation::Describe).unwrap();
        assert!(session.current_image.is_none());
        session.begin_task(TaskHandle {
            id: TaskId(7),
            operation: Operation::Describe,
        });

        let applied = session.apply(notification(
            7,
            Operation::Describe,
            TaskOutcome::Completed("a cat".into()),
            Some(input),
        ));
        assert_eq!(applied, Applied::Completed { operation: Operation::Describe });
        assert!(session.current_image.is_some());
        assert_eq!(session.results.description, "a cat");
        assert_eq!(session.active_tab, Some(Operation::Describe));
        assert!(!session.is_busy());
    }

    #[test]
    fn busy_session_refuses_new_work() {
        let mut session = CaptureSession::new();
        session.current_image = Some(image());
        session.begin_task(TaskHandle {
            id: TaskId(1),
            operation: Operation::Ocr,
        });
        assert_eq!(
            session.take_input(Operation::Describe),
            Err(SessionError::Busy("OCR"))
        );
        assert!(matches!(
            session.open_selector(Monitor::whole_screen(10, 10)),
            Err(SessionError::Busy(_))
        ));
    }

    #[test]
    fn text_operations_need_ocr_text() {
        let mut session = CaptureSession::new();
        assert_eq!(
            session.take_input(Operation::Summarize),
            Err(SessionError::NoText("summarize"))
        );
        session.results.ocr = "  hello  ".into();
        assert_eq!(
            session.take_input(Operation::Translate),
            Ok(TaskInput::Text("hello".into()))
        );
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut session = CaptureSession::new();
        session.results.summary = "old".into();
        session.begin_task(TaskHandle {
            id: TaskId(2),
            operation: Operation::Summarize,
        });
        let applied = session.apply(notification(
            2,
            Operation::Summarize,
            TaskOutcome::Failed(ServiceError::RateLimited("slow down".into())),
            Some(TaskInput::Text("x".into())),
        ));
        assert!(matches!(applied, Applied::Failed { .. }));
        assert_eq!(session.results.summary, "old");
        assert!(!session.is_busy());
    }

    #[test]
    fn unknown_task_is_ignored() {
        let mut session = CaptureSession::new();
        session.begin_task(TaskHandle {
            id: TaskId(3),
            operation: Operation::Ocr,
        });
        let applied = session.apply(notification(
            99,
            Operation::Ocr,
            TaskOutcome::Completed("late".into()),
            None,
        ));
        assert_eq!(applied, Applied::Stale);
        assert!(session.is_busy());
        assert_eq!(session.results.ocr, "");
    }

    #[test]
    fn mode_switch_selects_tab() {
        let mut session = CaptureSession::new();
        session.set_mode(Mode::Description);
        assert_eq!(session.mode.default_operation(), Operation::Describe);
        assert_eq!(session.active_tab, Some(Operation::Describe));
    }

    #[test]
    fn second_overlay_is_refused_while_first_is_live() {
        let mut session = CaptureSession::new();
        session.open_selector(Monitor::whole_screen(100, 100)).unwrap();
        assert!(matches!(
            session.open_selector(Monitor::whole_screen(100, 100)),
            Err(SessionError::SelectionOpen)
        ));
        session.selector_mut().unwrap().cancel();
        assert!(session.open_selector(Monitor::whole_screen(100, 100)).is_ok());
    }

    #[test]
    fn capture_arriving_while_busy_is_refused() {
        let mut session = CaptureSession::new();
        session.current_image = Some(CapturedImage::new(RgbaImage::new(10, 10)));
        let first = session.take_input(Operation::Ocr).unwrap();
        session.begin_task(TaskHandle {
            id: TaskId(4),
            operation: Operation::Ocr,
        });

        let second = CapturedImage::new(RgbaImage::new(20, 20));
        assert_eq!(session.store_capture(second), Err(SessionError::Busy("OCR")));
        assert!(session.current_image.is_none());

        session.apply(notification(
            4,
            Operation::Ocr,
            TaskOutcome::Completed("text".into()),
            Some(first),
        ));
        let size = session.current_image.as_ref().map(|i| (i.width(), i.height()));
        assert_eq!(size, Some((10, 10)));

        let third = CapturedImage::new(RgbaImage::new(30, 30));
        assert_eq!(session.store_capture(third), Ok(()));
        let size = session.current_image.as_ref().map(|i| (i.width(), i.height()));
        assert_eq!(size, Some((30, 30)));
    }

    #[tokio::test]
    async fn refused_task_gives_the_image_back() {
        let dispatcher = TaskDispatcher::new(tokio::runtime::Handle::current(), Arc::new(Discard));
        dispatcher.shutdown().await;

        let mut session = CaptureSession::new();
        session.current_image = Some(image());
        let result = session.start_task(&dispatcher, Arc::new(Unused), Operation::Describe, |s| {
            s.take_input(Operation::Describe)
        });

        assert_eq!(result, Err(StartError::Dispatch(DispatchError::ShutDown)));
        assert!(session.current_image.is_some());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn started_task_is_recorded() {
        let dispatcher = TaskDispatcher::new(tokio::runtime::Handle::current(), Arc::new(Discard));
        let mut session = CaptureSession::new();
        session.results.ocr = "hello".into();

        let handle = session
            .start_task(&dispatcher, Arc::new(Unused), Operation::Summarize, |s| {
                s.take_input(Operation::Summarize)
            })
            .unwrap();

        assert_eq!(session.in_flight, Some(handle));
        assert_eq!(handle.operation, Operation::Summarize);
        dispatcher.shutdown().await;
    }

    #[test]
    fn start_task_reports_missing_input() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let dispatcher = TaskDispatcher::new(runtime.handle().clone(), Arc::new(Discard));
        let mut session = CaptureSession::new();

        let result = session.start_task(&dispatcher, Arc::new(Unused), Operation::Ocr, |s| {
            s.take_input(Operation::Ocr)
        });
        assert_eq!(result, Err(StartError::Session(SessionError::NoImage)));
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn release_without_press_closes_the_selector() {
        let mut session = CaptureSession::new();
        session.open_selector(Monitor::whole_screen(100, 100)).unwrap();

        let result = session.finish_selection(Point::new(5, 5));
        assert!(matches!(
            result,
            Err(SessionError::Selection(SelectionError::InvalidTransition(_, _)))
        ));
        assert!(session.selector.is_none());
        assert_eq!(session.finish_selection(Point::new(5, 5)), Err(SessionError::NoSelection));
    }

    #[test]
    fn release_after_drag_returns_rect_and_monitor() {
        let mut session = CaptureSession::new();
        session.open_selector(Monitor::whole_screen(100, 100)).unwrap();
        session.selector_mut().unwrap().pointer_down(Point::new(10, 10)).unwrap();

        let (outcome, monitor) = session.finish_selection(Point::new(40, 30)).unwrap();
        assert_eq!(outcome, SelectionOutcome::Selected(SelectionRect::new(10, 10, 30, 20)));
        assert_eq!(monitor.width, 100);
        assert!(session.selector.is_none());
    }
}
