//! Area selector: the rubber-band state machine behind the overlay window.
//!
//! The overlay webview only forwards pointer and key events; every decision
//! (anchor, normalization, clamping, cancellation) is made here so the same
//! rules apply whichever monitor the overlay was opened on.
//!
//! ```text
//!   Idle --activate--> Armed --down--> Dragging --up--> Completed
//!     \                  \               \  ^ move
//!      `-----------------`---------------`--cancel--> Cancelled
//! ```

pub mod render;

use crate::geometry::{Point, SelectionRect};
use crate::monitor::Monitor;
pub use render::{OverlayFrame, BORDER_WIDTH, DIM_ALPHA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Idle,
    Armed,
    Dragging { anchor: Point, current: Point },
    Completed(SelectionRect),
    Cancelled,
}

impl SelectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SelectorState::Completed(_) | SelectorState::Cancelled)
    }
}

/// What the caller gets back once the selector reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected(SelectionRect),
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Selector is {0}, cannot {1}")]
    InvalidTransition(&'static str, &'static str),
}

/// One selection attempt on one monitor. Never reused after a terminal state.
#[derive(Debug)]
pub struct AreaSelector {
    monitor: Monitor,
    state: SelectorState,
    generation: u64,
}

impl AreaSelector {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor,
            state: SelectorState::Idle,
            generation: 0,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Overlay is visible and waiting for the first press.
    pub fn activate(&mut self) -> Result<(), SelectionError> {
        match self.state {
            SelectorState::Idle => {
                self.state = SelectorState::Armed;
                log::info!(
                    "[SELECT] Armed on monitor #{} ({}x{})",
                    self.monitor.index, self.monitor.width, self.monitor.height
                );
                Ok(())
            }
            other => Err(SelectionError::InvalidTransition(state_name(&other), "activate")),
        }
    }

    /// Records the anchor. Returns the first frame (an empty selection).
    pub fn pointer_down(&mut self, at: Point) -> Result<OverlayFrame, SelectionError> {
        match self.state {
            SelectorState::Armed => {
                let anchor = self.clamp(at);
                self.state = SelectorState::Dragging {
                    anchor,
                    current: anchor,
                };
                Ok(self.next_frame(SelectionRect::from_corners(anchor, anchor)))
            }
            other => Err(SelectionError::InvalidTransition(
                state_name(&other),
                "start a drag",
            )),
        }
    }

    /// Updates the rectangle and returns the frame to paint.
    ///
    /// Moves outside a drag (hover while Armed, stray events after a terminal
    /// state) produce no frame.
    pub fn pointer_move(&mut self, to: Point) -> Option<OverlayFrame> {
        let SelectorState::Dragging { anchor, .. } = self.state else {
            return None;
        };
        let current = self.clamp(to);
        self.state = SelectorState::Dragging { anchor, current };
        Some(self.next_frame(SelectionRect::from_corners(anchor, current)))
    }

    /// Finalizes the drag. The result may be zero-sized; see `SelectionRect::is_empty`.
    pub fn pointer_up(&mut self, at: Point) -> Result<SelectionOutcome, SelectionError> {
        match self.state {
            SelectorState::Dragging { anchor, .. } => {
                let rect = SelectionRect::from_corners(anchor, self.clamp(at));
                self.state = SelectorState::Completed(rect);
                log::info!(
                    "[SELECT] Completed: {}x{} at ({},{}) after {} frame(s)",
                    rect.width, rect.height, rect.x, rect.y, self.generation
                );
                Ok(SelectionOutcome::Selected(rect))
            }
            SelectorState::Cancelled => Ok(SelectionOutcome::Cancelled),
            other => Err(SelectionError::InvalidTransition(
                state_name(&other),
                "finish a drag",
            )),
        }
    }

    /// Escape. Effective immediately from any non-completed state.
    pub fn cancel(&mut self) -> SelectionOutcome {
        match self.state {
            SelectorState::Completed(rect) => SelectionOutcome::Selected(rect),
            _ => {
                if self.state != SelectorState::Cancelled {
                    log::info!("[SELECT] Cancelled from {}", state_name(&self.state));
                }
                self.state = SelectorState::Cancelled;
                SelectionOutcome::Cancelled
            }
        }
    }

    /// Terminal outcome, if any.
    pub fn outcome(&self) -> Option<SelectionOutcome> {
        match self.state {
            SelectorState::Completed(rect) => Some(SelectionOutcome::Selected(rect)),
            SelectorState::Cancelled => Some(SelectionOutcome::Cancelled),
            _ => None,
        }
    }

    fn clamp(&self, p: Point) -> Point {
        p.clamp_to(self.monitor.width, self.monitor.height)
    }

    fn next_frame(&mut self, selection: SelectionRect) -> OverlayFrame {
        self.generation += 1;
        OverlayFrame::new(
            self.generation,
            self.monitor.width,
            self.monitor.height,
            selection,
        )
    }
}

fn state_name(state: &SelectorState) -> &'static str {
    match state {
        SelectorState::Idle => "idle",
        SelectorState::Armed => "armed",
        SelectorState::Dragging { .. } => "dragging",
        SelectorState::Completed(_) => "completed",
        SelectorState::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> AreaSelector {
        let mut selector = AreaSelector::new(Monitor::whole_screen(1920, 1080));
        selector.activate().unwrap();
        selector
    }

    fn drag(points: &[(i32, i32)]) -> SelectionOutcome {
        let mut selector = armed();
        let (first, rest) = points.split_first().unwrap();
        let (last, moves) = rest.split_last().unwrap();
        selector.pointer_down(Point::new(first.0, first.1)).unwrap();
        for (x, y) in moves {
            selector.pointer_move(Point::new(*x, *y));
        }
        selector.pointer_up(Point::new(last.0, last.1)).unwrap()
    }

    #[test]
    fn direction_does_not_change_the_result() {
        let down_right = drag(&[(100, 100), (150, 160), (300, 250)]);
        let up_left = drag(&[(300, 250), (200, 120), (100, 100)]);
        let expected = SelectionOutcome::Selected(SelectionRect::new(100, 100, 200, 150));
        assert_eq!(down_right, expected);
        assert_eq!(up_left, expected);
    }

    #[test]
    fn intermediate_moves_do_not_leak_into_result() {
        let outcome = drag(&[(10, 10), (1900, 1000), (0, 0), (40, 30)]);
        assert_eq!(
            outcome,
            SelectionOutcome::Selected(SelectionRect::new(10, 10, 30, 20))
        );
    }

    #[test]
    fn click_without_drag_is_zero_sized() {
        let outcome = drag(&[(400, 300), (400, 300)]);
        match outcome {
            SelectionOutcome::Selected(rect) => assert!(rect.is_empty()),
            other => panic!("expected a selection, got {:?}", other),
        }
    }

    #[test]
    fn cancel_while_armed() {
        let mut selector = armed();
        assert_eq!(selector.cancel(), SelectionOutcome::Cancelled);
        assert!(selector.pointer_down(Point::new(1, 1)).is_err());
        assert_eq!(selector.outcome(), Some(SelectionOutcome::Cancelled));
    }

    #[test]
    fn cancel_while_dragging_wins_over_release() {
        let mut selector = armed();
        selector.pointer_down(Point::new(10, 10)).unwrap();
        selector.pointer_move(Point::new(200, 200));
        assert_eq!(selector.cancel(), SelectionOutcome::Cancelled);
        assert_eq!(selector.pointer_move(Point::new(300, 300)), None);
        assert_eq!(
            selector.pointer_up(Point::new(300, 300)),
            Ok(SelectionOutcome::Cancelled)
        );
    }

    #[test]
    fn cancel_before_activation() {
        let mut selector = AreaSelector::new(Monitor::whole_screen(800, 600));
        assert_eq!(selector.cancel(), SelectionOutcome::Cancelled);
        assert!(selector.activate().is_err());
    }

    #[test]
    fn cancel_after_completion_keeps_rectangle() {
        let mut selector = armed();
        selector.pointer_down(Point::new(0, 0)).unwrap();
        selector.pointer_up(Point::new(10, 10)).unwrap();
        assert_eq!(
            selector.cancel(),
            SelectionOutcome::Selected(SelectionRect::new(0, 0, 10, 10))
        );
    }

    #[test]
    fn release_without_press_is_rejected() {
        let mut selector = armed();
        assert!(selector.pointer_up(Point::new(5, 5)).is_err());
        assert_eq!(selector.state(), SelectorState::Armed);
    }

    #[test]
    fn hover_before_press_draws_nothing() {
        let mut selector = armed();
        assert_eq!(selector.pointer_move(Point::new(50, 50)), None);
    }

    #[test]
    fn frames_are_strictly_ordered() {
        let mut selector = armed();
        let first = selector.pointer_down(Point::new(0, 0)).unwrap();
        let mut last = first.generation;
        for i in 1..20 {
            let frame = selector.pointer_move(Point::new(i * 10, i * 5)).unwrap();
            assert!(frame.generation > last);
            last = frame.generation;
        }
    }

    #[test]
    fn pointer_is_clamped_to_the_monitor() {
        let mut selector = armed();
        selector.pointer_down(Point::new(1800, 1000)).unwrap();
        let outcome = selector.pointer_up(Point::new(5000, 5000)).unwrap();
        assert_eq!(
            outcome,
            SelectionOutcome::Selected(SelectionRect::new(1800, 1000, 120, 80))
        );
    }
}
