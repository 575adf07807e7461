//! Task dispatcher. Runs one service call off the interactive thread and
//! reports back exactly once.
//!
//! Every submitted task ends in exactly one `TerminalNotification` handed to
//! the `CompletionSink`, unless the dispatcher is shut down first, in which
//! case it ends in none. The sink decides which thread the notification
//! lands on; the Tauri shell marshals it onto the main thread.
//!
//! One task at a time is the caller's contract (the shell disables its
//! triggers while busy). Nothing here locks around the service call.

use crate::services::{Operation, ServiceError, TaskInput, TextService};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pending unit of work. Consumed by `submit`, never reused.
#[derive(Debug)]
pub struct ProcessingTask {
    pub operation: Operation,
    pub input: TaskInput,
}

impl ProcessingTask {
    pub fn new(operation: Operation, input: TaskInput) -> Self {
        Self { operation, input }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(String),
    Failed(ServiceError),
}

/// The single message that ends a task's lifecycle.
#[derive(Debug)]
pub struct TerminalNotification {
    pub id: TaskId,
    pub operation: Operation,
    pub outcome: TaskOutcome,
    /// The task's input, handed back to the consumer. `None` only if the
    /// service call panicked and took the input with it.
    pub input: Option<TaskInput>,
    pub elapsed_ms: u128,
}

pub trait CompletionSink: Send + Sync + 'static {
    fn deliver(&self, notification: TerminalNotification);
}

/// Returned by `submit`; identifies the task in the eventual notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub operation: Operation,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatcher has been shut down")]
    ShutDown,
}

/// A task `submit` refused, handed back so its input is not lost.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Rejected {
    pub error: DispatchError,
    pub task: ProcessingTask,
}

pub struct TaskDispatcher {
    runtime: Handle,
    sink: Arc<dyn CompletionSink>,
    next_id: AtomicU64,
    stop: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskDispatcher {
    pub fn new(runtime: Handle, sink: Arc<dyn CompletionSink>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            runtime,
            sink,
            next_id: AtomicU64::new(1),
            stop,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Start `task` on a worker. Returns immediately.
    pub fn submit<S: TextService>(
        &self,
        service: Arc<S>,
        task: ProcessingTask,
    ) -> Result<TaskHandle, Rejected> {
        if *self.stop.borrow() {
            return Err(Rejected {
                error: DispatchError::ShutDown,
                task,
            });
        }

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let ProcessingTask { operation, input } = task;
        let sink = Arc::clone(&self.sink);
        let stop_rx = self.stop.subscribe();
        log::info!(
            "[DISPATCH] Task {} submitted: {} on {} input",
            id,
            operation.label(),
            input.kind()
        );

        let call = self.runtime.spawn(async move {
            let result = service.run(operation, &input).await;
            (input, result)
        });

        let worker = self.runtime.spawn(async move {
            let start = std::time::Instant::now();
            let abort = call.abort_handle();

            let joined = tokio::select! {
                biased;
                _ = stopped(stop_rx) => {
                    abort.abort();
                    log::info!("[DISPATCH] Task {} stopped before completion", id);
                    return;
                }
                joined = call => joined,
            };

            let (outcome, input) = match joined {
                Ok((input, Ok(text))) => (TaskOutcome::Completed(text), Some(input)),
                Ok((input, Err(e))) => (TaskOutcome::Failed(e), Some(input)),
                Err(e) => (
                    TaskOutcome::Failed(ServiceError::Aborted(e.to_string())),
                    None,
                ),
            };
            let elapsed_ms = start.elapsed().as_millis();
            match &outcome {
                TaskOutcome::Completed(text) => log::info!(
                    "[DISPATCH] Task {} completed: {} chars in {}ms",
                    id,
                    text.chars().count(),
                    elapsed_ms
                ),
                TaskOutcome::Failed(e) => {
                    log::warn!("[DISPATCH] Task {} failed in {}ms: {}", id, elapsed_ms, e)
                }
            }

            sink.deliver(TerminalNotification {
                id,
                operation,
                outcome,
                input,
                elapsed_ms,
            });
        });

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        workers.retain(|w| !w.is_finished());
        workers.push(worker);

        Ok(TaskHandle { id, operation })
    }

    /// Number of tasks that have not delivered (or been stopped) yet.
    pub fn in_flight(&self) -> usize {
        let workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        workers.iter().filter(|w| !w.is_finished()).count()
    }

    /// Signal every in-flight task to stop and wait until each has
    /// acknowledged. No notification is delivered after this returns.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        let count = workers.len();
        for worker in workers {
            let _ = worker.await;
        }
        log::info!("[DISPATCH] Shut down ({} worker(s) acknowledged)", count);
    }
}

/// Resolves once the stop flag is raised (or its sender is gone).
async fn stopped(mut rx: watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
