//! Single-flight background task runner.
//!
//! Work runs on a dedicated `kmcx-worker` thread. Progress and the final
//! [`TaskResult`] travel back over channels and are delivered to the
//! caller's callbacks only from [`TaskExecutor::pump`] or
//! [`TaskExecutor::wait`], i.e. on the interactive thread.

mod error;

pub use error::{ExecutorError, Result};

use kmcx_core::task::{FatalError, Progress, TaskContext, TaskResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WORKER_THREAD_NAME: &str = "kmcx-worker";
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskTicket(u64);

impl TaskTicket {
    pub fn id(self) -> u64 {
        self.0
    }
}

type ProgressCallback<C> = Box<dyn FnMut(&mut C, &Progress)>;
type CompletionCallback<C, T> = Box<dyn FnOnce(&mut C, TaskResult<T>)>;

struct Running<C, T> {
    ticket: TaskTicket,
    cancel: CancellationToken,
    progress_rx: Receiver<Progress>,
    done_rx: Receiver<TaskResult<T>>,
    handle: Option<JoinHandle<()>>,
    on_progress: ProgressCallback<C>,
    on_complete: CompletionCallback<C, T>,
}

impl<C, T> Running<C, T> {
    fn drain_progress(&mut self, ctx: &mut C) {
        while let Ok(update) = self.progress_rx.try_recv() {
            (self.on_progress)(ctx, &update);
        }
    }
}

/// Runs at most one task at a time. `C` is the caller-side state handed to
/// the callbacks; `T` is the task's success payload.
pub struct TaskExecutor<C, T> {
    running: Option<Running<C, T>>,
    next_ticket: u64,
}

impl<C, T> Default for TaskExecutor<C, T> {
    fn default() -> Self {
        Self {
            running: None,
            next_ticket: 1,
        }
    }
}

impl<C, T> std::fmt::Debug for TaskExecutor<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("running", &self.running.as_ref().map(|r| r.ticket))
            .finish()
    }
}

impl<C, T: Send + 'static> TaskExecutor<C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    pub fn current(&self) -> Option<TaskTicket> {
        self.running.as_ref().map(|r| r.ticket)
    }

    /// Starts `work` on the worker thread. Fails with
    /// [`ExecutorError::Busy`] while another task is unfinished.
    pub fn run<W, P, F>(&mut self, work: W, on_progress: P, on_complete: F) -> Result<TaskTicket>
    where
        W: FnOnce(&TaskContext) -> TaskResult<T> + Send + 'static,
        P: FnMut(&mut C, &Progress) + 'static,
        F: FnOnce(&mut C, TaskResult<T>) + 'static,
    {
        if let Some(running) = &self.running {
            return Err(ExecutorError::Busy {
                running: running.ticket.id(),
            });
        }

        let ticket = TaskTicket(self.next_ticket);
        self.next_ticket += 1;

        let cancel = CancellationToken::new();
        let (progress_tx, progress_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let ctx = TaskContext::new(cancel.clone(), progress_tx);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                tracing::debug!("Task #{} started", ticket.id());
                let result = match panic::catch_unwind(AssertUnwindSafe(|| work(&ctx))) {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!("Task #{} panicked: {}", ticket.id(), message);
                        TaskResult::Fatal(FatalError::new("Background task panicked", message))
                    }
                };
                drop(ctx);
                let _ = done_tx.send(result);
            })
            .map_err(ExecutorError::Spawn)?;

        self.running = Some(Running {
            ticket,
            cancel,
            progress_rx,
            done_rx,
            handle: Some(handle),
            on_progress: Box::new(on_progress),
            on_complete: Box::new(on_complete),
        });
        Ok(ticket)
    }

    /// Delivers pending progress and, if the task finished, its result.
    /// Returns true when the completion callback ran.
    pub fn pump(&mut self, ctx: &mut C) -> bool {
        let Some(running) = self.running.as_mut() else {
            return false;
        };
        running.drain_progress(ctx);

        let result = match running.done_rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => TaskResult::Fatal(FatalError::new(
                "Background task",
                "worker exited without reporting a result",
            )),
        };
        self.finish(ctx, result);
        true
    }

    /// Blocks until the running task completes, delivering progress as it
    /// arrives. Returns immediately when idle.
    pub fn wait(&mut self, ctx: &mut C) {
        while let Some(running) = self.running.as_mut() {
            match running.progress_rx.recv_timeout(WAIT_POLL_INTERVAL) {
                Ok(update) => (running.on_progress)(ctx, &update),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
            if self.pump(ctx) {
                break;
            }
        }
    }

    /// Asks the running task to stop at its next cancellation check.
    pub fn cancel(&self) -> bool {
        match &self.running {
            Some(running) => {
                tracing::info!("Cancellation requested for task #{}", running.ticket.id());
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn finish(&mut self, ctx: &mut C, result: TaskResult<T>) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        running.drain_progress(ctx);
        if let Some(handle) = running.handle.take() {
            let _ = handle.join();
        }
        tracing::debug!("Task #{} completed", running.ticket.id());
        (running.on_complete)(ctx, result);
    }
}

impl<C, T> Drop for TaskExecutor<C, T> {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
