//! Jobs queued on the worker pool and the handles callers wait on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use blockwork_core::{EngineError, ExecutionContext, TaskError};

/// Work a worker runs against its context. Exactly one of `run` or
/// `abandon` is called, and either one reports an outcome.
pub(crate) trait Job: Send {
    fn run(self: Box<Self>, ctx: &mut dyn ExecutionContext);
    fn abandon(self: Box<Self>, error: TaskError);
}

/// A closure job. Panics inside the closure become
/// [`TaskError::Panicked`]; engine errors become [`TaskError::Execution`].
pub(crate) struct FnJob<F, T> {
    f: F,
    reply: Sender<Result<T, TaskError>>,
}

impl<F, T> FnJob<F, T> {
    pub(crate) fn new(f: F, reply: Sender<Result<T, TaskError>>) -> Self {
        Self { f, reply }
    }
}

impl<F, T> Job for FnJob<F, T>
where
    F: FnOnce(&mut dyn ExecutionContext) -> Result<T, EngineError> + Send,
    T: Send,
{
    fn run(self: Box<Self>, ctx: &mut dyn ExecutionContext) {
        let Self { f, reply } = *self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| f(ctx))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TaskError::Execution(e)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(%message, "task panicked");
                Err(TaskError::Panicked { message })
            }
        };
        // The caller may have stopped waiting.
        let _ = reply.send(outcome);
    }

    fn abandon(self: Box<Self>, error: TaskError) {
        let _ = self.reply.send(Err(error));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Completion of a submitted job.
///
/// Dropping the handle does not cancel the job.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn channel() -> (Sender<Result<T, TaskError>>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, Self { rx })
    }

    /// Block until the job finishes.
    pub fn wait(self) -> Result<T, TaskError> {
        self.rx.recv().unwrap_or(Err(TaskError::Disconnected))
    }

    /// Block for at most `timeout`. On [`TaskError::Timeout`] the job keeps
    /// running and the handle can be waited on again.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, TaskError> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout { after: timeout }),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Disconnected),
        }
    }

    /// The outcome, if the job has already finished.
    pub fn try_result(&self) -> Option<Result<T, TaskError>> {
        self.rx.try_recv().ok()
    }
}
