//! Strictly sequential command queue.
//!
//! Tasks run one at a time in submission order on a single worker task. A
//! task does not start until the previous one has settled, whether it
//! succeeded, failed, or panicked.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = BoxFuture<'static, ()>;

/// Why a task produced no result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Command queue is closed")]
    Closed,

    #[error("Queued task panicked: {0}")]
    Panicked(String),
}

/// Handle to a submitted task's outcome.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task to settle.
    pub async fn join(self) -> Result<T, QueueError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::Closed),
        }
    }
}

/// Single-worker FIFO queue.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl CommandQueue {
    /// Create a queue and spawn its worker on the current runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
            debug!("Command queue worker stopped");
        });

        Self { tx }
    }

    /// Enqueue a task.
    ///
    /// The handle resolves with the task's own output, `Panicked` if it
    /// panicked, or `Closed` if the worker is gone.
    pub fn submit<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, rx) = oneshot::channel();

        let job = async move {
            let outcome = AssertUnwindSafe(task).catch_unwind().await.map_err(|payload| {
                let message = panic_message(payload.as_ref());
                error!(message = %message, "Queued task panicked");
                QueueError::Panicked(message)
            });
            // The submitter may have stopped waiting.
            let _ = result_tx.send(outcome);
        }
        .boxed();

        if self.tx.send(job).is_err() {
            debug!("Submit after command queue worker stopped");
        }

        TaskHandle { rx }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
