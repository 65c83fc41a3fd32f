//! One-shot completion channel created per request.
//!
//! The [`Resolver`] is the single producer and is consumed by `resolve`, so a
//! request can be resolved at most once. The [`Pending`] half exists before any
//! storage call is issued, so no result can be lost.
//!
//! Work handed to [`Resolver::resolve_with`] runs as its own task. When the
//! waiter gives up at the deadline that task is aborted, so a storage call that
//! has not yet completed is dropped instead of committing behind a 504. A call
//! the backend already accepted before the abort is not rolled back.

use crate::error::AppError;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Final result of a request: a document (or list) or an error.
pub type Outcome = Result<Value, AppError>;

/// Task driving the request's work, once one has been spawned.
type TaskSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

pub fn channel() -> (Resolver, Pending) {
    let (tx, rx) = oneshot::channel();
    let task = TaskSlot::default();
    (
        Resolver {
            tx,
            task: task.clone(),
        },
        Pending { rx, task },
    )
}

#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<Outcome>,
    task: TaskSlot,
}

impl Resolver {
    pub fn resolve(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            tracing::debug!("request went away before resolution");
        }
    }

    pub fn succeed(self, doc: Value) {
        self.resolve(Ok(doc))
    }

    pub fn fail(self, err: AppError) {
        self.resolve(Err(err))
    }

    /// Drives `work` on the runtime and resolves with its output.
    /// The task is aborted if the waiting side times out first.
    pub fn resolve_with<F>(self, work: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let slot = self.task.clone();
        let handle = tokio::spawn(async move {
            let outcome = work.await;
            self.resolve(outcome);
        });
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(handle);
        };
    }
}

#[derive(Debug)]
pub struct Pending {
    rx: oneshot::Receiver<Outcome>,
    task: TaskSlot,
}

impl Pending {
    /// Waits for the resolution. `Timeout` after `timeout`; `Abandoned` if the resolver was dropped.
    pub async fn wait(mut self, timeout: Duration) -> Outcome {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(AppError::Abandoned),
            Err(_) => self.cancel(timeout).await,
        }
    }

    /// Aborts the spawned work and waits for it to stop. An outcome sent before
    /// the abort took effect wins over the timeout.
    async fn cancel(mut self, timeout: Duration) -> Outcome {
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        match self.rx.try_recv() {
            Ok(outcome) => {
                tracing::debug!(?timeout, "request resolved while being cancelled");
                outcome
            }
            Err(_) => {
                tracing::warn!(?timeout, "request timed out, work cancelled");
                Err(AppError::Timeout(timeout))
            }
        }
    }
}
