//! Hand-off of worker results to the evaluator waiting for them.
//!
//! An evaluator registers a one-shot slot for its task id before the task is
//! queued, so a result can never arrive ahead of its slot. Each slot is consumed
//! at most once.

use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};

use crate::task::TaskId;

/// Outcome of delivering a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultDelivery {
    /// A waiting evaluator received the value.
    Delivered,
    /// Nobody was waiting: unknown id, already consumed, or evaluation cancelled.
    Unclaimed,
}

/// Pending result slots keyed by task id.
#[derive(Debug, Default)]
pub struct ResultHub {
    pending: Mutex<HashMap<TaskId, oneshot::Sender<f64>>>,
}

impl ResultHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task whose result someone will wait for.
    pub async fn register(&self, task_id: TaskId) -> oneshot::Receiver<f64> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().await;
        pending.insert(task_id, tx);
        rx
    }

    /// Resolve a pending task by id.
    pub async fn resolve(&self, task_id: TaskId, value: f64) -> ResultDelivery {
        let Some(tx) = self.pending.lock().await.remove(&task_id) else {
            return ResultDelivery::Unclaimed;
        };
        match tx.send(value) {
            Ok(()) => ResultDelivery::Delivered,
            Err(_) => ResultDelivery::Unclaimed,
        }
    }

    /// Drop a slot whose waiter has gone away.
    pub async fn forget(&self, task_id: TaskId) {
        self.pending.lock().await.remove(&task_id);
    }

    /// Number of registered, unresolved slots.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
