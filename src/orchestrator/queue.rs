//! Bounded FIFO of tasks waiting for a worker.
//!
//! Producers (evaluators) wait for a free slot when the queue is full; this is
//! the only backpressure in the system. Consumers never wait: an empty queue is
//! reported as `None`.

use tokio::sync::{mpsc, Mutex};

use crate::task::Task;

#[derive(Debug, thiserror::Error)]
#[error("Task queue is closed")]
pub struct QueueClosed;

#[derive(Debug)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    rx: Mutex<mpsc::Receiver<Task>>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Append a task, waiting for a free slot if the queue is full.
    pub async fn push(&self, task: Task) -> Result<(), QueueClosed> {
        self.tx.send(task).await.map_err(|_| QueueClosed)
    }

    /// Pop the oldest task without waiting for one to arrive.
    pub async fn try_pop(&self) -> Option<Task> {
        self.rx.lock().await.try_recv().ok()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
