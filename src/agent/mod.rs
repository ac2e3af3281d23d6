//! Agent: a pool of workers that claim, compute and report tasks.
//!
//! Workers reach the orchestrator through [`TaskSource`]: over HTTP with
//! [`OrchestratorClient`], or directly when the pool runs inside the
//! orchestrator process.

mod client;
pub mod error;
mod worker;

pub use client::OrchestratorClient;
pub use error::{AgentError, AgentErrorKind, Backoff};
pub use worker::{WorkerPool, WorkerReport};

use async_trait::async_trait;

use crate::orchestrator::Orchestrator;
use crate::task::{Task, TaskResult};

/// Where workers get tasks from and send results to.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Claim one task. `Ok(None)` means the queue is currently empty.
    async fn fetch_task(&self) -> Result<Option<Task>, AgentError>;

    /// Report a computed result.
    async fn report_result(&self, result: TaskResult) -> Result<(), AgentError>;
}

#[async_trait]
impl TaskSource for Orchestrator {
    async fn fetch_task(&self) -> Result<Option<Task>, AgentError> {
        Ok(self.next_task().await)
    }

    async fn report_result(&self, result: TaskResult) -> Result<(), AgentError> {
        self.submit_result(result.id, result.result).await;
        Ok(())
    }
}
