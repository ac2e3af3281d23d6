//! Worker pool.
//!
//! Each worker runs its own loop and shares nothing with its siblings except
//! the in-flight semaphore:
//! 1. take an in-flight permit
//! 2. claim a task; if the queue is empty, wait the poll interval and retry
//! 3. compute it, sleep for the task's simulated duration, report the result
//!
//! Transient failures back off exponentially instead of hot-spinning. A task
//! whose result cannot be reported is lost; the orchestrator does not re-queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::Backoff;
use super::TaskSource;
use crate::config::AgentConfig;
use crate::task::{Task, TaskResult};

/// Attempts made to report one result before giving up on it.
const MAX_REPORT_ATTEMPTS: u32 = 3;

/// What a worker did before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Tasks computed and successfully reported
    pub processed: u64,
}

/// A fixed-size pool of polling workers.
pub struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl WorkerPool {
    /// Spawn `config.computing_power` workers against `source`.
    pub fn start(config: AgentConfig, source: Arc<dyn TaskSource>) -> Self {
        let cancel = CancellationToken::new();
        let inflight = Arc::new(Semaphore::new(config.max_inflight.max(1)));
        let size = config.computing_power.max(1);

        let handles = (0..size)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    source: Arc::clone(&source),
                    inflight: Arc::clone(&inflight),
                    cancel: cancel.child_token(),
                    poll_interval: config.poll_interval,
                    max_backoff: config.max_backoff,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            "Worker pool started: {} workers, {} in-flight slots",
            size,
            config.max_inflight.max(1)
        );
        Self { cancel, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop every worker and collect their reports.
    pub async fn shutdown(self) -> Vec<WorkerReport> {
        self.cancel.cancel();
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Worker task failed: {}", e),
            }
        }
        info!("Worker pool stopped");
        reports
    }
}

struct Worker {
    id: usize,
    source: Arc<dyn TaskSource>,
    inflight: Arc<Semaphore>,
    cancel: CancellationToken,
    poll_interval: Duration,
    max_backoff: Duration,
}

impl Worker {
    async fn run(self) -> WorkerReport {
        let mut processed = 0;
        let mut backoff = Backoff::new(self.poll_interval, self.max_backoff);
        debug!(worker_id = self.id, "Worker started");

        loop {
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&self.inflight).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => break,
                fetched = self.source.fetch_task() => fetched,
            };

            let delay = match fetched {
                Ok(Some(task)) => {
                    backoff.reset();
                    if self.process(task).await {
                        processed += 1;
                    }
                    drop(permit);
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    continue;
                }
                Ok(None) => {
                    backoff.reset();
                    self.poll_interval
                }
                Err(e) if e.is_transient() => {
                    let delay = backoff.next_delay();
                    warn!(
                        worker_id = self.id,
                        "Orchestrator unavailable ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    delay
                }
                Err(e) => {
                    warn!(worker_id = self.id, "Failed to claim task: {}", e);
                    self.poll_interval
                }
            };
            drop(permit);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!(worker_id = self.id, processed, "Worker stopped");
        WorkerReport {
            worker_id: self.id,
            processed,
        }
    }

    /// Compute and report one task. Returns whether the result was reported.
    async fn process(&self, task: Task) -> bool {
        debug!(
            worker_id = self.id,
            task_id = task.id,
            "Computing {} {} {} ({} ms)",
            task.arg1,
            task.operation,
            task.arg2,
            task.operation_time
        );
        let result = TaskResult {
            id: task.id,
            result: task.compute(),
        };

        tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!(worker_id = self.id, task_id = task.id, "Stopped mid-task, result lost");
                return false;
            }
            _ = tokio::time::sleep(task.simulated_duration()) => {}
        }

        let mut backoff = Backoff::new(self.poll_interval, self.max_backoff);
        for attempt in 1..=MAX_REPORT_ATTEMPTS {
            match self.source.report_result(result).await {
                Ok(()) => {
                    debug!(worker_id = self.id, task_id = task.id, "Reported {}", result.result);
                    return true;
                }
                Err(e) if e.is_transient() && attempt < MAX_REPORT_ATTEMPTS => {
                    let delay = backoff.next_delay();
                    warn!(
                        worker_id = self.id,
                        task_id = task.id,
                        "Report attempt {} failed ({}), retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        worker_id = self.id,
                        task_id = task.id,
                        "Dropping result after {} attempts: {}",
                        attempt,
                        e
                    );
                    return false;
                }
            }
        }
        false
    }
}
