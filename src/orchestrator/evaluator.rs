//! Depth-first evaluation of one expression tree through the task queue.
//!
//! For each operator node the left subtree is fully resolved, then the right
//! one, and only then is the node's own task dispatched. Siblings are never
//! in flight at the same time.

use async_recursion::async_recursion;
use tokio_util::sync::CancellationToken;

use crate::expr::{ExpressionNode, Operator};
use crate::task::{Task, TaskId};

use super::Inner;

#[derive(Debug, thiserror::Error)]
pub(super) enum EvalError {
    #[error("evaluation cancelled")]
    Cancelled,

    #[error("task queue closed before task {0} could be queued")]
    QueueClosed(TaskId),

    #[error("result slot for task {0} dropped without a value")]
    ResultDropped(TaskId),
}

pub(super) struct Evaluation<'a> {
    pub inner: &'a Inner,
    pub expression_id: &'a str,
    pub cancel: &'a CancellationToken,
}

impl<'a> Evaluation<'a> {
    #[async_recursion]
    pub async fn resolve(&self, node: &ExpressionNode) -> Result<f64, EvalError> {
        match node {
            ExpressionNode::Literal(value) => Ok(*value),
            ExpressionNode::Binary { op, left, right } => {
                let lhs = self.resolve(left).await?;
                let rhs = self.resolve(right).await?;
                self.dispatch(*op, lhs, rhs).await
            }
        }
    }

    /// Emit one task and wait for its result.
    async fn dispatch(&self, op: Operator, arg1: f64, arg2: f64) -> Result<f64, EvalError> {
        let task = {
            let mut state = self.inner.state.lock().await;
            state.next_task_id += 1;
            let task = Task {
                id: state.next_task_id,
                arg1,
                arg2,
                operation: op,
                operation_time: self.inner.operation_times.for_operator(op),
            };
            if let Some(record) = state.expressions.get_mut(self.expression_id) {
                record.tasks.push(task.clone());
            }
            task
        };
        let task_id = task.id;

        let waiter = self.inner.results.register(task_id).await;

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.inner.results.forget(task_id).await;
                return Err(EvalError::Cancelled);
            }
            pushed = self.inner.queue.push(task) => {
                if pushed.is_err() {
                    self.inner.results.forget(task_id).await;
                    return Err(EvalError::QueueClosed(task_id));
                }
            }
        }
        tracing::debug!(
            expression_id = self.expression_id,
            task_id,
            "Queued task {} {} {}",
            arg1,
            op,
            arg2
        );

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.inner.results.forget(task_id).await;
                Err(EvalError::Cancelled)
            }
            received = waiter => received.map_err(|_| EvalError::ResultDropped(task_id)),
        }
    }
}
