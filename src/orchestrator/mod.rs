//! Orchestrator core: expression registry, task dispatch and result rendezvous.
//!
//! ## Task Flow
//! 1. `submit` parses the text, registers a `pending` expression and spawns
//!    its evaluation
//! 2. The evaluation walks the tree depth-first and queues one task per
//!    operator node, waiting for each result before moving on
//! 3. Workers pull tasks with `next_task` and report with `submit_result`
//! 4. When the root resolves, the expression becomes `completed`
//!
//! Evaluations are supervised: each gets a child of the orchestrator's
//! cancellation token and runs on a `TaskTracker`, so `cancel` and `shutdown`
//! can stop them.

mod evaluator;
mod expression;
mod queue;
mod rendezvous;

pub use expression::{ExpressionStatus, ExpressionView};
pub use queue::{QueueClosed, TaskQueue};
pub use rendezvous::{ResultDelivery, ResultHub};

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, OperationTimes};
use crate::expr::{self, ExpressionNode, ParseError};
use crate::task::{Task, TaskId};

use evaluator::{EvalError, Evaluation};
use expression::ExpressionRecord;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(#[from] ParseError),

    #[error("Expression not found: {0}")]
    NotFound(String),

    #[error("Expression {id} already finished ({status:?})")]
    AlreadyFinished {
        id: String,
        status: ExpressionStatus,
    },
}

/// State guarded by the registry lock.
#[derive(Debug, Default)]
struct Registry {
    expressions: HashMap<String, ExpressionRecord>,
    next_task_id: TaskId,
    next_seq: u64,
}

pub(crate) struct Inner {
    operation_times: OperationTimes,
    queue: TaskQueue,
    results: ResultHub,
    state: Mutex<Registry>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// Handle to the orchestrator. Clones share the same state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(operation_times: OperationTimes, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                operation_times,
                queue: TaskQueue::new(queue_capacity),
                results: ResultHub::new(),
                state: Mutex::new(Registry::default()),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.operation_times, config.queue_capacity)
    }

    /// Register an expression and start evaluating it in the background.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::InvalidExpression` if the text does not parse;
    /// nothing is registered in that case.
    pub async fn submit(&self, text: &str) -> Result<String, OrchestratorError> {
        let tree = Arc::new(expr::parse(text)?);
        let id = Uuid::new_v4().to_string();
        let cancel = self.inner.shutdown.child_token();

        {
            let mut state = self.inner.state.lock().await;
            state.next_seq += 1;
            let seq = state.next_seq;
            state.expressions.insert(
                id.clone(),
                ExpressionRecord::new(id.clone(), seq, Arc::clone(&tree), cancel.clone()),
            );
        }
        info!(
            expression_id = %id,
            operators = tree.operator_count(),
            "Accepted expression {:?}",
            text
        );

        let this = self.clone();
        let expression_id = id.clone();
        self.inner.tracker.spawn(async move {
            this.run_evaluation(expression_id, tree, cancel).await;
        });

        Ok(id)
    }

    async fn run_evaluation(
        &self,
        expression_id: String,
        tree: Arc<ExpressionNode>,
        cancel: CancellationToken,
    ) {
        let evaluation = Evaluation {
            inner: &self.inner,
            expression_id: &expression_id,
            cancel: &cancel,
        };
        let outcome = evaluation.resolve(&tree).await;

        let mut state = self.inner.state.lock().await;
        let Some(record) = state.expressions.get_mut(&expression_id) else {
            return;
        };
        match outcome {
            Ok(value) => {
                if record.complete(value) {
                    info!(expression_id = %expression_id, "Expression completed: {}", value);
                }
            }
            Err(EvalError::Cancelled) => {
                if record.mark_cancelled() {
                    info!(expression_id = %expression_id, "Expression cancelled");
                }
            }
            Err(e) => {
                warn!(expression_id = %expression_id, "Evaluation stopped: {}", e);
                record.mark_cancelled();
            }
        }
    }

    /// Pop the next queued task, if any. Never waits for one.
    pub async fn next_task(&self) -> Option<Task> {
        let task = self.inner.queue.try_pop().await;
        if let Some(task) = &task {
            debug!(task_id = task.id, "Task claimed");
        }
        task
    }

    /// Deliver a worker's result.
    ///
    /// Always accepted. A result nobody is waiting for (never issued, already
    /// consumed, or for a cancelled expression) is dropped and reported as
    /// [`ResultDelivery::Unclaimed`].
    pub async fn submit_result(&self, task_id: TaskId, value: f64) -> ResultDelivery {
        let delivery = self.inner.results.resolve(task_id, value).await;
        match delivery {
            ResultDelivery::Delivered => debug!(task_id, "Result delivered: {}", value),
            ResultDelivery::Unclaimed => {
                warn!(task_id, "Dropping result {} for unclaimed task", value)
            }
        }
        delivery
    }

    /// Snapshot of every expression, oldest submission first.
    pub async fn expressions(&self) -> Vec<ExpressionView> {
        let state = self.inner.state.lock().await;
        let mut records: Vec<&ExpressionRecord> = state.expressions.values().collect();
        records.sort_by_key(|record| record.seq);
        records.into_iter().map(ExpressionRecord::view).collect()
    }

    pub async fn expression(&self, id: &str) -> Result<ExpressionView, OrchestratorError> {
        let state = self.inner.state.lock().await;
        state
            .expressions
            .get(id)
            .map(ExpressionRecord::view)
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// Tasks emitted so far for an expression, in emission order.
    pub async fn expression_tasks(&self, id: &str) -> Result<Vec<Task>, OrchestratorError> {
        let state = self.inner.state.lock().await;
        state
            .expressions
            .get(id)
            .map(|record| record.tasks.clone())
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// The parsed tree of an expression.
    pub async fn expression_tree(
        &self,
        id: &str,
    ) -> Result<Arc<ExpressionNode>, OrchestratorError> {
        let state = self.inner.state.lock().await;
        state
            .expressions
            .get(id)
            .map(|record| Arc::clone(&record.tree))
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// Stop a pending expression's evaluation.
    ///
    /// Its queued or in-flight task is not recalled; a later result for it is
    /// simply unclaimed.
    pub async fn cancel(&self, id: &str) -> Result<ExpressionView, OrchestratorError> {
        let mut state = self.inner.state.lock().await;
        let record = state
            .expressions
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        if !record.mark_cancelled() {
            return Err(OrchestratorError::AlreadyFinished {
                id: id.to_string(),
                status: record.status,
            });
        }
        record.cancel.cancel();
        info!(expression_id = %id, "Expression cancelled by client");
        Ok(record.view())
    }

    /// Number of tasks waiting in the queue.
    pub fn queued_tasks(&self) -> usize {
        self.inner.queue.len()
    }

    /// Number of dispatched tasks whose result has not arrived yet.
    pub async fn awaiting_results(&self) -> usize {
        self.inner.results.pending_count().await
    }

    /// Cancel every running evaluation and wait for all of them to stop.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Operator;
    use std::time::Duration;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(OperationTimes::uniform(100), 100)
    }

    /// Wait until the evaluation has queued its next task.
    async fn wait_for_task(orchestrator: &Orchestrator) -> Task {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(task) = orchestrator.next_task().await {
                    return task;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for a task")
    }

    async fn wait_for_queued(orchestrator: &Orchestrator, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while orchestrator.queued_tasks() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for queued tasks")
    }

    async fn wait_for_status(
        orchestrator: &Orchestrator,
        id: &str,
        status: ExpressionStatus,
    ) -> ExpressionView {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let view = orchestrator.expression(id).await.unwrap();
                if view.status == status {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for expression status")
    }

    /// Answer every task with its correct value until the expression finishes.
    async fn drive_to_completion(orchestrator: &Orchestrator, id: &str) -> ExpressionView {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let view = orchestrator.expression(id).await.unwrap();
                if view.status.is_terminal() {
                    return view;
                }
                match orchestrator.next_task().await {
                    Some(task) => {
                        orchestrator.submit_result(task.id, task.compute()).await;
                    }
                    None => tokio::time::sleep(Duration::from_millis(2)).await,
                }
            }
        })
        .await
        .expect("expression did not finish")
    }

    #[tokio::test]
    async fn single_operator_expression() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("2 + 3").await.unwrap();
        assert_eq!(
            orchestrator.expression(&id).await.unwrap().status,
            ExpressionStatus::Pending
        );

        let task = wait_for_task(&orchestrator).await;
        assert_eq!((task.arg1, task.arg2), (2.0, 3.0));
        assert_eq!(task.operation, Operator::Add);
        assert_eq!(task.operation_time, 100);

        assert_eq!(
            orchestrator.submit_result(task.id, 5.0).await,
            ResultDelivery::Delivered
        );
        let view = wait_for_status(&orchestrator, &id, ExpressionStatus::Completed).await;
        assert_eq!(view.result, Some(5.0));
    }

    #[tokio::test]
    async fn nested_expression_dispatches_in_dependency_order() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("(2 + 3) * 4").await.unwrap();

        let first = wait_for_task(&orchestrator).await;
        assert_eq!((first.arg1, first.arg2, first.operation), (2.0, 3.0, Operator::Add));

        // The multiplication cannot be emitted before the sum is known.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orchestrator.next_task().await.is_none());

        orchestrator.submit_result(first.id, 5.0).await;
        let second = wait_for_task(&orchestrator).await;
        assert_eq!(
            (second.arg1, second.arg2, second.operation),
            (5.0, 4.0, Operator::Multiply)
        );
        assert!(second.id > first.id);

        orchestrator.submit_result(second.id, 20.0).await;
        let view = wait_for_status(&orchestrator, &id, ExpressionStatus::Completed).await;
        assert_eq!(view.result, Some(20.0));
    }

    #[tokio::test]
    async fn siblings_resolve_left_before_right() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("(1 + 2) * (3 - 4)").await.unwrap();

        let left = wait_for_task(&orchestrator).await;
        assert_eq!(left.operation, Operator::Add);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orchestrator.next_task().await.is_none());

        orchestrator.submit_result(left.id, 3.0).await;
        let right = wait_for_task(&orchestrator).await;
        assert_eq!(right.operation, Operator::Subtract);
        orchestrator.submit_result(right.id, -1.0).await;

        let root = wait_for_task(&orchestrator).await;
        assert_eq!((root.arg1, root.arg2, root.operation), (3.0, -1.0, Operator::Multiply));
        orchestrator.submit_result(root.id, -3.0).await;

        let view = wait_for_status(&orchestrator, &id, ExpressionStatus::Completed).await;
        assert_eq!(view.result, Some(-3.0));
    }

    #[tokio::test]
    async fn distributed_result_matches_direct_evaluation() {
        let orchestrator = orchestrator();
        for text in [
            "1 + 2 * 3 - 4 / 2",
            "((7 - 2) * (3 + 1)) / 4",
            "10 / 4 - 0.5 * 3",
            "2 * 2 * 2 * 2 + 1",
        ] {
            let id = orchestrator.submit(text).await.unwrap();
            let view = drive_to_completion(&orchestrator, &id).await;
            let expected = expr::parse(text).unwrap().evaluate();
            assert_eq!(view.result, Some(expected), "{}", text);
        }
    }

    #[tokio::test]
    async fn emits_one_task_per_operator_node() {
        let orchestrator = orchestrator();
        for text in ["42", "1 + 1", "(1 + 2) * (3 + 4) - 5", "1 / 2 / 3 / 4 / 5"] {
            let id = orchestrator.submit(text).await.unwrap();
            drive_to_completion(&orchestrator, &id).await;
            let tree = orchestrator.expression_tree(&id).await.unwrap();
            let tasks = orchestrator.expression_tasks(&id).await.unwrap();
            assert_eq!(tasks.len(), tree.operator_count(), "{}", text);
        }
    }

    #[tokio::test]
    async fn literal_completes_without_tasks() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("7").await.unwrap();
        let view = wait_for_status(&orchestrator, &id, ExpressionStatus::Completed).await;
        assert_eq!(view.result, Some(7.0));
        assert!(orchestrator.next_task().await.is_none());
    }

    #[tokio::test]
    async fn invalid_expression_creates_nothing() {
        let orchestrator = orchestrator();
        for text in ["", "2 + * 3", "(1 + 2", "abc"] {
            let err = orchestrator.submit(text).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidExpression(_)));
        }
        assert!(orchestrator.expressions().await.is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(orchestrator.next_task().await.is_none());
    }

    #[tokio::test]
    async fn oversized_expressions_are_rejected_up_front() {
        let orchestrator = orchestrator();
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let long = vec!["1"; 200_000].join("+");
        for text in [deep, long] {
            let err = orchestrator.submit(&text).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidExpression(_)));
        }
        assert!(orchestrator.expressions().await.is_empty());
    }

    #[tokio::test]
    async fn expression_at_operator_limit_completes() {
        let orchestrator = Orchestrator::new(OperationTimes::uniform(1), 100);
        let text = vec!["1"; expr::MAX_OPERATORS + 1].join(" + ");
        let id = orchestrator.submit(&text).await.unwrap();

        let mut answered = 0;
        tokio::time::timeout(Duration::from_secs(10), async {
            while answered < expr::MAX_OPERATORS {
                match orchestrator.next_task().await {
                    Some(task) => {
                        orchestrator.submit_result(task.id, task.compute()).await;
                        answered += 1;
                    }
                    None => tokio::task::yield_now().await,
                }
            }
        })
        .await
        .expect("evaluation stalled");

        let view = wait_for_status(&orchestrator, &id, ExpressionStatus::Completed).await;
        assert_eq!(view.result, Some((expr::MAX_OPERATORS + 1) as f64));
    }

    #[tokio::test]
    async fn full_queue_suspends_the_next_evaluation() {
        let orchestrator = Orchestrator::new(OperationTimes::uniform(10), 1);
        let first = orchestrator.submit("1 + 1").await.unwrap();
        wait_for_queued(&orchestrator, 1).await;

        let second = orchestrator.submit("2 + 2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orchestrator.queued_tasks(), 1);
        // The blocked task is already allocated and its slot registered.
        assert_eq!(orchestrator.expression_tasks(&second).await.unwrap().len(), 1);
        assert_eq!(orchestrator.awaiting_results().await, 2);

        let a = orchestrator.next_task().await.unwrap();
        assert_eq!((a.arg1, a.arg2), (1.0, 1.0));
        let b = wait_for_task(&orchestrator).await;
        assert_eq!((b.arg1, b.arg2), (2.0, 2.0));
        assert!(b.id > a.id);

        orchestrator.submit_result(a.id, 2.0).await;
        orchestrator.submit_result(b.id, 4.0).await;
        wait_for_status(&orchestrator, &first, ExpressionStatus::Completed).await;
        let view = wait_for_status(&orchestrator, &second, ExpressionStatus::Completed).await;
        assert_eq!(view.result, Some(4.0));
    }

    #[tokio::test]
    async fn cancel_releases_evaluation_blocked_on_full_queue() {
        let orchestrator = Orchestrator::new(OperationTimes::uniform(10), 1);
        let first = orchestrator.submit("1 + 1").await.unwrap();
        wait_for_queued(&orchestrator, 1).await;
        let blocked = orchestrator.submit("2 + 2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orchestrator.awaiting_results().await, 2);

        let view = orchestrator.cancel(&blocked).await.unwrap();
        assert_eq!(view.status, ExpressionStatus::Cancelled);
        tokio::time::timeout(Duration::from_secs(1), async {
            while orchestrator.awaiting_results().await > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("blocked slot was not released");

        let a = orchestrator.next_task().await.unwrap();
        orchestrator.submit_result(a.id, 2.0).await;
        wait_for_status(&orchestrator, &first, ExpressionStatus::Completed).await;
        assert_eq!(orchestrator.awaiting_results().await, 0);

        // The cancelled evaluation never reaches the queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orchestrator.next_task().await.is_none());
        assert_eq!(
            orchestrator.expression(&blocked).await.unwrap().status,
            ExpressionStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn tasks_carry_their_operator_duration() {
        let orchestrator = Orchestrator::new(
            OperationTimes {
                addition_ms: 11,
                subtraction_ms: 22,
                multiplication_ms: 33,
                division_ms: 44,
            },
            100,
        );
        let id = orchestrator.submit("((1 + 2) - 3) * 4 / 5").await.unwrap();
        drive_to_completion(&orchestrator, &id).await;
        let stamped: Vec<(Operator, u64)> = orchestrator
            .expression_tasks(&id)
            .await
            .unwrap()
            .iter()
            .map(|task| (task.operation, task.operation_time))
            .collect();
        assert_eq!(
            stamped,
            vec![
                (Operator::Add, 11),
                (Operator::Subtract, 22),
                (Operator::Multiply, 33),
                (Operator::Divide, 44),
            ]
        );
    }

    #[tokio::test]
    async fn empty_queue_does_not_block() {
        let orchestrator = orchestrator();
        let polled = tokio::time::timeout(Duration::from_millis(50), orchestrator.next_task()).await;
        assert!(matches!(polled, Ok(None)));
    }

    #[tokio::test]
    async fn unknown_result_leaves_expressions_untouched() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("2 + 3").await.unwrap();
        let task = wait_for_task(&orchestrator).await;

        assert_eq!(
            orchestrator.submit_result(task.id + 1000, 1.0).await,
            ResultDelivery::Unclaimed
        );
        let view = orchestrator.expression(&id).await.unwrap();
        assert_eq!(view.status, ExpressionStatus::Pending);
        assert_eq!(view.result, None);
        assert_eq!(orchestrator.awaiting_results().await, 1);

        orchestrator.submit_result(task.id, 5.0).await;
        wait_for_status(&orchestrator, &id, ExpressionStatus::Completed).await;

        // A second delivery for a consumed task is ignored as well.
        assert_eq!(
            orchestrator.submit_result(task.id, 99.0).await,
            ResultDelivery::Unclaimed
        );
        assert_eq!(orchestrator.expression(&id).await.unwrap().result, Some(5.0));
    }

    #[tokio::test]
    async fn division_by_zero_stores_non_finite_result() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("1 / 0").await.unwrap();
        let view = drive_to_completion(&orchestrator, &id).await;
        assert_eq!(view.status, ExpressionStatus::Completed);
        assert_eq!(view.result, Some(f64::INFINITY));
    }

    #[tokio::test]
    async fn task_ids_increase_across_expressions() {
        let orchestrator = orchestrator();
        orchestrator.submit("1 + 1").await.unwrap();
        orchestrator.submit("2 + 2").await.unwrap();
        let a = wait_for_task(&orchestrator).await;
        let b = wait_for_task(&orchestrator).await;
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.min(b.id), 1);
        assert_eq!(a.id.max(b.id), 2);
    }

    #[tokio::test]
    async fn lists_expressions_in_submission_order() {
        let orchestrator = orchestrator();
        let first = orchestrator.submit("1 + 1").await.unwrap();
        let second = orchestrator.submit("2").await.unwrap();
        let ids: Vec<String> = orchestrator
            .expressions()
            .await
            .into_iter()
            .map(|view| view.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
        assert!(matches!(
            orchestrator.expression("missing").await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_stops_waiting_evaluation() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("2 + 3").await.unwrap();
        let task = wait_for_task(&orchestrator).await;

        let view = orchestrator.cancel(&id).await.unwrap();
        assert_eq!(view.status, ExpressionStatus::Cancelled);

        tokio::time::timeout(Duration::from_secs(1), async {
            while orchestrator.awaiting_results().await > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("rendezvous slot was not released");

        assert_eq!(
            orchestrator.submit_result(task.id, 5.0).await,
            ResultDelivery::Unclaimed
        );
        assert_eq!(
            orchestrator.expression(&id).await.unwrap().status,
            ExpressionStatus::Cancelled
        );
        assert!(matches!(
            orchestrator.cancel(&id).await,
            Err(OrchestratorError::AlreadyFinished { .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_cancels_stalled_evaluations() {
        let orchestrator = orchestrator();
        let id = orchestrator.submit("2 * 3").await.unwrap();
        let _lost = wait_for_task(&orchestrator).await;

        tokio::time::timeout(Duration::from_secs(1), orchestrator.shutdown())
            .await
            .expect("shutdown did not finish");
        assert_eq!(
            orchestrator.expression(&id).await.unwrap().status,
            ExpressionStatus::Cancelled
        );
    }
}
