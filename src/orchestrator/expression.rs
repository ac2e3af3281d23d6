//! Expression records and their client-facing snapshots.
//!
//! # State Machine
//! ```text
//! Pending -> Completed
//!        \-> Cancelled
//! ```
//! Both targets are terminal; a record never leaves them and is never removed.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::expr::ExpressionNode;
use crate::task::{wire_f64, Task};
use crate::util::now_string;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionStatus {
    /// Submitted, evaluation still running
    Pending,
    /// Root task resolved; `result` is set
    Completed,
    /// Evaluation stopped by a client or by shutdown
    Cancelled,
}

impl ExpressionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExpressionStatus::Pending)
    }
}

/// What clients see of an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionView {
    pub id: String,
    pub status: ExpressionStatus,
    #[serde(default, with = "wire_f64::option")]
    pub result: Option<f64>,
    pub created_at: String,
    /// Set once the expression completes or is cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// Orchestrator-side bookkeeping for one submitted expression.
#[derive(Debug)]
pub(crate) struct ExpressionRecord {
    pub id: String,
    /// Submission order, used to list expressions oldest first
    pub seq: u64,
    pub status: ExpressionStatus,
    pub result: Option<f64>,
    pub tree: Arc<ExpressionNode>,
    /// Every task emitted for this expression, in emission order
    pub tasks: Vec<Task>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub cancel: CancellationToken,
}

impl ExpressionRecord {
    pub fn new(id: String, seq: u64, tree: Arc<ExpressionNode>, cancel: CancellationToken) -> Self {
        Self {
            id,
            seq,
            status: ExpressionStatus::Pending,
            result: None,
            tree,
            tasks: Vec::new(),
            created_at: now_string(),
            completed_at: None,
            cancel,
        }
    }

    /// Store the final value. Returns `false` if the record already finished.
    pub fn complete(&mut self, value: f64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ExpressionStatus::Completed;
        self.result = Some(value);
        self.completed_at = Some(now_string());
        true
    }

    /// Mark the record cancelled. Returns `false` if the record already finished.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ExpressionStatus::Cancelled;
        self.completed_at = Some(now_string());
        true
    }

    pub fn view(&self) -> ExpressionView {
        ExpressionView {
            id: self.id.clone(),
            status: self.status,
            result: self.result,
            created_at: self.created_at.clone(),
            completed_at: self.completed_at.clone(),
        }
    }
}
