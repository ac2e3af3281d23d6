//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::orchestrator::ExpressionView;
use crate::task::{wire_f64, Task, TaskId};

/// Request to evaluate an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// Expression text, e.g. `"(2 + 3) * 4"`
    pub expression: String,
}

/// Response after accepting an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    /// Identifier to poll the expression with
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionListResponse {
    pub expressions: Vec<ExpressionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub expression: ExpressionView,
}

/// A task handed to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

/// Result posted by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRequest {
    pub id: TaskId,
    #[serde(with = "wire_f64")]
    pub result: f64,
}

/// Acknowledgement of a posted result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultResponse {
    /// Whether an evaluation was waiting for this result
    pub delivered: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Tasks waiting for a worker
    pub queued_tasks: usize,

    /// Expressions known to the orchestrator
    pub expressions: usize,
}
