//! HTTP API for the orchestrator.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/calculate` - Submit an expression
//! - `GET /api/v1/expressions` - List all expressions
//! - `GET /api/v1/expressions/{id}` - Get one expression
//! - `POST /api/v1/expressions/{id}/cancel` - Cancel a pending expression
//! - `GET /internal/task` - Claim a task (agents)
//! - `POST /internal/task` - Report a task result (agents)
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, shutdown_signal, AppState};
pub use types::*;

#[cfg(test)]
pub(crate) use routes::spawn_test_server;
