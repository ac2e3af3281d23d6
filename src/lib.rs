//! # distcalc
//!
//! Distributed arithmetic calculator.
//!
//! This library provides:
//! - An orchestrator that parses expressions and splits them into binary tasks
//! - A bounded task queue that agents poll over HTTP
//! - A worker pool that claims, computes and reports tasks
//!
//! ## Architecture
//!
//! ```text
//!   client ──POST /api/v1/calculate──▶ ┌──────────────────┐
//!                                      │   Orchestrator   │
//!                                      │ parse ▶ evaluate │
//!                                      └────────┬─────────┘
//!                                               │ tasks / results
//!                                      ┌────────▼─────────┐
//!                                      │   Worker pool    │
//!                                      │ (embedded or via │
//!                                      │  /internal/task) │
//!                                      └──────────────────┘
//! ```
//!
//! ## Task Flow
//! 1. Parse the submitted text into an expression tree
//! 2. Walk the tree; every operator becomes one queued task
//! 3. A worker claims the task, sleeps its operation time, reports the value
//! 4. The reported value feeds the parent operator until the root resolves
//!
//! ## Modules
//! - `expr`: Expression tree and parser
//! - `orchestrator`: Expression registry, task queue and evaluator
//! - `agent`: Worker pool and orchestrator client
//! - `api`: HTTP routes

pub mod agent;
pub mod api;
pub mod config;
pub mod expr;
pub mod orchestrator;
pub mod task;
pub mod util;

pub use config::{AgentConfig, Config};
pub use orchestrator::Orchestrator;
