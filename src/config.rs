//! Configuration management for distcalc.
//!
//! Configuration is read from environment variables.
//!
//! Orchestrator ([`Config`]):
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8080`.
//! - `TIME_ADDITION_MS` - Optional. Simulated cost of `+`. Defaults to `1000`.
//! - `TIME_SUBTRACTION_MS` - Optional. Simulated cost of `-`. Defaults to `1000`.
//! - `TIME_MULTIPLICATIONS_MS` - Optional. Simulated cost of `*`. Defaults to `1000`.
//! - `TIME_DIVISIONS_MS` - Optional. Simulated cost of `/`. Defaults to `1000`.
//! - `TASK_QUEUE_CAPACITY` - Optional. Bound of the task queue. Defaults to `100`.
//! - `EMBEDDED_AGENT` - Optional. Also run an in-process worker pool. Defaults to `false`.
//!
//! Agent ([`AgentConfig`]):
//! - `ORCHESTRATOR_URL` - Optional. Defaults to `http://127.0.0.1:8080`.
//! - `COMPUTING_POWER` - Optional. Number of workers. Defaults to `1`.
//! - `AGENT_POLL_INTERVAL_MS` - Optional. Idle poll interval. Defaults to `100`.
//! - `AGENT_MAX_BACKOFF_MS` - Optional. Backoff ceiling. Defaults to `5000`.
//! - `AGENT_MAX_INFLIGHT` - Optional. Tasks held by the pool at once. Defaults to the pool size.
//! - `AGENT_REQUEST_TIMEOUT_MS` - Optional. HTTP request timeout. Defaults to `10000`.
//!
//! Integer settings other than `PORT` fall back to their default when they are
//! zero, negative or unparsable.

use std::time::Duration;
use thiserror::Error;

use crate::expr::Operator;
use crate::util::{env_var_bool, env_var_positive};

pub const DEFAULT_OPERATION_TIME_MS: u64 = 1000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Simulated compute cost per operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimes {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl Default for OperationTimes {
    fn default() -> Self {
        Self::uniform(DEFAULT_OPERATION_TIME_MS)
    }
}

impl OperationTimes {
    /// Same duration for every operator.
    pub fn uniform(ms: u64) -> Self {
        Self {
            addition_ms: ms,
            subtraction_ms: ms,
            multiplication_ms: ms,
            division_ms: ms,
        }
    }

    pub fn from_env() -> Self {
        Self {
            addition_ms: env_var_positive("TIME_ADDITION_MS", DEFAULT_OPERATION_TIME_MS),
            subtraction_ms: env_var_positive("TIME_SUBTRACTION_MS", DEFAULT_OPERATION_TIME_MS),
            multiplication_ms: env_var_positive(
                "TIME_MULTIPLICATIONS_MS",
                DEFAULT_OPERATION_TIME_MS,
            ),
            division_ms: env_var_positive("TIME_DIVISIONS_MS", DEFAULT_OPERATION_TIME_MS),
        }
    }

    /// Milliseconds a task with this operator is declared to take.
    pub fn for_operator(&self, op: Operator) -> u64 {
        match op {
            Operator::Add => self.addition_ms,
            Operator::Subtract => self.subtraction_ms,
            Operator::Multiply => self.multiplication_ms,
            Operator::Divide => self.division_ms,
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Per-operator simulated durations stamped on each task
    pub operation_times: OperationTimes,

    /// Capacity of the bounded task queue
    pub queue_capacity: usize,

    /// Run a worker pool inside the orchestrator process
    pub embedded_agent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            operation_times: OperationTimes::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            embedded_agent: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `PORT` is set but is not a valid port.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        Ok(Self {
            host,
            port,
            operation_times: OperationTimes::from_env(),
            queue_capacity: env_var_positive("TASK_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY as u64)
                as usize,
            embedded_agent: env_var_bool("EMBEDDED_AGENT", false),
        })
    }
}

/// Agent (worker pool) configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the orchestrator
    pub orchestrator_url: String,

    /// Number of independent workers
    pub computing_power: usize,

    /// Wait between polls when no task is queued
    pub poll_interval: Duration,

    /// Ceiling for the exponential backoff on transient failures
    pub max_backoff: Duration,

    /// Maximum number of tasks the pool holds at once
    pub max_inflight: usize,

    /// Timeout for each HTTP request to the orchestrator
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            orchestrator_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            computing_power: 1,
            poll_interval: Duration::from_millis(100),
            max_backoff: Duration::from_millis(5000),
            max_inflight: 1,
            request_timeout: Duration::from_millis(10_000),
        }
    }
}

impl AgentConfig {
    /// Load agent configuration from environment variables.
    pub fn from_env() -> Self {
        let computing_power = env_var_positive("COMPUTING_POWER", 1) as usize;
        let orchestrator_url = std::env::var("ORCHESTRATOR_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_ORCHESTRATOR_URL.to_string());

        Self {
            orchestrator_url,
            computing_power,
            poll_interval: Duration::from_millis(env_var_positive("AGENT_POLL_INTERVAL_MS", 100)),
            max_backoff: Duration::from_millis(env_var_positive("AGENT_MAX_BACKOFF_MS", 5000)),
            max_inflight: env_var_positive("AGENT_MAX_INFLIGHT", computing_power as u64) as usize,
            request_timeout: Duration::from_millis(env_var_positive(
                "AGENT_REQUEST_TIMEOUT_MS",
                10_000,
            )),
        }
    }

    /// A pool of `computing_power` workers with one in-flight slot each.
    pub fn with_workers(computing_power: usize) -> Self {
        let computing_power = computing_power.max(1);
        Self {
            computing_power,
            max_inflight: computing_power,
            ..Self::default()
        }
    }
}
