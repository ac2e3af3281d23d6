//! Agent error types with retry classification.
//!
//! Distinguishes between transient errors (back off and retry) and permanent
//! errors (log and move on).

use std::time::Duration;

/// Error talking to the orchestrator.
#[derive(Debug)]
pub struct AgentError {
    /// The kind of error
    pub kind: AgentErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl AgentError {
    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: AgentErrorKind::ServerError,
            status_code: Some(status_code),
            message,
        }
    }

    /// Create a client error (bad request, unexpected route, etc.).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: AgentErrorKind::ClientError,
            status_code: Some(status_code),
            message,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: AgentErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: AgentErrorKind::ParseError,
            status_code: None,
            message,
        }
    }

    /// Build an error from a non-success HTTP status.
    pub fn from_status(status_code: u16, body: &str) -> Self {
        match classify_http_status(status_code) {
            AgentErrorKind::ClientError => Self::client_error(status_code, body.to_string()),
            _ => Self::server_error(status_code, body.to_string()),
        }
    }

    /// Check if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for AgentError {}

/// Classification of agent errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentErrorKind {
    /// Server error (5xx) - transient, should retry
    ServerError,
    /// Client error (4xx other than "no task") - permanent
    ClientError,
    /// Network error (connection refused, timeout) - transient, should retry
    NetworkError,
    /// Response body could not be decoded - permanent
    ParseError,
}

impl AgentErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentErrorKind::ServerError | AgentErrorKind::NetworkError)
    }
}

impl std::fmt::Display for AgentErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentErrorKind::ServerError => write!(f, "Server error"),
            AgentErrorKind::ClientError => write!(f, "Client error"),
            AgentErrorKind::NetworkError => write!(f, "Network error"),
            AgentErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> AgentErrorKind {
    match status {
        400..=499 => AgentErrorKind::ClientError,
        _ => AgentErrorKind::ServerError,
    }
}

/// Exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay before the next retry; grows with every call until `reset`.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let multiplier = 2u64.saturating_pow(self.attempt);
        let delay_ms = base_ms.saturating_mul(multiplier);

        // Simple deterministic jitter, up to 25% of the delay
        let jitter_range = delay_ms / 4;
        let jitter = if jitter_range > 0 {
            (self.attempt as u64 * 7) % jitter_range
        } else {
            0
        };

        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(delay_ms.saturating_add(jitter)).min(self.max)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
