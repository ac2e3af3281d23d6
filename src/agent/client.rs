//! HTTP client for the orchestrator's agent endpoints.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::error::AgentError;
use super::TaskSource;
use crate::api::types::{ResultRequest, TaskResponse};
use crate::task::{Task, TaskResult};

/// Talks to `GET/POST /internal/task` on a remote orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    client: Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::network_error(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self) -> String {
        format!("{}/internal/task", self.base_url)
    }

    fn request_error(e: reqwest::Error) -> AgentError {
        if e.is_timeout() {
            AgentError::network_error(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            AgentError::network_error(format!("Connection failed: {}", e))
        } else {
            AgentError::network_error(format!("Request failed: {}", e))
        }
    }
}

#[async_trait]
impl TaskSource for OrchestratorClient {
    async fn fetch_task(&self) -> Result<Option<Task>, AgentError> {
        let response = self
            .client
            .get(self.task_url())
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        // 404 is the orchestrator's "no task available"
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await.map_err(Self::request_error)?;
        if !status.is_success() {
            return Err(AgentError::from_status(status.as_u16(), &body));
        }

        let parsed: TaskResponse = serde_json::from_str(&body).map_err(|e| {
            AgentError::parse_error(format!("Failed to parse task: {}, body: {}", e, body))
        })?;
        Ok(Some(parsed.task))
    }

    async fn report_result(&self, result: TaskResult) -> Result<(), AgentError> {
        let response = self
            .client
            .post(self.task_url())
            .json(&ResultRequest {
                id: result.id,
                result: result.result,
            })
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::from_status(status.as_u16(), &body));
        }
        Ok(())
    }
}
