//! distcalc-agent - Worker Entry Point
//!
//! Polls a remote orchestrator for tasks with `COMPUTING_POWER` workers.

use std::sync::Arc;

use distcalc::agent::{OrchestratorClient, WorkerPool};
use distcalc::api::shutdown_signal;
use distcalc::config::AgentConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "distcalc=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env();
    let client = OrchestratorClient::new(config.orchestrator_url.clone(), config.request_timeout)?;
    info!(
        "Agent connecting to {} with {} workers",
        client.base_url(),
        config.computing_power
    );
    let pool = WorkerPool::start(config, Arc::new(client));

    shutdown_signal().await;
    info!("Shutdown signal received, stopping workers...");

    for report in pool.shutdown().await {
        info!(
            "Worker {} processed {} tasks",
            report.worker_id, report.processed
        );
    }
    Ok(())
}
