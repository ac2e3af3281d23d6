//! distcalc - Orchestrator Entry Point
//!
//! Starts the HTTP server that accepts expressions and hands out tasks.

use distcalc::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Evaluations recurse once per tree level; give workers 16 MB of stack
    // instead of the default 2 MB.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(16 * 1024 * 1024)
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "distcalc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: +{}ms -{}ms *{}ms /{}ms, queue capacity {}, embedded agent {}",
        config.operation_times.addition_ms,
        config.operation_times.subtraction_ms,
        config.operation_times.multiplication_ms,
        config.operation_times.division_ms,
        config.queue_capacity,
        config.embedded_agent
    );

    // Start HTTP server
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting server on {}", addr);

    api::serve(config).await?;

    Ok(())
}
