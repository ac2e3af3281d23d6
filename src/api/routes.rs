//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::WorkerPool;
use crate::config::{AgentConfig, Config};
use crate::orchestrator::{Orchestrator, OrchestratorError, ResultDelivery};

use super::types::*;

/// Shared application state.
pub struct AppState {
    /// Expression registry, task queue and result rendezvous
    pub orchestrator: Orchestrator,
}

/// Build the router for a given state.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/v1/calculate", post(calculate))
        .route("/api/v1/expressions", get(list_expressions))
        .route("/api/v1/expressions/:id", get(get_expression))
        .route("/api/v1/expressions/:id/cancel", post(cancel_expression));

    // Agent-facing endpoints
    let internal_routes = Router::new().route("/internal/task", get(get_task).post(post_result));

    Router::new()
        .merge(public_routes)
        .merge(internal_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(&config);

    let embedded_pool = if config.embedded_agent {
        let agent_config = AgentConfig::from_env();
        tracing::info!(
            "Starting embedded worker pool with {} workers",
            agent_config.computing_power
        );
        Some(WorkerPool::start(
            agent_config,
            Arc::new(orchestrator.clone()),
        ))
    } else {
        None
    };

    let state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
    });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, cancelling running evaluations...");
    if let Some(pool) = embedded_pool {
        let reports = pool.shutdown().await;
        let processed: u64 = reports.iter().map(|r| r.processed).sum();
        tracing::info!("Embedded worker pool stopped after {} tasks", processed);
    }
    orchestrator.shutdown().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn error_response(err: OrchestratorError) -> (StatusCode, String) {
    let status = match &err {
        OrchestratorError::InvalidExpression(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::AlreadyFinished { .. } => StatusCode::CONFLICT,
    };
    (status, err.to_string())
}

fn invalid_data(rejection: JsonRejection) -> (StatusCode, String) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        format!("Invalid data: {}", rejection.body_text()),
    )
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queued_tasks: state.orchestrator.queued_tasks(),
        expressions: state.orchestrator.expressions().await.len(),
    })
}

/// Submit an expression for evaluation.
async fn calculate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalculateResponse>), (StatusCode, String)> {
    let Json(req) = payload.map_err(invalid_data)?;
    let id = state
        .orchestrator
        .submit(&req.expression)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(CalculateResponse { id })))
}

/// List all expressions.
async fn list_expressions(State(state): State<Arc<AppState>>) -> Json<ExpressionListResponse> {
    Json(ExpressionListResponse {
        expressions: state.orchestrator.expressions().await,
    })
}

async fn get_expression(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExpressionResponse>, (StatusCode, String)> {
    let expression = state
        .orchestrator
        .expression(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(ExpressionResponse { expression }))
}

async fn cancel_expression(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExpressionResponse>, (StatusCode, String)> {
    let expression = state
        .orchestrator
        .cancel(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(ExpressionResponse { expression }))
}

/// Hand the next queued task to an agent.
async fn get_task(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    match state.orchestrator.next_task().await {
        Some(task) => Ok(Json(TaskResponse { task })),
        None => Err((StatusCode::NOT_FOUND, "No tasks available".to_string())),
    }
}

/// Accept a result from an agent.
async fn post_result(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResultRequest>, JsonRejection>,
) -> Result<Json<ResultResponse>, (StatusCode, String)> {
    let Json(req) = payload.map_err(invalid_data)?;
    let delivery = state.orchestrator.submit_result(req.id, req.result).await;
    Ok(Json(ResultResponse {
        delivered: delivery == ResultDelivery::Delivered,
    }))
}

/// Serve an orchestrator on an ephemeral port for tests; returns the base URL.
#[cfg(test)]
pub(crate) async fn spawn_test_server(orchestrator: Orchestrator) -> String {
    let state = Arc::new(AppState { orchestrator });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.ok();
    });
    format!("http://{}", addr)
}
