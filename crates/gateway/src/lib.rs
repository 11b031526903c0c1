//! HTTP front door for CloudPilot.
//!
//! Exposes the command endpoint, the tool catalog and a health check.
//! Client errors come back as `400 {"detail": ...}`; a handler panic is
//! caught and reported as `500 {"detail": "Backend error: ..."}`.
//!
//! Built on Axum.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use cloudpilot_agent::{CommandEngine, CommandRequest, CommandResponse, ExecuteError};
use cloudpilot_config::GatewayConfig;
use cloudpilot_core::ToolDefinition;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<CommandEngine>,
}

pub type SharedState = Arc<GatewayState>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(err: ExecuteError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            detail: err.to_string(),
        }),
    )
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unexpected failure");
    error!(panic = %message, "Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: format!("Backend error: {message}"),
        }),
    )
        .into_response()
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/execute", post(execute_handler))
        .route("/api/tools", get(tools_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn start(
    config: &GatewayConfig,
    engine: Arc<CommandEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(Arc::new(GatewayState { engine }), config.body_limit_bytes);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Cloud Agent Controller is running!",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn execute_handler(
    State(state): State<SharedState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    info!(command_len = request.command.len(), mode = ?request.mode, "Command received");

    match state.engine.execute(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            warn!(error = %e, "Command rejected");
            Err(bad_request(e))
        }
    }
}

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<ToolDefinition>,
    count: usize,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolsResponse> {
    let tools = state.engine.registry().definitions();
    Json(ToolsResponse {
        count: tools.len(),
        tools,
    })
}
