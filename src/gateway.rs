//! HTTP front door: `POST /invoke-agent` runs one query through the pipeline.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::error::TutorError;
use crate::pipeline::{user_message, TutorPipeline};
use crate::schema::{ChatHistoryEntry, StudentProfile};

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub query: String,
    pub user_info: StudentProfile,
    #[serde(default)]
    pub chat_history: Vec<ChatHistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_kind: String,
    pub message: String,
}

pub enum GatewayError {
    /// The body was not a well-formed `InvokeRequest`.
    InvalidRequest(JsonRejection),
    Pipeline(TutorError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Pipeline(e) => match e {
                TutorError::SchemaValidation { .. } => StatusCode::BAD_REQUEST,
                TutorError::NotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
                TutorError::ReasoningParse(_)
                | TutorError::ReasoningUnavailable(_)
                | TutorError::ToolExecution(_) => StatusCode::BAD_GATEWAY,
                TutorError::ToolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                TutorError::ReasoningTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }

    fn envelope(&self) -> ErrorEnvelope {
        match self {
            GatewayError::InvalidRequest(rejection) => ErrorEnvelope {
                error_kind: "invalid_request".to_string(),
                message: rejection.body_text(),
            },
            GatewayError::Pipeline(e) => ErrorEnvelope {
                error_kind: e.kind().to_string(),
                message: user_message(e),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

/// Health check
pub async fn health() -> &'static str {
    "OK"
}

pub async fn invoke_agent(
    State(pipeline): State<Arc<TutorPipeline>>,
    payload: std::result::Result<Json<InvokeRequest>, JsonRejection>,
) -> Result<Json<InvokeResponse>, GatewayError> {
    let Json(request) = payload.map_err(|rejection| {
        log::warn!("Rejected /invoke-agent body: {}", rejection.body_text());
        GatewayError::InvalidRequest(rejection)
    })?;
    let response = pipeline
        .handle(&request.query, &request.user_info, &request.chat_history)
        .await
        .map_err(GatewayError::Pipeline)?;
    Ok(Json(InvokeResponse { response }))
}

pub fn router(pipeline: Arc<TutorPipeline>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/invoke-agent", post(invoke_agent))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(pipeline)
}

pub async fn serve(config: &ServerConfig, pipeline: Arc<TutorPipeline>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!("Tutor gateway listening on http://{}", addr);
    log::info!("  POST /invoke-agent - route a query to a tool");
    log::info!("  GET  /             - health check");

    axum::serve(listener, router(pipeline))
        .await
        .context("Gateway server failed")?;
    Ok(())
}
