//! HTTP API
//!
//! - `POST /agent` {message, session_id?} -> {message}
//! - `GET /agent/models` -> [model]
//! - `POST /agent/models/:name` 切换模型
//! - `POST /agent/memory/clear` {session_id?} -> {status: "success"}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::agent::AgentService;
use crate::core::AgentError;

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

type ApiError = (StatusCode, String);

pub fn router(service: Arc<AgentService>) -> Router {
    Router::new()
        .route("/agent", post(ask_agent))
        .route("/agent/models", get(list_models))
        .route("/agent/models/:name", post(change_model))
        .route("/agent/memory/clear", post(clear_memory))
        .route("/health", get(|| async { "OK" }))
        .with_state(service)
}

fn map_error(e: AgentError) -> ApiError {
    let status = match e {
        AgentError::EmptyInput | AgentError::UnknownModel(_) => StatusCode::BAD_REQUEST,
        AgentError::TurnTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AgentError::Llm(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("request failed: {}", e);
    }
    (status, e.to_string())
}

fn session_or_default(service: &AgentService, session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| service.default_session().to_string())
}

async fn ask_agent(
    State(service): State<Arc<AgentService>>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptResponse>, ApiError> {
    let session = session_or_default(&service, req.session_id);
    let outcome = service
        .ask_in(&session, &req.message, None)
        .await
        .map_err(map_error)?;
    Ok(Json(PromptResponse {
        message: outcome.response,
    }))
}

async fn list_models(State(service): State<Arc<AgentService>>) -> Json<Vec<String>> {
    Json(service.list_models())
}

async fn change_model(
    State(service): State<Arc<AgentService>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    service.switch_model(&name).await.map_err(map_error)?;
    Ok(Json(serde_json::json!({ "status": "success", "model": name })))
}

async fn clear_memory(
    State(service): State<Arc<AgentService>>,
    body: Option<Json<ClearRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let session = session_or_default(&service, req.session_id);
    service.clear_memory(&session).await.map_err(map_error)?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}
