//! Assistant chat handlers - the inbound API of the query orchestration.

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::AppState;
use crate::models::AuthUser;
use crate::services::assistant::ChatRequest;
use crate::utils::{ApiError, ApiResult};

/// Submit a chat query against a dashboard
/// POST /api/assistant/chat
#[utoipa::path(
    post,
    path = "/api/assistant/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant response", body = crate::services::assistant::ChatResponse),
        (status = 400, description = "Malformed input or assistant not configured"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "No access to this dashboard"),
        (status = 404, description = "Dashboard not found"),
        (status = 500, description = "AI provider failure")
    ),
    security(("bearer_auth" = [])),
    tag = "Assistant"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| ApiError::validation_error(e.to_string()))?;

    tracing::info!(
        "Assistant chat from user {} on dashboard {}",
        user.username,
        req.dashboard_id
    );

    let response = state.assistant_service.chat(&user, req).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub dashboard_id: Option<i64>,
    pub limit: Option<i64>,
}

/// List past chat interactions
/// GET /api/assistant/history
#[utoipa::path(
    get,
    path = "/api/assistant/history",
    params(
        ("dashboard_id" = Option<i64>, Query, description = "Filter by dashboard"),
        ("limit" = Option<i64>, Query, description = "Max rows (default 50)")
    ),
    responses((status = 200, description = "Chat history, newest first")),
    security(("bearer_auth" = [])),
    tag = "Assistant"
)]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let logs = state
        .assistant_service
        .history(params.dashboard_id, limit)
        .await?;
    Ok(Json(logs))
}
