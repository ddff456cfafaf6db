//! AI provider management handlers
//!
//! REST endpoints for the provider configuration CRUD surface. API keys are
//! masked in every response.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::AppState;
use crate::services::assistant::{CreateProviderRequest, UpdateProviderRequest};
use crate::utils::ApiResult;

/// List all providers
/// GET /api/assistant/providers
#[utoipa::path(
    get,
    path = "/api/assistant/providers",
    responses((status = 200, description = "All provider configurations")),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn list_providers(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let providers = state.assistant_service.list_providers().await?;
    Ok(Json(providers))
}

/// Get provider by ID
/// GET /api/assistant/providers/:id
#[utoipa::path(
    get,
    path = "/api/assistant/providers/{id}",
    params(("id" = i64, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Provider configuration"),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn get_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let provider = state.assistant_service.get_provider(id).await?;
    Ok(Json(provider))
}

/// Get the active provider
/// GET /api/assistant/providers/active
#[utoipa::path(
    get,
    path = "/api/assistant/providers/active",
    responses((status = 200, description = "Active provider, if any")),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn get_active_provider(
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let provider = state.assistant_service.get_active_provider().await?;
    Ok(Json(provider))
}

/// Create a provider
/// POST /api/assistant/providers
#[utoipa::path(
    post,
    path = "/api/assistant/providers",
    request_body = CreateProviderRequest,
    responses(
        (status = 201, description = "Provider created"),
        (status = 400, description = "Invalid provider data")
    ),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn create_provider(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProviderRequest>,
) -> ApiResult<impl IntoResponse> {
    let provider = state.assistant_service.create_provider(req).await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

/// Update a provider
/// PUT /api/assistant/providers/:id
#[utoipa::path(
    put,
    path = "/api/assistant/providers/{id}",
    params(("id" = i64, Path, description = "Provider ID")),
    request_body = UpdateProviderRequest,
    responses(
        (status = 200, description = "Provider updated"),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn update_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProviderRequest>,
) -> ApiResult<impl IntoResponse> {
    let provider = state.assistant_service.update_provider(id, req).await?;
    Ok(Json(provider))
}

/// Delete a provider
/// DELETE /api/assistant/providers/:id
#[utoipa::path(
    delete,
    path = "/api/assistant/providers/{id}",
    params(("id" = i64, Path, description = "Provider ID")),
    responses(
        (status = 204, description = "Provider deleted"),
        (status = 404, description = "Provider not found"),
        (status = 409, description = "Provider is active")
    ),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn delete_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.assistant_service.delete_provider(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Activate a provider (deactivates all others)
/// POST /api/assistant/providers/:id/activate
#[utoipa::path(
    post,
    path = "/api/assistant/providers/{id}/activate",
    params(("id" = i64, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Provider activated"),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn activate_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let provider = state.assistant_service.activate_provider(id).await?;
    Ok(Json(provider))
}

/// Deactivate a provider
/// POST /api/assistant/providers/:id/deactivate
#[utoipa::path(
    post,
    path = "/api/assistant/providers/{id}/deactivate",
    params(("id" = i64, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Provider deactivated"),
        (status = 404, description = "Provider not found")
    ),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn deactivate_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let provider = state.assistant_service.deactivate_provider(id).await?;
    Ok(Json(provider))
}

/// Assistant status
/// GET /api/assistant/status
#[utoipa::path(
    get,
    path = "/api/assistant/status",
    responses((status = 200, description = "Whether the assistant is configured")),
    security(("bearer_auth" = [])),
    tag = "AI Providers"
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let status = state.assistant_service.status().await?;
    Ok(Json(status))
}
