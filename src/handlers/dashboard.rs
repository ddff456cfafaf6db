//! Dashboard read handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::AppState;
use crate::models::AuthUser;
use crate::utils::ApiResult;

/// List dashboards readable by the current user
/// GET /api/dashboards
#[utoipa::path(
    get,
    path = "/api/dashboards",
    responses((status = 200, description = "Readable dashboards")),
    security(("bearer_auth" = [])),
    tag = "Dashboards"
)]
pub async fn list_dashboards(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let dashboards = state.dashboard_service.list_dashboards(user.id).await?;
    Ok(Json(dashboards))
}

/// Dashboard detail with datasources, columns and RLS clauses
/// GET /api/dashboards/:id
#[utoipa::path(
    get,
    path = "/api/dashboards/{id}",
    params(("id" = i64, Path, description = "Dashboard ID")),
    responses(
        (status = 200, description = "Dashboard detail"),
        (status = 403, description = "No access to this dashboard"),
        (status = 404, description = "Dashboard not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboards"
)]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let dashboard = state.dashboard_service.get_dashboard(id).await?;
    state.dashboard_service.ensure_read_access(&dashboard, user.id)?;
    let detail = state.dashboard_service.get_dashboard_detail(id).await?;
    Ok(Json(detail))
}
