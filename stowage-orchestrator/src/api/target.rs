//! Target API Handlers
//!
//! HTTP endpoints for backup target management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use stowage_core::domain::target::Target;
use stowage_core::dto::target::CreateTarget;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::target_service;

/// POST /target/create
/// Register a new target
pub async fn create_target(
    State(state): State<AppState>,
    Json(req): Json<CreateTarget>,
) -> ApiResult<Json<Target>> {
    tracing::info!("Creating target: {}@{}", req.username, req.host);

    let target = target_service::create_target(&state.pool, req).await?;

    Ok(Json(target))
}

/// GET /target/list
/// List all targets
pub async fn list_targets(State(state): State<AppState>) -> ApiResult<Json<Vec<Target>>> {
    tracing::debug!("Listing all targets");

    let targets = target_service::list_targets(&state.pool).await?;

    Ok(Json(targets))
}

/// GET /target/{id}
pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Target>> {
    tracing::debug!("Getting target: {}", id);

    let target = target_service::get_target(&state.pool, id).await?;

    Ok(Json(target))
}

/// DELETE /target/{id}
/// Delete a target, its runs and its policies
pub async fn delete_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting target: {}", id);

    target_service::delete_target(&state.pool, &state.scheduler, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
