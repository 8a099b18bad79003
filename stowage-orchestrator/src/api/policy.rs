//! Policy API Handlers
//!
//! HTTP endpoints for schedule policies and the scheduler.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use stowage_core::domain::policy::SchedulePolicy;
use stowage_core::dto::policy::{PolicyRequest, PolicyRunResult};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::policy_service;

/// POST /policy/create
pub async fn create_policy(
    State(state): State<AppState>,
    Json(req): Json<PolicyRequest>,
) -> ApiResult<Json<SchedulePolicy>> {
    tracing::info!("Creating {} policy", req.kind);

    let policy = policy_service::create_policy(&state.pool, &state.scheduler, req).await?;

    Ok(Json(policy))
}

/// GET /policy/list
pub async fn list_policies(State(state): State<AppState>) -> ApiResult<Json<Vec<SchedulePolicy>>> {
    tracing::debug!("Listing all policies");

    let policies = policy_service::list_policies(&state.pool).await?;

    Ok(Json(policies))
}

/// PUT /policy/{id}
/// Replace a policy; its trigger is re-registered
pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PolicyRequest>,
) -> ApiResult<Json<SchedulePolicy>> {
    tracing::info!("Updating policy: {}", id);

    let policy = policy_service::update_policy(&state.pool, &state.scheduler, id, req).await?;

    Ok(Json(policy))
}

/// DELETE /policy/{id}
pub async fn delete_policy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting policy: {}", id);

    policy_service::delete_policy(&state.pool, &state.scheduler, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /policy/{id}/run
/// Fire a policy now, outside its schedule
pub async fn run_policy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PolicyRunResult>> {
    tracing::info!("Running policy now: {}", id);

    let launched = policy_service::run_policy_now(&state.scheduler, id).await?;

    Ok(Json(PolicyRunResult {
        policy_id: id,
        launched,
    }))
}

/// GET /scheduler/active
/// Policy ids with a registered trigger
pub async fn list_active(State(state): State<AppState>) -> Json<Vec<Uuid>> {
    Json(state.scheduler.list_active().await)
}
