//! Run API Handlers
//!
//! Starting backups and polling their progress.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use stowage_core::domain::run::BackupRun;
use stowage_core::dto::run::LaunchedRun;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::run_service;

/// POST /target/{id}/backup
/// Start a backup now; responds before the run finishes
pub async fn start_backup(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<LaunchedRun>)> {
    tracing::info!("Starting backup for target: {}", target_id);

    let launched = run_service::start_run(&state.pool, &state.launcher, target_id).await?;

    Ok((StatusCode::ACCEPTED, Json(launched)))
}

/// GET /run/{id}
/// Run status and log
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BackupRun>> {
    tracing::debug!("Getting run: {}", id);

    let run = run_service::get_run(&state.pool, id).await?;

    Ok(Json(run))
}

/// GET /run/target/{target_id}
pub async fn list_runs_by_target(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
) -> ApiResult<Json<Vec<BackupRun>>> {
    tracing::debug!("Listing runs for target: {}", target_id);

    let runs = run_service::list_runs_for_target(&state.pool, target_id).await?;

    Ok(Json(runs))
}
