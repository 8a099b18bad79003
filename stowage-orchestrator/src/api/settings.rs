//! Settings API Handlers

use axum::{Json, extract::State};
use stowage_core::dto::settings::BackupPathSetting;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::settings_service;

/// GET /settings/backup-path
pub async fn get_backup_path(State(state): State<AppState>) -> ApiResult<Json<BackupPathSetting>> {
    let path = settings_service::get_default_backup_path(&state.pool).await?;

    Ok(Json(BackupPathSetting { path }))
}

/// PUT /settings/backup-path
pub async fn set_backup_path(
    State(state): State<AppState>,
    Json(req): Json<BackupPathSetting>,
) -> ApiResult<Json<BackupPathSetting>> {
    let path = settings_service::set_default_backup_path(&state.pool, req.path).await?;

    Ok(Json(BackupPathSetting { path }))
}
