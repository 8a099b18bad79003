//! Health Check API Handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::api::AppState;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    /// Policies with a registered trigger
    active_policies: usize,
    /// Targets with a backup in flight
    running_backups: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        active_policies: state.scheduler.list_active().await.len(),
        running_backups: state.launcher.active_targets().len(),
    })
}
