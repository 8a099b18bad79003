//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod policy;
pub mod run;
pub mod settings;
pub mod target;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use sqlx::PgPool;
use std::sync::Arc;
use stowage_runner::{BackupScheduler, RunLauncher};
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub scheduler: Arc<BackupScheduler>,
    pub launcher: RunLauncher,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Target endpoints
        .route("/target/create", post(target::create_target))
        .route("/target/list", get(target::list_targets))
        .route("/target/{id}", get(target::get_target))
        .route("/target/{id}", delete(target::delete_target))
        .route("/target/{id}/backup", post(run::start_backup))
        // Run endpoints
        .route("/run/{id}", get(run::get_run))
        .route("/run/target/{target_id}", get(run::list_runs_by_target))
        // Policy endpoints
        .route("/policy/create", post(policy::create_policy))
        .route("/policy/list", get(policy::list_policies))
        .route("/policy/{id}", put(policy::update_policy))
        .route("/policy/{id}", delete(policy::delete_policy))
        .route("/policy/{id}/run", post(policy::run_policy))
        .route("/scheduler/active", get(policy::list_active))
        // Settings endpoints
        .route("/settings/backup-path", get(settings::get_backup_path))
        .route("/settings/backup-path", put(settings::set_backup_path))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
