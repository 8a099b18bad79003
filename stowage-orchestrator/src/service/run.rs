//! Run Service
//!
//! Starting backups on demand and reading run records.

use sqlx::PgPool;
use stowage_core::domain::run::BackupRun;
use stowage_core::dto::run::LaunchedRun;
use stowage_runner::{BackupError, RunLauncher};
use uuid::Uuid;

use crate::repository::{run_repository, target_repository};

/// Service error type
#[derive(Debug)]
pub enum RunError {
    NotFound(Uuid),
    TargetNotFound(Uuid),
    TargetBusy(Uuid),
    DatabaseError(sqlx::Error),
    LaunchError(BackupError),
}

impl From<sqlx::Error> for RunError {
    fn from(err: sqlx::Error) -> Self {
        RunError::DatabaseError(err)
    }
}

impl From<BackupError> for RunError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::TargetBusy(id) => RunError::TargetBusy(id),
            BackupError::TargetNotFound(id) => RunError::TargetNotFound(id),
            other => RunError::LaunchError(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Start a backup of a target now
///
/// Returns as soon as the run record exists; the run itself continues in
/// the background.
pub async fn start_run(pool: &PgPool, launcher: &RunLauncher, target_id: Uuid) -> Result<LaunchedRun> {
    let target = target_repository::find_by_id(pool, target_id)
        .await?
        .ok_or(RunError::TargetNotFound(target_id))?;

    let run_id = launcher.launch(target).await?;

    tracing::info!("Run {} started for target {}", run_id, target_id);

    Ok(LaunchedRun { run_id })
}

/// Get a run by ID
pub async fn get_run(pool: &PgPool, id: Uuid) -> Result<BackupRun> {
    let run = run_repository::find_by_id(pool, id)
        .await?
        .ok_or(RunError::NotFound(id))?;

    Ok(run)
}

/// List the runs of a target, newest first
pub async fn list_runs_for_target(pool: &PgPool, target_id: Uuid) -> Result<Vec<BackupRun>> {
    target_repository::find_by_id(pool, target_id)
        .await?
        .ok_or(RunError::TargetNotFound(target_id))?;

    let runs = run_repository::list_by_target(pool, target_id).await?;
    Ok(runs)
}
