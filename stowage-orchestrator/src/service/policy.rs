//! Policy Service
//!
//! Business logic for schedule policies. Schedules are validated when a policy
//! is written, and every write is mirrored into the scheduler.

use sqlx::PgPool;
use stowage_core::domain::policy::SchedulePolicy;
use stowage_core::dto::policy::PolicyRequest;
use stowage_runner::cron::schedule_to_cron;
use stowage_runner::{BackupError, BackupScheduler};
use uuid::Uuid;

use crate::repository::{policy_repository, target_repository};

/// Service error type
#[derive(Debug)]
pub enum PolicyError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    SchedulerError(BackupError),
}

impl From<sqlx::Error> for PolicyError {
    fn from(err: sqlx::Error) -> Self {
        PolicyError::DatabaseError(err)
    }
}

impl From<BackupError> for PolicyError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::PolicyNotFound(id) => PolicyError::NotFound(id),
            BackupError::ScheduleValidationFailed(msg) => PolicyError::ValidationError(msg),
            other => PolicyError::SchedulerError(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;

/// Create a policy and register its trigger
pub async fn create_policy(
    pool: &PgPool,
    scheduler: &BackupScheduler,
    req: PolicyRequest,
) -> Result<SchedulePolicy> {
    let req = prepare_request(pool, req).await?;

    let policy = policy_repository::create(pool, req).await?;
    scheduler.schedule_one(policy.id).await?;

    tracing::info!("Policy created: {} ({})", policy.id, policy.kind);

    get_policy(pool, policy.id).await
}

/// Get a policy by ID
pub async fn get_policy(pool: &PgPool, id: Uuid) -> Result<SchedulePolicy> {
    let policy = policy_repository::find_by_id(pool, id)
        .await?
        .ok_or(PolicyError::NotFound(id))?;

    Ok(policy)
}

/// List all policies
pub async fn list_policies(pool: &PgPool) -> Result<Vec<SchedulePolicy>> {
    let policies = policy_repository::list_all(pool).await?;
    Ok(policies)
}

/// Replace a policy and re-register its trigger
///
/// Disabling a policy removes its trigger.
pub async fn update_policy(
    pool: &PgPool,
    scheduler: &BackupScheduler,
    id: Uuid,
    req: PolicyRequest,
) -> Result<SchedulePolicy> {
    let req = prepare_request(pool, req).await?;

    let updated = policy_repository::update(pool, id, req).await?;

    if !updated {
        return Err(PolicyError::NotFound(id));
    }

    scheduler.schedule_one(id).await?;

    tracing::info!("Policy updated: {}", id);

    get_policy(pool, id).await
}

/// Delete a policy and stop its trigger
pub async fn delete_policy(pool: &PgPool, scheduler: &BackupScheduler, id: Uuid) -> Result<()> {
    scheduler.stop_one(id).await?;

    let deleted = policy_repository::delete(pool, id).await?;

    if !deleted {
        return Err(PolicyError::NotFound(id));
    }

    tracing::info!("Policy deleted: {}", id);

    Ok(())
}

/// Fire a policy immediately; returns the number of runs started
pub async fn run_policy_now(scheduler: &BackupScheduler, id: Uuid) -> Result<usize> {
    let launched = scheduler.run_now(id).await?;

    tracing::info!("Policy {} run manually, {} run(s) started", id, launched);

    Ok(launched)
}

// =============================================================================
// Validation
// =============================================================================

/// Validates the request and stores the derived expression on it
async fn prepare_request(pool: &PgPool, req: PolicyRequest) -> Result<PolicyRequest> {
    let req = normalize_policy_request(req)?;

    if let Some(target_id) = req.target_id {
        target_repository::find_by_id(pool, target_id)
            .await?
            .ok_or_else(|| PolicyError::ValidationError(format!("Target {} not found", target_id)))?;
    }

    Ok(req)
}

fn normalize_policy_request(mut req: PolicyRequest) -> Result<PolicyRequest> {
    let expr = schedule_to_cron(
        req.kind,
        req.time_of_day.as_deref(),
        req.day_of_week,
        req.day_of_month,
        req.cron_expression.as_deref(),
    )
    .map_err(|e| PolicyError::ValidationError(e.to_string()))?;

    req.cron_expression = Some(expr);
    Ok(req)
}
