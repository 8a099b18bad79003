//! Target Service
//!
//! Business logic for backup target management.

use sqlx::PgPool;
use stowage_core::domain::target::Target;
use stowage_core::dto::target::CreateTarget;
use stowage_runner::BackupScheduler;
use stowage_runner::command::{check_host, check_identifier, check_path};
use uuid::Uuid;

use crate::repository::{policy_repository, target_repository};

/// Service error type
#[derive(Debug)]
pub enum TargetError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for TargetError {
    fn from(err: sqlx::Error) -> Self {
        TargetError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, TargetError>;

/// Register a new target
pub async fn create_target(pool: &PgPool, req: CreateTarget) -> Result<Target> {
    validate_target_request(&req)?;

    let target = target_repository::create(pool, req).await?;

    tracing::info!("Target created: {} ({})", target.display_name(), target.id);

    Ok(target)
}

/// Get a target by ID
pub async fn get_target(pool: &PgPool, id: Uuid) -> Result<Target> {
    let target = target_repository::find_by_id(pool, id)
        .await?
        .ok_or(TargetError::NotFound(id))?;

    Ok(target)
}

/// List all targets
pub async fn list_targets(pool: &PgPool) -> Result<Vec<Target>> {
    let targets = target_repository::list_all(pool).await?;
    Ok(targets)
}

/// Delete a target together with its policies and their triggers
///
/// Runs already in flight are left to finish.
pub async fn delete_target(pool: &PgPool, scheduler: &BackupScheduler, id: Uuid) -> Result<()> {
    let policies: Vec<Uuid> = policy_repository::list_all(pool)
        .await?
        .into_iter()
        .filter(|p| p.target_id == Some(id))
        .map(|p| p.id)
        .collect();

    let deleted = target_repository::delete(pool, id).await?;

    if !deleted {
        return Err(TargetError::NotFound(id));
    }

    for policy_id in policies {
        if let Err(e) = scheduler.stop_one(policy_id).await {
            tracing::warn!("Failed to stop trigger for policy {}: {}", policy_id, e);
        }
    }

    tracing::info!("Target deleted: {}", id);

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_target_request(req: &CreateTarget) -> Result<()> {
    let invalid = |msg: String| Err(TargetError::ValidationError(msg));

    if let Some(name) = &req.name {
        if name.len() > 255 {
            return invalid("Target name is too long (max 255 characters)".to_string());
        }
    }

    if req.host.trim().is_empty() {
        return invalid("Host cannot be empty".to_string());
    }

    if check_host(&req.host).is_err() {
        return invalid(format!("Invalid host: {}", req.host));
    }

    if check_host(&req.username).is_err() {
        return invalid(format!("Invalid username: {:?}", req.username));
    }

    if req.port == 0 {
        return invalid("Port must be greater than 0".to_string());
    }

    if let Some(key) = req.private_key_path.as_deref().filter(|k| !k.is_empty()) {
        if check_path(key).is_err() {
            return invalid(format!("Invalid private key path: {}", key));
        }
    }

    for path in req.custom_paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !path.starts_with('/') || check_path(path).is_err() {
            return invalid(format!("Invalid custom path: {}", path));
        }
    }

    if let Some(host) = req.db_host.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        if check_host(host).is_err() {
            return invalid(format!("Invalid database host: {}", host));
        }
    }

    if let Some(user) = req.db_user.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        if check_host(user).is_err() {
            return invalid(format!("Invalid database user: {}", user));
        }
    }

    for name in req.db_names.iter().flatten() {
        if check_identifier(name.trim()).is_err() {
            return invalid(format!("Invalid database name: {}", name));
        }
    }

    Ok(())
}
