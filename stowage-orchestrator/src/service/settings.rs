//! Settings Service
//!
//! The global default local backup root, used for targets without their own.

use sqlx::PgPool;
use stowage_runner::command::check_path;

use crate::repository::settings_repository::{self, DEFAULT_BACKUP_PATH};

/// Service error type
#[derive(Debug)]
pub enum SettingsError {
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for SettingsError {
    fn from(err: sqlx::Error) -> Self {
        SettingsError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;

pub async fn get_default_backup_path(pool: &PgPool) -> Result<Option<String>> {
    let path = settings_repository::get(pool, DEFAULT_BACKUP_PATH).await?;
    Ok(path)
}

/// Set or clear the default backup path; an empty path clears it
pub async fn set_default_backup_path(pool: &PgPool, path: Option<String>) -> Result<Option<String>> {
    let path = validate_backup_path(path)?;

    match &path {
        Some(path) => {
            settings_repository::set(pool, DEFAULT_BACKUP_PATH, path).await?;
            tracing::info!("Default backup path set to {}", path);
        }
        None => {
            settings_repository::delete(pool, DEFAULT_BACKUP_PATH).await?;
            tracing::info!("Default backup path cleared");
        }
    }

    Ok(path)
}

fn validate_backup_path(path: Option<String>) -> Result<Option<String>> {
    let Some(path) = path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    if !(path.starts_with('/') || path.starts_with('~')) || check_path(&path).is_err() {
        return Err(SettingsError::ValidationError(format!(
            "Invalid backup path: {}",
            path
        )));
    }

    Ok(Some(path))
}
