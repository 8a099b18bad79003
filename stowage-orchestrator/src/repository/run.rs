//! Run Repository
//!
//! Handles all database operations related to backup runs. Terminal runs
//! (`success`, `failed`) are never updated again.

use sqlx::PgPool;
use stowage_core::domain::run::{BackupRun, RunStatus};
use uuid::Uuid;

/// Create a new pending run for a target
pub async fn create(pool: &PgPool, target_id: Uuid) -> Result<BackupRun, sqlx::Error> {
    let now = chrono::Utc::now();

    let run = BackupRun {
        id: Uuid::new_v4(),
        target_id,
        status: RunStatus::Pending,
        log: String::new(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO backup_runs (id, target_id, status, log, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(run.id)
    .bind(run.target_id)
    .bind(run.status.as_str())
    .bind(&run.log)
    .bind(run.created_at)
    .bind(run.updated_at)
    .execute(pool)
    .await?;

    Ok(run)
}

/// Find a run by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<BackupRun>, sqlx::Error> {
    let row = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT id, target_id, status, log, created_at, updated_at
        FROM backup_runs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List runs for a target, newest first
pub async fn list_by_target(pool: &PgPool, target_id: Uuid) -> Result<Vec<BackupRun>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RunRow>(
        r#"
        SELECT id, target_id, status, log, created_at, updated_at
        FROM backup_runs
        WHERE target_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(target_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Set the status of a non-terminal run
///
/// Returns false when the run does not exist or is already terminal.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: RunStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE backup_runs
        SET status = $1, updated_at = $2
        WHERE id = $3 AND status NOT IN ('success', 'failed')
        "#,
    )
    .bind(status.as_str())
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Append one line to the log of a non-terminal run
///
/// Reads the current text, appends and writes it back inside a transaction
/// holding the row lock. Returns false when the run does not exist or is
/// already terminal.
pub async fn append_log(pool: &PgPool, id: Uuid, line: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let current: Option<(String, String)> =
        sqlx::query_as("SELECT log, status FROM backup_runs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((mut log, status)) = current else {
        return Ok(false);
    };

    if parse_status(&status).is_terminal() {
        return Ok(false);
    }

    log.push_str(line);
    log.push('\n');

    sqlx::query("UPDATE backup_runs SET log = $1, updated_at = $2 WHERE id = $3")
        .bind(&log)
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

fn parse_status(raw: &str) -> RunStatus {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown run status '{}', treating as failed", raw);
        RunStatus::Failed
    })
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    target_id: Uuid,
    status: String,
    log: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<RunRow> for BackupRun {
    fn from(row: RunRow) -> Self {
        BackupRun {
            id: row.id,
            target_id: row.target_id,
            status: parse_status(&row.status),
            log: row.log,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
