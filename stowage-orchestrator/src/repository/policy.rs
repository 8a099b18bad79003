//! Policy Repository
//!
//! Handles all database operations related to schedule policies.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stowage_core::domain::policy::{SchedulePolicy, ScheduleKind};
use stowage_core::dto::policy::PolicyRequest;
use uuid::Uuid;

const COLUMNS: &str = r#"
    id, target_id, kind, time_of_day, day_of_week, day_of_month,
    cron_expression, enabled, last_run, next_run, created_at, updated_at
"#;

/// Create a new policy in the database
pub async fn create(pool: &PgPool, req: PolicyRequest) -> Result<SchedulePolicy, sqlx::Error> {
    let now = Utc::now();

    let policy = SchedulePolicy {
        id: Uuid::new_v4(),
        target_id: req.target_id,
        kind: req.kind,
        time_of_day: req.time_of_day,
        day_of_week: req.day_of_week,
        day_of_month: req.day_of_month,
        cron_expression: req.cron_expression,
        enabled: req.enabled,
        last_run: None,
        next_run: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO schedule_policies ({}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        COLUMNS
    ))
    .bind(policy.id)
    .bind(policy.target_id)
    .bind(policy.kind.as_str())
    .bind(&policy.time_of_day)
    .bind(policy.day_of_week.map(i16::from))
    .bind(policy.day_of_month.map(i16::from))
    .bind(&policy.cron_expression)
    .bind(policy.enabled)
    .bind(policy.last_run)
    .bind(policy.next_run)
    .bind(policy.created_at)
    .bind(policy.updated_at)
    .execute(pool)
    .await?;

    Ok(policy)
}

/// Find a policy by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<SchedulePolicy>, sqlx::Error> {
    let row = sqlx::query_as::<_, PolicyRow>(&format!(
        "SELECT {} FROM schedule_policies WHERE id = $1",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all policies
pub async fn list_all(pool: &PgPool) -> Result<Vec<SchedulePolicy>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PolicyRow>(&format!(
        "SELECT {} FROM schedule_policies ORDER BY created_at ASC",
        COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// List enabled policies
pub async fn list_enabled(pool: &PgPool) -> Result<Vec<SchedulePolicy>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PolicyRow>(&format!(
        "SELECT {} FROM schedule_policies WHERE enabled = TRUE ORDER BY created_at ASC",
        COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Replace the schedule parameters of a policy
pub async fn update(pool: &PgPool, id: Uuid, req: PolicyRequest) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE schedule_policies
        SET target_id = $1, kind = $2, time_of_day = $3, day_of_week = $4,
            day_of_month = $5, cron_expression = $6, enabled = $7, updated_at = $8
        WHERE id = $9
        "#,
    )
    .bind(req.target_id)
    .bind(req.kind.as_str())
    .bind(&req.time_of_day)
    .bind(req.day_of_week.map(i16::from))
    .bind(req.day_of_month.map(i16::from))
    .bind(&req.cron_expression)
    .bind(req.enabled)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a policy by ID
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM schedule_policies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Store the registered expression and the next-run estimate
pub async fn save_schedule(
    pool: &PgPool,
    id: Uuid,
    cron_expression: &str,
    next_run: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE schedule_policies
        SET cron_expression = $1, next_run = $2, updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(cron_expression)
    .bind(next_run)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record that the policy fired
pub async fn record_run(
    pool: &PgPool,
    id: Uuid,
    last_run: DateTime<Utc>,
    next_run: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE schedule_policies SET last_run = $1, next_run = $2 WHERE id = $3",
    )
    .bind(last_run)
    .bind(next_run)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PolicyRow {
    id: Uuid,
    target_id: Option<Uuid>,
    kind: String,
    time_of_day: Option<String>,
    day_of_week: Option<i16>,
    day_of_month: Option<i16>,
    cron_expression: Option<String>,
    enabled: bool,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PolicyRow> for SchedulePolicy {
    fn from(row: PolicyRow) -> Self {
        let kind = row.kind.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown schedule kind '{}' on policy {}", row.kind, row.id);
            ScheduleKind::Custom
        });

        SchedulePolicy {
            id: row.id,
            target_id: row.target_id,
            kind,
            time_of_day: row.time_of_day,
            day_of_week: row.day_of_week.map(|d| d as u8),
            day_of_month: row.day_of_month.map(|d| d as u8),
            cron_expression: row.cron_expression,
            enabled: row.enabled,
            last_run: row.last_run,
            next_run: row.next_run,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
