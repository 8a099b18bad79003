//! Target Repository
//!
//! Handles all database operations related to backup targets.

use sqlx::PgPool;
use stowage_core::domain::target::Target;
use stowage_core::dto::target::CreateTarget;
use uuid::Uuid;

const COLUMNS: &str = r#"
    id, name, host, port, username, password, private_key_path, local_path,
    custom_paths, backup_www, backup_logs, backup_nginx, backup_db,
    db_host, db_port, db_user, db_password, db_names, created_at, updated_at
"#;

/// Create a new target in the database
pub async fn create(pool: &PgPool, req: CreateTarget) -> Result<Target, sqlx::Error> {
    let now = chrono::Utc::now();

    let target = Target {
        id: Uuid::new_v4(),
        name: req.name,
        host: req.host,
        port: req.port,
        username: req.username,
        password: req.password,
        private_key_path: req.private_key_path,
        local_path: req.local_path,
        custom_paths: req.custom_paths,
        backup_www: req.backup_www,
        backup_logs: req.backup_logs,
        backup_nginx: req.backup_nginx,
        backup_db: req.backup_db,
        db_host: req.db_host,
        db_port: req.db_port,
        db_user: req.db_user,
        db_password: req.db_password,
        db_names: req.db_names,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO targets ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
         $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        COLUMNS
    ))
    .bind(target.id)
    .bind(&target.name)
    .bind(&target.host)
    .bind(target.port as i32)
    .bind(&target.username)
    .bind(&target.password)
    .bind(&target.private_key_path)
    .bind(&target.local_path)
    .bind(&target.custom_paths)
    .bind(target.backup_www)
    .bind(target.backup_logs)
    .bind(target.backup_nginx)
    .bind(target.backup_db)
    .bind(&target.db_host)
    .bind(target.db_port.map(i32::from))
    .bind(&target.db_user)
    .bind(&target.db_password)
    .bind(&target.db_names)
    .bind(target.created_at)
    .bind(target.updated_at)
    .execute(pool)
    .await?;

    Ok(target)
}

/// Find a target by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Target>, sqlx::Error> {
    let row = sqlx::query_as::<_, TargetRow>(&format!(
        "SELECT {} FROM targets WHERE id = $1",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all targets, oldest first
pub async fn list_all(pool: &PgPool) -> Result<Vec<Target>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TargetRow>(&format!(
        "SELECT {} FROM targets ORDER BY created_at ASC",
        COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Delete a target by ID; its runs and policies go with it
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM targets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TargetRow {
    id: Uuid,
    name: Option<String>,
    host: String,
    port: i32,
    username: String,
    password: Option<String>,
    private_key_path: Option<String>,
    local_path: Option<String>,
    custom_paths: Vec<String>,
    backup_www: bool,
    backup_logs: bool,
    backup_nginx: bool,
    backup_db: bool,
    db_host: Option<String>,
    db_port: Option<i32>,
    db_user: Option<String>,
    db_password: Option<String>,
    db_names: Option<Vec<String>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<TargetRow> for Target {
    fn from(row: TargetRow) -> Self {
        Target {
            id: row.id,
            name: row.name,
            host: row.host,
            port: row.port as u16,
            username: row.username,
            password: row.password,
            private_key_path: row.private_key_path,
            local_path: row.local_path,
            custom_paths: row.custom_paths,
            backup_www: row.backup_www,
            backup_logs: row.backup_logs,
            backup_nginx: row.backup_nginx,
            backup_db: row.backup_db,
            db_host: row.db_host,
            db_port: row.db_port.map(|p| p as u16),
            db_user: row.db_user,
            db_password: row.db_password,
            db_names: row.db_names,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
