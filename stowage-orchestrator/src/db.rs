use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Backup targets
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS targets (
            id UUID PRIMARY KEY,
            name VARCHAR(255),
            host VARCHAR(255) NOT NULL,
            port INTEGER NOT NULL DEFAULT 22,
            username VARCHAR(255) NOT NULL,
            password TEXT,
            private_key_path TEXT,
            local_path TEXT,
            custom_paths TEXT[] NOT NULL DEFAULT '{}',
            backup_www BOOLEAN NOT NULL DEFAULT FALSE,
            backup_logs BOOLEAN NOT NULL DEFAULT FALSE,
            backup_nginx BOOLEAN NOT NULL DEFAULT FALSE,
            backup_db BOOLEAN NOT NULL DEFAULT FALSE,
            db_host VARCHAR(255),
            db_port INTEGER,
            db_user VARCHAR(255),
            db_password TEXT,
            db_names TEXT[],
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Run records
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backup_runs (
            id UUID PRIMARY KEY,
            target_id UUID NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
            status VARCHAR(20) NOT NULL,
            log TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Schedule policies; a NULL target means every target
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedule_policies (
            id UUID PRIMARY KEY,
            target_id UUID REFERENCES targets(id) ON DELETE CASCADE,
            kind VARCHAR(20) NOT NULL,
            time_of_day VARCHAR(5),
            day_of_week SMALLINT,
            day_of_month SMALLINT,
            cron_expression VARCHAR(255),
            enabled BOOLEAN NOT NULL DEFAULT TRUE,
            last_run TIMESTAMPTZ,
            next_run TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key VARCHAR(255) PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_backup_runs_target_id ON backup_runs(target_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_backup_runs_status ON backup_runs(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_schedule_policies_enabled ON schedule_policies(enabled)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
