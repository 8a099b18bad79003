//! PostgreSQL backend for the engine's store traits

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stowage_core::domain::policy::SchedulePolicy;
use stowage_core::domain::run::{BackupRun, RunStatus};
use stowage_core::domain::target::Target;
use stowage_runner::repository::{
    PolicyRepository, RunRepository, SettingsRepository, TargetRepository,
};
use uuid::Uuid;

use super::{policy_repository, run_repository, settings_repository, target_repository};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TargetRepository for PgStore {
    async fn find_target(&self, id: Uuid) -> Result<Option<Target>> {
        target_repository::find_by_id(&self.pool, id)
            .await
            .with_context(|| format!("Failed to load target {}", id))
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        target_repository::list_all(&self.pool)
            .await
            .context("Failed to list targets")
    }
}

#[async_trait]
impl RunRepository for PgStore {
    async fn create_run(&self, target_id: Uuid) -> Result<BackupRun> {
        run_repository::create(&self.pool, target_id)
            .await
            .with_context(|| format!("Failed to create run for target {}", target_id))
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<BackupRun>> {
        run_repository::find_by_id(&self.pool, id)
            .await
            .with_context(|| format!("Failed to load run {}", id))
    }

    async fn update_status(&self, id: Uuid, status: RunStatus) -> Result<()> {
        let updated = run_repository::update_status(&self.pool, id, status)
            .await
            .with_context(|| format!("Failed to set run {} to {}", id, status))?;

        if !updated {
            bail!("run {} is missing or already finished", id);
        }
        Ok(())
    }

    async fn append_log(&self, id: Uuid, line: &str) -> Result<()> {
        let appended = run_repository::append_log(&self.pool, id, line)
            .await
            .with_context(|| format!("Failed to append to log of run {}", id))?;

        if !appended {
            bail!("run {} is missing or already finished", id);
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyRepository for PgStore {
    async fn find_policy(&self, id: Uuid) -> Result<Option<SchedulePolicy>> {
        policy_repository::find_by_id(&self.pool, id)
            .await
            .with_context(|| format!("Failed to load policy {}", id))
    }

    async fn list_enabled_policies(&self) -> Result<Vec<SchedulePolicy>> {
        policy_repository::list_enabled(&self.pool)
            .await
            .context("Failed to list enabled policies")
    }

    async fn save_schedule(
        &self,
        id: Uuid,
        cron_expression: &str,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if !policy_repository::save_schedule(&self.pool, id, cron_expression, next_run)
            .await
            .with_context(|| format!("Failed to save schedule of policy {}", id))?
        {
            bail!("policy {} not found", id);
        }
        Ok(())
    }

    async fn record_run(
        &self,
        id: Uuid,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if !policy_repository::record_run(&self.pool, id, last_run, next_run)
            .await
            .with_context(|| format!("Failed to record run of policy {}", id))?
        {
            bail!("policy {} not found", id);
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for PgStore {
    async fn default_backup_path(&self) -> Result<Option<String>> {
        settings_repository::get(&self.pool, settings_repository::DEFAULT_BACKUP_PATH)
            .await
            .context("Failed to read default backup path")
    }
}
