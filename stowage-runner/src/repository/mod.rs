//! Repository layer
//!
//! Repositories abstract the persistent store the engine reads targets and
//! policies from and writes run records to. The orchestrator provides the
//! PostgreSQL implementation; `MemoryStore` backs the engine's tests.
//!
//! All repositories are trait-based to enable testing and mocking.

#[cfg(test)]
mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use stowage_core::domain::policy::SchedulePolicy;
use stowage_core::domain::run::{BackupRun, RunStatus};
use stowage_core::domain::target::Target;
use uuid::Uuid;

#[cfg(test)]
pub use memory::MemoryStore;

/// Read access to target specifications
#[async_trait]
pub trait TargetRepository: Send + Sync {
    async fn find_target(&self, id: Uuid) -> Result<Option<Target>>;

    async fn list_targets(&self) -> Result<Vec<Target>>;
}

/// Run record persistence
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Creates a run record with status `pending` and an empty log
    async fn create_run(&self, target_id: Uuid) -> Result<BackupRun>;

    async fn find_run(&self, id: Uuid) -> Result<Option<BackupRun>>;

    async fn update_status(&self, id: Uuid, status: RunStatus) -> Result<()>;

    /// Appends one line to the run's log (read current text, append, write back)
    async fn append_log(&self, id: Uuid, line: &str) -> Result<()>;
}

/// Schedule policy persistence as seen by the scheduler
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn find_policy(&self, id: Uuid) -> Result<Option<SchedulePolicy>>;

    async fn list_enabled_policies(&self) -> Result<Vec<SchedulePolicy>>;

    /// Persists the computed expression and next-run estimate after registration
    async fn save_schedule(
        &self,
        id: Uuid,
        cron_expression: &str,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Records that a trigger fired
    async fn record_run(
        &self,
        id: Uuid,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Global settings
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Default local storage root for targets without a dedicated path
    async fn default_backup_path(&self) -> Result<Option<String>>;
}

/// The set of repositories the engine works against
#[derive(Clone)]
pub struct Stores {
    pub targets: Arc<dyn TargetRepository>,
    pub runs: Arc<dyn RunRepository>,
    pub policies: Arc<dyn PolicyRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Stores {
    /// Uses one backend for every repository
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TargetRepository + RunRepository + PolicyRepository + SettingsRepository + 'static,
    {
        Self {
            targets: store.clone(),
            runs: store.clone(),
            policies: store.clone(),
            settings: store,
        }
    }
}
