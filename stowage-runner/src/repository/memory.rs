//! In-memory store for tests
//!
//! Implements every repository trait over mutex-guarded maps. Enforces the
//! same rule the SQL store does: terminal runs are never mutated.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use stowage_core::domain::policy::SchedulePolicy;
use stowage_core::domain::run::{BackupRun, RunStatus};
use stowage_core::domain::target::Target;
use uuid::Uuid;

use super::{PolicyRepository, RunRepository, SettingsRepository, TargetRepository};

#[derive(Default)]
pub struct MemoryStore {
    targets: Mutex<HashMap<Uuid, Target>>,
    runs: Mutex<HashMap<Uuid, BackupRun>>,
    policies: Mutex<HashMap<Uuid, SchedulePolicy>>,
    default_backup_path: Mutex<Option<String>>,
    fail_log_appends: AtomicBool,
    rejected_status: Mutex<Option<RunStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_target(&self, target: Target) {
        self.targets.lock().unwrap().insert(target.id, target);
    }

    pub fn insert_policy(&self, policy: SchedulePolicy) {
        self.policies.lock().unwrap().insert(policy.id, policy);
    }

    pub fn remove_policy(&self, id: Uuid) {
        self.policies.lock().unwrap().remove(&id);
    }

    pub fn set_default_backup_path(&self, path: Option<String>) {
        *self.default_backup_path.lock().unwrap() = path;
    }

    /// Makes every `append_log` call fail, to exercise best-effort logging
    pub fn fail_log_appends(&self, fail: bool) {
        self.fail_log_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes `update_status` fail whenever it is asked to set `status`
    pub fn reject_status(&self, status: Option<RunStatus>) {
        *self.rejected_status.lock().unwrap() = status;
    }

    pub fn run(&self, id: Uuid) -> Option<BackupRun> {
        self.runs.lock().unwrap().get(&id).cloned()
    }

    pub fn runs_for_target(&self, target_id: Uuid) -> Vec<BackupRun> {
        let mut runs: Vec<BackupRun> = self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.target_id == target_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        runs
    }

    pub fn policy(&self, id: Uuid) -> Option<SchedulePolicy> {
        self.policies.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl TargetRepository for MemoryStore {
    async fn find_target(&self, id: Uuid) -> Result<Option<Target>> {
        Ok(self.targets.lock().unwrap().get(&id).cloned())
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        let mut targets: Vec<Target> = self.targets.lock().unwrap().values().cloned().collect();
        targets.sort_by_key(|t| t.created_at);
        Ok(targets)
    }
}

#[async_trait]
impl RunRepository for MemoryStore {
    async fn create_run(&self, target_id: Uuid) -> Result<BackupRun> {
        let now = Utc::now();
        let run = BackupRun {
            id: Uuid::new_v4(),
            target_id,
            status: RunStatus::Pending,
            log: String::new(),
            created_at: now,
            updated_at: now,
        };

        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(run)
    }

    async fn find_run(&self, id: Uuid) -> Result<Option<BackupRun>> {
        Ok(self.run(id))
    }

    async fn update_status(&self, id: Uuid, status: RunStatus) -> Result<()> {
        if *self.rejected_status.lock().unwrap() == Some(status) {
            bail!("status store unavailable");
        }

        let mut runs = self.runs.lock().unwrap();
        let Some(run) = runs.get_mut(&id) else {
            bail!("run {} not found", id);
        };

        if run.status.is_terminal() {
            bail!("run {} is already {}", id, run.status);
        }

        run.status = status;
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn append_log(&self, id: Uuid, line: &str) -> Result<()> {
        if self.fail_log_appends.load(Ordering::SeqCst) {
            bail!("log store unavailable");
        }

        let mut runs = self.runs.lock().unwrap();
        let Some(run) = runs.get_mut(&id) else {
            bail!("run {} not found", id);
        };

        if run.status.is_terminal() {
            bail!("run {} is already {}", id, run.status);
        }

        run.log.push_str(line);
        run.log.push('\n');
        run.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PolicyRepository for MemoryStore {
    async fn find_policy(&self, id: Uuid) -> Result<Option<SchedulePolicy>> {
        Ok(self.policy(id))
    }

    async fn list_enabled_policies(&self) -> Result<Vec<SchedulePolicy>> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.enabled)
            .cloned()
            .collect())
    }

    async fn save_schedule(
        &self,
        id: Uuid,
        cron_expression: &str,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut policies = self.policies.lock().unwrap();
        let Some(policy) = policies.get_mut(&id) else {
            bail!("policy {} not found", id);
        };

        policy.cron_expression = Some(cron_expression.to_string());
        policy.next_run = next_run;
        policy.updated_at = Utc::now();
        Ok(())
    }

    async fn record_run(
        &self,
        id: Uuid,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut policies = self.policies.lock().unwrap();
        let Some(policy) = policies.get_mut(&id) else {
            bail!("policy {} not found", id);
        };

        policy.last_run = Some(last_run);
        policy.next_run = next_run;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn default_backup_path(&self) -> Result<Option<String>> {
        Ok(self.default_backup_path.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminal_runs_are_frozen() {
        let store = MemoryStore::new();
        let run = store.create_run(Uuid::new_v4()).await.unwrap();
        assert_eq!(run.status, RunStatus::Pending);

        store.append_log(run.id, "first").await.unwrap();
        store.update_status(run.id, RunStatus::Failed).await.unwrap();

        assert!(store.append_log(run.id, "late").await.is_err());
        assert!(store.update_status(run.id, RunStatus::Success).await.is_err());
        assert_eq!(store.run(run.id).unwrap().log, "first\n");
    }
}
