//! Detached run launching with a per-target guard

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use stowage_core::domain::target::Target;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{BackupError, Result};
use crate::repository::RunRepository;
use crate::service::BackupExecutor;

type ActiveTargets = Arc<Mutex<HashSet<Uuid>>>;

/// Starts executor runs in the background
///
/// At most one run per target is in flight at any time. A second launch for a
/// busy target is refused before any run record is written.
#[derive(Clone)]
pub struct RunLauncher {
    executor: Arc<BackupExecutor>,
    runs: Arc<dyn RunRepository>,
    active: ActiveTargets,
}

impl RunLauncher {
    pub fn new(executor: Arc<BackupExecutor>, runs: Arc<dyn RunRepository>) -> Self {
        Self {
            executor,
            runs,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Creates a pending run for `target` and starts it without waiting
    pub async fn launch(&self, target: Target) -> Result<Uuid> {
        let guard = RunGuard::claim(&self.active, target.id)?;
        let run = self.runs.create_run(target.id).await?;
        let run_id = run.id;

        debug!("Launching run {} for target {}", run_id, target.id);

        let executor = self.executor.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = executor.execute(&target, run_id).await {
                error!(
                    "Backup run {} for {} ended with error: {}",
                    run_id,
                    target.display_name(),
                    e
                );
            }
        });

        Ok(run_id)
    }

    pub fn is_busy(&self, target_id: Uuid) -> bool {
        lock(&self.active).contains(&target_id)
    }

    /// Targets with a run in flight
    pub fn active_targets(&self) -> Vec<Uuid> {
        lock(&self.active).iter().copied().collect()
    }
}

/// Marks a target busy until dropped
struct RunGuard {
    active: ActiveTargets,
    target_id: Uuid,
}

impl RunGuard {
    fn claim(active: &ActiveTargets, target_id: Uuid) -> Result<Self> {
        if !lock(active).insert(target_id) {
            return Err(BackupError::TargetBusy(target_id));
        }

        Ok(Self {
            active: active.clone(),
            target_id,
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.target_id);
    }
}

fn lock(active: &ActiveTargets) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}
