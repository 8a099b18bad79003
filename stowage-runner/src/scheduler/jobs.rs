//! Policy triggers
//!
//! Each enabled policy owns one job in a [`JobScheduler`]; the registry maps
//! policy ids to job ids. Firing a trigger launches runs without waiting for
//! them, so a slow backup never delays other policies.

use chrono::{DateTime, Local, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cron::{policy_cron, to_trigger_expression};
use crate::error::{BackupError, Result};
use crate::repository::{PolicyRepository, Stores, TargetRepository};
use crate::service::RunLauncher;

/// What a fired trigger needs
#[derive(Clone)]
struct Dispatcher {
    policies: Arc<dyn PolicyRepository>,
    targets: Arc<dyn TargetRepository>,
    launcher: RunLauncher,
}

impl Dispatcher {
    /// Launches one run per affected target, returning how many started
    ///
    /// Busy targets are skipped. Records `last_run` once every launch has been
    /// issued.
    async fn dispatch(&self, policy_id: Uuid, next_run: Option<DateTime<Utc>>) -> Result<usize> {
        let policy = self
            .policies
            .find_policy(policy_id)
            .await?
            .ok_or(BackupError::PolicyNotFound(policy_id))?;

        let targets = match policy.target_id {
            Some(target_id) => vec![
                self.targets
                    .find_target(target_id)
                    .await?
                    .ok_or(BackupError::TargetNotFound(target_id))?,
            ],
            None => self.targets.list_targets().await?,
        };

        let mut launched = 0;
        for target in targets {
            let name = target.display_name();
            match self.launcher.launch(target).await {
                Ok(run_id) => {
                    info!("Policy {} started run {} for {}", policy_id, run_id, name);
                    launched += 1;
                }
                Err(BackupError::TargetBusy(_)) => {
                    warn!("Policy {} skipped {}: a backup is already running", policy_id, name);
                }
                Err(e) => {
                    error!("Policy {} could not start a run for {}: {}", policy_id, name, e);
                }
            }
        }

        self.policies
            .record_run(policy_id, Utc::now(), next_run)
            .await?;

        Ok(launched)
    }

    /// Body of a fired trigger
    ///
    /// Failures are logged and swallowed; the trigger stays registered.
    async fn fire(&self, policy_id: Uuid, job_id: Uuid, scheduler: JobScheduler) {
        debug!("Trigger fired for policy {}", policy_id);
        let next_run = next_tick(&scheduler, job_id).await;
        if let Err(e) = self.dispatch(policy_id, next_run).await {
            error!("Scheduled run for policy {} failed: {}", policy_id, e);
        }
    }
}

/// Cron-driven launcher for schedule policies
pub struct BackupScheduler {
    scheduler: JobScheduler,
    registry: Mutex<HashMap<Uuid, Uuid>>,
    dispatcher: Dispatcher,
}

impl BackupScheduler {
    pub async fn new(stores: &Stores, launcher: RunLauncher) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            registry: Mutex::new(HashMap::new()),
            dispatcher: Dispatcher {
                policies: stores.policies.clone(),
                targets: stores.targets.clone(),
                launcher,
            },
        })
    }

    /// Starts firing registered triggers
    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        info!("Backup scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.stop_all().await?;
        self.scheduler.clone().shutdown().await?;
        info!("Backup scheduler stopped");
        Ok(())
    }

    /// Replaces every trigger with one per enabled policy in the store
    ///
    /// A policy that cannot be registered is logged and skipped. Returns the
    /// number of policies registered.
    pub async fn load_all(&self) -> Result<usize> {
        self.stop_all().await?;

        let policies = self.dispatcher.policies.list_enabled_policies().await?;
        let mut loaded = 0;

        for policy in &policies {
            match self.schedule_one(policy.id).await {
                Ok(_) => loaded += 1,
                Err(e) => {
                    let e = BackupError::PolicyLoadFailed {
                        policy_id: policy.id,
                        reason: e.to_string(),
                    };
                    warn!("{}", e);
                }
            }
        }

        info!("Loaded {} of {} enabled schedule policies", loaded, policies.len());
        Ok(loaded)
    }

    /// Registers (or re-registers) the trigger for one policy
    ///
    /// Any existing trigger for the policy is removed first. Disabled policies
    /// end up with no trigger. Returns the next-run estimate.
    pub async fn schedule_one(&self, policy_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let mut registry = self.registry.lock().await;

        if let Some(job_id) = registry.remove(&policy_id) {
            self.scheduler.remove(&job_id).await?;
            debug!("Removed previous trigger for policy {}", policy_id);
        }

        let policy = self
            .dispatcher
            .policies
            .find_policy(policy_id)
            .await?
            .ok_or(BackupError::PolicyNotFound(policy_id))?;

        if !policy.enabled {
            info!("Policy {} is disabled, not scheduling", policy_id);
            return Ok(None);
        }

        let expr = policy_cron(&policy)?;
        let job_id = self.scheduler.add(self.trigger(policy_id, &expr)?).await?;
        registry.insert(policy_id, job_id);

        let next_run = next_tick(&self.scheduler, job_id).await;
        if let Err(e) = self
            .dispatcher
            .policies
            .save_schedule(policy_id, &expr, next_run)
            .await
        {
            warn!("Failed to persist schedule for policy {}: {:#}", policy_id, e);
        }

        info!(
            "Scheduled policy {} ({}) with \"{}\", next run {:?}",
            policy_id, policy.kind, expr, next_run
        );
        Ok(next_run)
    }

    /// Removes the trigger for one policy; runs already started are untouched
    pub async fn stop_one(&self, policy_id: Uuid) -> Result<bool> {
        let mut registry = self.registry.lock().await;

        match registry.remove(&policy_id) {
            Some(job_id) => {
                self.scheduler.remove(&job_id).await?;
                info!("Stopped trigger for policy {}", policy_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn stop_all(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;

        for (policy_id, job_id) in registry.drain() {
            if let Err(e) = self.scheduler.remove(&job_id).await {
                warn!("Failed to remove trigger for policy {}: {}", policy_id, e);
            }
        }

        Ok(())
    }

    /// Fires a policy immediately, whether or not it has a trigger
    pub async fn run_now(&self, policy_id: Uuid) -> Result<usize> {
        let job_id = self.registry.lock().await.get(&policy_id).copied();
        let next_run = match job_id {
            Some(job_id) => next_tick(&self.scheduler, job_id).await,
            None => None,
        };

        self.dispatcher.dispatch(policy_id, next_run).await
    }

    /// Ids of policies with a registered trigger
    pub async fn list_active(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.registry.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }

    fn trigger(&self, policy_id: Uuid, expr: &str) -> Result<Job> {
        let dispatcher = self.dispatcher.clone();

        let job = Job::new_async_tz(to_trigger_expression(expr), Local, move |job_id, scheduler| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move { dispatcher.fire(policy_id, job_id, scheduler).await })
        })?;

        Ok(job)
    }
}

async fn next_tick(scheduler: &JobScheduler, job_id: Uuid) -> Option<DateTime<Utc>> {
    match scheduler.clone().next_tick_for_job(job_id).await {
        Ok(next) => next,
        Err(e) => {
            debug!("No next tick for job {}: {:?}", job_id, e);
            None
        }
    }
}
