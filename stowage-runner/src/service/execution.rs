//! Backup execution
//!
//! Drives one run for one target:
//! - Resolving the local destination
//! - Creating the remote working directory
//! - Compressing each selected path set
//! - Dumping databases (failures here are logged, not fatal)
//! - Transferring the artifacts and removing the remote directory
//!
//! Status moves `pending -> running -> success | failed` and every step leaves
//! a line in the run log.

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_core::domain::run::RunStatus;
use stowage_core::domain::target::Target;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::command::{CommandSpec, check_host, check_path};
use crate::config::{RunnerConfig, expand_home};
use crate::error::{BackupError, Result};
use crate::naming::{archive_name, remote_work_dir, safe_name};
use crate::remote::RemoteChannel;
use crate::repository::Stores;
use crate::service::RunLog;
use crate::service::transfer::TransferStrategy;

const WEB_ROOT: &str = "/var/www";
const SYSTEM_LOGS: &str = "/var/log";
const NGINX_CONFIG: &str = "/etc/nginx";

const DEFAULT_DB_HOST: &str = "127.0.0.1";
const DEFAULT_DB_PORT: u16 = 3306;
const DUMP_CLIENTS: [&str; 2] = ["mysqldump", "mariadb-dump"];

/// Per-run names derived from the target and the date
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub safe_name: String,
    pub remote_dir: String,
    pub date: NaiveDate,
}

impl RunPlan {
    pub fn new(target: &Target, tmp_root: &str, date: NaiveDate) -> Self {
        let safe_name = safe_name(target);
        let remote_dir = remote_work_dir(tmp_root, date, &safe_name);
        Self {
            safe_name,
            remote_dir,
            date,
        }
    }

    fn artifact(&self, category: &str, ext: &str) -> String {
        format!(
            "{}/{}",
            self.remote_dir,
            archive_name(&self.safe_name, category, ext)
        )
    }

    fn local_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.safe_name)
            .join(self.date.format("%Y-%m-%d").to_string())
    }
}

/// Archiver selected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compressor {
    Pigz,
    Gzip,
}

impl Compressor {
    fn command(self, archive: &str, source: &str) -> Result<CommandSpec> {
        let tar = match self {
            Compressor::Pigz => CommandSpec::new("tar").args(["-I", "pigz", "-cf"]),
            Compressor::Gzip => CommandSpec::new("tar").arg("-czf"),
        };
        tar.path(archive)?.path(source)
    }
}

/// Runs backups for targets; one instance serves any number of concurrent runs
pub struct BackupExecutor {
    channel: Arc<dyn RemoteChannel>,
    transfer: TransferStrategy,
    stores: Stores,
    config: RunnerConfig,
}

impl BackupExecutor {
    pub fn new(channel: Arc<dyn RemoteChannel>, stores: Stores, config: RunnerConfig) -> Self {
        let transfer = TransferStrategy::new(channel.clone(), config.clone());
        Self {
            channel,
            transfer,
            stores,
            config,
        }
    }

    /// Executes one run against an existing `pending` run record
    ///
    /// On failure the record is marked `failed` and the error is returned to
    /// the caller, which decides whether to surface it.
    pub async fn execute(&self, target: &Target, run_id: Uuid) -> Result<()> {
        let log = RunLog::start(run_id, self.stores.runs.clone());
        let plan = RunPlan::new(target, &self.config.remote_tmp_root, Local::now().date_naive());

        let local_root = self.resolve_local_root(target, &log).await;

        if let Err(e) = self
            .stores
            .runs
            .update_status(run_id, RunStatus::Running)
            .await
        {
            error!("Failed to mark run {} as running: {:#}", run_id, e);
            return self.finish_failed(run_id, &log, e.into()).await;
        }

        info!("Starting backup run {} for {}", run_id, target.display_name());
        log.line(format!(
            "Starting backup of {} ({}@{})",
            target.display_name(),
            target.username,
            target.host
        ));

        match self.run_steps(target, &plan, &local_root, &log).await {
            Ok(()) => {
                log.line("Backup completed successfully.");
                log.flush().await;
                match self
                    .stores
                    .runs
                    .update_status(run_id, RunStatus::Success)
                    .await
                {
                    Ok(()) => {
                        info!("Backup run {} succeeded", run_id);
                        Ok(())
                    }
                    Err(e) => {
                        error!("Failed to mark run {} as successful: {:#}", run_id, e);
                        self.finish_failed(run_id, &log, e.into()).await
                    }
                }
            }
            Err(e) => self.finish_failed(run_id, &log, e).await,
        }
    }

    async fn finish_failed(&self, run_id: Uuid, log: &RunLog, err: BackupError) -> Result<()> {
        error!("Backup run {} failed: {}", run_id, err);
        log.line(format!("Backup failed: {}", err));
        log.flush().await;

        if let Err(e) = self
            .stores
            .runs
            .update_status(run_id, RunStatus::Failed)
            .await
        {
            warn!("Failed to mark run {} as failed: {:#}", run_id, e);
        }

        Err(err)
    }

    async fn run_steps(
        &self,
        target: &Target,
        plan: &RunPlan,
        local_root: &Path,
        log: &RunLog,
    ) -> Result<()> {
        log.line("Creating remote directory");
        let mkdir = CommandSpec::new("mkdir").arg("-p").path(&plan.remote_dir)?;
        self.channel.run_remote(target, &mkdir, log).await?;
        log.line(format!("Remote directory {} ready", plan.remote_dir));

        let path_sets = path_sets(target);
        if !path_sets.is_empty() {
            let compressor = self.detect_compressor(target, log).await;
            for (source, category) in &path_sets {
                log.line(format!("Compressing {}...", source));
                let archive = plan.artifact(category, "tar.gz");
                let command = compressor.command(&archive, source)?;
                self.channel.run_remote(target, &command, log).await?;
                log.line(format!("Compressed {} into {}", source, archive));
            }
        }

        if target.backup_db {
            if let Err(e) = self.dump_databases(target, plan, log).await {
                let e = match e {
                    BackupError::DatabaseDumpFailed(_) => e,
                    other => BackupError::DatabaseDumpFailed(other.to_string()),
                };
                warn!("{} on {}, continuing", e, target.host);
                log.line(format!("{} (continuing without database backup)", e));
            }
        }

        let local_dir = plan.local_dir(local_root);
        tokio::fs::create_dir_all(&local_dir).await?;
        log.line(format!("Local destination {}", local_dir.display()));

        self.transfer
            .transfer(&plan.remote_dir, &local_dir, target, log)
            .await?;

        log.line("Cleaning up remote directory");
        let cleanup = CommandSpec::new("rm").arg("-rf").path(&plan.remote_dir)?;
        self.channel.run_remote(target, &cleanup, log).await?;
        log.line("Remote directory removed");

        Ok(())
    }

    /// Prefers pigz when the remote host has it
    async fn detect_compressor(&self, target: &Target, log: &RunLog) -> Compressor {
        let probe = CommandSpec::new("which").arg("pigz");
        match self.channel.run_remote(target, &probe, log).await {
            Ok(_) => {
                log.line("Using pigz for compression");
                Compressor::Pigz
            }
            Err(_) => {
                log.line("pigz not available, using gzip");
                Compressor::Gzip
            }
        }
    }

    async fn dump_databases(&self, target: &Target, plan: &RunPlan, log: &RunLog) -> Result<()> {
        let Some(user) = target.db_user() else {
            log.line("Database backup skipped: no database user configured");
            return Ok(());
        };

        let client = self.locate_dump_client(target, log).await?;

        match target.selected_databases() {
            Some(names) => {
                for name in names {
                    log.line(format!("Dumping database {}...", name));
                    let file = plan.artifact(&format!("db_{}", name), "sql");
                    let command = dump_command(client, target, user, Some(name), &file)?;
                    self.channel.run_remote(target, &command, log).await?;
                    log.line(format!("Database {} dumped", name));
                }
            }
            None => {
                log.line("Dumping all databases...");
                let file = plan.artifact("db_all", "sql");
                let command = dump_command(client, target, user, None, &file)?;
                self.channel.run_remote(target, &command, log).await?;
                log.line("All databases dumped");
            }
        }

        Ok(())
    }

    async fn locate_dump_client(&self, target: &Target, log: &RunLog) -> Result<&'static str> {
        log.line("Locating database dump client");
        for client in DUMP_CLIENTS {
            let probe = CommandSpec::new("which").arg(client);
            match self.channel.run_remote(target, &probe, log).await {
                Ok(_) => {
                    log.line(format!("Using {}", client));
                    return Ok(client);
                }
                Err(BackupError::RemoteExecFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(BackupError::DatabaseDumpFailed(format!(
            "none of {} found on {}",
            DUMP_CLIENTS.join(", "),
            target.host
        )))
    }

    /// Target path, then the settings default, then the configured default;
    /// the configured fallback when the choice is not writable
    async fn resolve_local_root(&self, target: &Target, log: &RunLog) -> PathBuf {
        let configured = match target.local_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => match self.stores.settings.default_backup_path().await {
                Ok(Some(path)) if !path.trim().is_empty() => path.trim().to_string(),
                Ok(_) => self.config.default_local_root.clone(),
                Err(e) => {
                    warn!("Failed to read default backup path: {:#}", e);
                    self.config.default_local_root.clone()
                }
            },
        };

        let root = absolute(expand_home(&configured));
        match probe_writable(&root).await {
            Ok(()) => {
                log.line(format!("Using local storage {}", root.display()));
                root
            }
            Err(e) => {
                let fallback = absolute(self.config.fallback_root());
                warn!("{} is not writable: {}", root.display(), e);
                log.line(format!(
                    "Local storage {} is not writable ({}), falling back to {}",
                    root.display(),
                    e,
                    fallback.display()
                ));
                fallback
            }
        }
    }
}

/// Built-in and custom path sets selected on the target, with their categories
fn path_sets(target: &Target) -> Vec<(String, String)> {
    let mut sets = Vec::new();

    if target.backup_www {
        sets.push((WEB_ROOT.to_string(), "www".to_string()));
    }
    if target.backup_logs {
        sets.push((SYSTEM_LOGS.to_string(), "logs".to_string()));
    }
    if target.backup_nginx {
        sets.push((NGINX_CONFIG.to_string(), "nginx".to_string()));
    }

    let custom = target
        .custom_paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty());
    for (i, path) in custom.enumerate() {
        sets.push((path.to_string(), format!("custom{}", i + 1)));
    }

    sets
}

fn dump_command(
    client: &str,
    target: &Target,
    user: &str,
    database: Option<&str>,
    file: &str,
) -> Result<CommandSpec> {
    let mut command = CommandSpec::new("env");
    if let Some(password) = target.db_password.as_deref().filter(|p| !p.is_empty()) {
        command = command.secret(format!("MYSQL_PWD={}", password));
    }

    let host = target.db_host().unwrap_or(DEFAULT_DB_HOST);
    let port = target.db_port.unwrap_or(DEFAULT_DB_PORT);

    let command = command
        .arg(client)
        .arg("-h")
        .arg(check_host(host)?)
        .arg("-P")
        .arg(port.to_string())
        .arg("-u")
        .arg(check_host(user)?)
        .arg("--single-transaction")
        .arg(format!("--result-file={}", check_path(file)?));

    match database {
        Some(name) => command.arg("--databases").ident(name),
        None => Ok(command.arg("--all-databases")),
    }
}

async fn probe_writable(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let probe = dir.join(".stowage-write-test");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, RunRepository};
    use crate::testing::{Reply, ScriptedChannel, target};

    struct Harness {
        store: Arc<MemoryStore>,
        channel: Arc<ScriptedChannel>,
        executor: BackupExecutor,
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(ScriptedChannel::new());

        let config = RunnerConfig {
            default_local_root: root.join("default").display().to_string(),
            fallback_local_root: root.join("fallback").display().to_string(),
            ..RunnerConfig::default()
        };

        let executor = BackupExecutor::new(channel.clone(), Stores::shared(store.clone()), config);

        Harness {
            store,
            channel,
            executor,
            _dir: dir,
            root,
        }
    }

    impl Harness {
        async fn run(&self, target: &Target) -> (Result<()>, RunStatus, String) {
            self.store.insert_target(target.clone());
            let run = self.store.create_run(target.id).await.unwrap();
            let result = self.executor.execute(target, run.id).await;
            let run = self.store.run(run.id).unwrap();
            (result, run.status, run.log)
        }
    }

    fn positions(log: &str, needles: &[&str]) -> Vec<usize> {
        needles
            .iter()
            .map(|n| log.find(n).unwrap_or_else(|| panic!("{:?} missing from log:\n{}", n, log)))
            .collect()
    }

    #[test]
    fn test_plan_names() {
        let mut t = target();
        t.name = Some("Shop #1".to_string());
        let plan = RunPlan::new(&t, "/tmp", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        assert_eq!(plan.remote_dir, "/tmp/backup_2024-06-01_Shop__1");
        assert_eq!(
            plan.artifact("www", "tar.gz"),
            "/tmp/backup_2024-06-01_Shop__1/Shop__1_www.tar.gz"
        );
        assert_eq!(
            plan.local_dir(Path::new("/srv")),
            PathBuf::from("/srv/Shop__1/2024-06-01")
        );
    }

    #[test]
    fn test_path_sets_order_and_categories() {
        let mut t = target();
        t.backup_www = true;
        t.backup_nginx = true;
        t.custom_paths = vec!["/opt/app".to_string(), " ".to_string(), "/srv/data".to_string()];

        let sets = path_sets(&t);
        let categories: Vec<&str> = sets.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(categories, vec!["www", "nginx", "custom1", "custom2"]);
    }

    #[test]
    fn test_dump_command_redacts_password() {
        let mut t = target();
        t.db_password = Some("s3cret".to_string());

        let cmd = dump_command("mysqldump", &t, "backup", Some("shop"), "/tmp/x/web_db_shop.sql").unwrap();
        let shown = cmd.to_string();
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("--result-file=/tmp/x/web_db_shop.sql"));
        assert!(shown.ends_with("--databases shop"));

        assert!(dump_command("mysqldump", &t, "backup", Some("shop; drop"), "/tmp/x/a.sql").is_err());
    }

    #[tokio::test]
    async fn test_www_only_run_succeeds_with_ordered_log() {
        let h = harness();
        let mut t = target();
        t.backup_www = true;
        t.local_path = Some(h.root.join("web").display().to_string());

        let (result, status, log) = h.run(&t).await;

        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(status, RunStatus::Success);

        let pos = positions(
            &log,
            &[
                "Creating remote directory",
                "Compressing /var/www...",
                "Rsyncing to local",
                "Backup completed successfully.",
            ],
        );
        assert!(pos.windows(2).all(|w| w[0] < w[1]), "{}", log);
        assert!(log.trim_end().ends_with("Backup completed successfully."));

        assert_eq!(
            h.channel.programs(),
            vec!["mkdir", "which", "tar", "rsync", "rm"]
        );
        assert!(h.root.join("web/web").is_dir());
    }

    #[tokio::test]
    async fn test_remote_directory_failure_stops_run() {
        let h = harness();
        h.channel.on("mkdir", Reply::Fail(1));
        let mut t = target();
        t.backup_www = true;
        t.backup_db = true;
        t.db_user = Some("root".to_string());

        let (result, status, log) = h.run(&t).await;

        assert!(matches!(result, Err(BackupError::RemoteExecFailed { exit_code: 1, .. })));
        assert_eq!(status, RunStatus::Failed);

        let failure = log.find("Backup failed").expect("failure line");
        let tail = &log[failure..];
        for step in ["Compressing", "Dumping", "Rsyncing", "Cleaning up"] {
            assert!(!log.contains(step), "{} logged:\n{}", step, log);
        }
        assert_eq!(tail.lines().count(), 1);
        assert_eq!(h.channel.programs(), vec!["mkdir"]);
    }

    #[tokio::test]
    async fn test_compression_failure_is_fatal() {
        let h = harness();
        h.channel.on("/var/log", Reply::Fail(2));
        let mut t = target();
        t.backup_www = true;
        t.backup_logs = true;

        let (result, status, log) = h.run(&t).await;

        assert!(result.is_err());
        assert_eq!(status, RunStatus::Failed);
        assert!(log.contains("Compressed /var/www"));
        assert!(!log.contains("Rsyncing"));
    }

    #[tokio::test]
    async fn test_gzip_used_when_pigz_missing() {
        let h = harness();
        h.channel.on("which pigz", Reply::Fail(1));
        let mut t = target();
        t.backup_nginx = true;

        let (result, _, log) = h.run(&t).await;
        assert!(result.is_ok());
        assert!(log.contains("pigz not available, using gzip"));

        let tar = h
            .channel
            .calls()
            .into_iter()
            .find(|c| c.program == "tar")
            .unwrap();
        assert_eq!(tar.args[0], "-czf");
        assert!(tar.args[1].ends_with("/web_nginx.tar.gz"));
        assert_eq!(tar.args[2], "/etc/nginx");
    }

    #[tokio::test]
    async fn test_missing_db_user_skips_dump() {
        let h = harness();
        let mut t = target();
        t.backup_db = true;
        t.db_user = Some("  ".to_string());

        let (result, status, log) = h.run(&t).await;

        assert!(result.is_ok());
        assert_eq!(status, RunStatus::Success);
        assert!(log.contains("Database backup skipped: no database user configured"));
        assert!(!h.channel.programs().contains(&"env".to_string()));
    }

    #[tokio::test]
    async fn test_db_failure_does_not_fail_run() {
        let h = harness();
        h.channel.on("which mysqldump", Reply::Fail(1));
        h.channel.on("which mariadb-dump", Reply::Fail(1));
        let mut t = target();
        t.backup_db = true;
        t.db_user = Some("backup".to_string());

        let (result, status, log) = h.run(&t).await;

        assert!(result.is_ok());
        assert_eq!(status, RunStatus::Success);
        assert!(log.contains("Database dump failed: none of mysqldump, mariadb-dump found"));
        assert!(log.contains("Rsyncing to local"));
    }

    #[tokio::test]
    async fn test_named_databases_dumped_individually() {
        let h = harness();
        h.channel.on("which mysqldump", Reply::Fail(1));
        let mut t = target();
        t.backup_db = true;
        t.db_user = Some("backup".to_string());
        t.db_names = Some(vec!["shop".to_string(), "crm".to_string()]);

        let (result, _, log) = h.run(&t).await;
        assert!(result.is_ok());

        let dumps: Vec<String> = h
            .channel
            .calls()
            .into_iter()
            .filter(|c| c.program == "env")
            .map(|c| c.display)
            .collect();
        assert_eq!(dumps.len(), 2);
        assert!(dumps[0].starts_with("env mariadb-dump"));
        assert!(dumps[0].contains("web_db_shop.sql"));
        assert!(dumps[1].contains("web_db_crm.sql"));
        assert!(log.contains("Database crm dumped"));
    }

    #[tokio::test]
    async fn test_blank_db_host_uses_local_database() {
        let h = harness();
        let mut t = target();
        t.backup_db = true;
        t.db_user = Some("backup".to_string());
        t.db_host = Some("".to_string());

        let (result, status, log) = h.run(&t).await;

        assert!(result.is_ok());
        assert_eq!(status, RunStatus::Success);
        assert!(!log.contains("Database dump failed"));
        let dump = h
            .channel
            .calls()
            .into_iter()
            .find(|c| c.program == "env")
            .unwrap();
        assert!(dump.display.contains("-h 127.0.0.1 -P 3306"));
    }

    #[tokio::test]
    async fn test_failed_success_update_marks_run_failed() {
        let h = harness();
        h.store.reject_status(Some(RunStatus::Success));

        let (result, status, log) = h.run(&target()).await;

        assert!(matches!(result, Err(BackupError::Store(_))));
        assert_eq!(status, RunStatus::Failed);
        assert!(log.contains("Backup failed: Store error: status store unavailable"));
    }

    #[tokio::test]
    async fn test_all_databases_dumped_without_names() {
        let h = harness();
        let mut t = target();
        t.backup_db = true;
        t.db_user = Some("backup".to_string());

        let (result, _, _) = h.run(&t).await;
        assert!(result.is_ok());

        let dump = h
            .channel
            .calls()
            .into_iter()
            .find(|c| c.program == "env")
            .unwrap();
        assert!(dump.display.contains("--all-databases"));
        assert!(dump.display.contains("web_db_all.sql"));
    }

    #[tokio::test]
    async fn test_transfer_failure_fails_run() {
        let h = harness();
        h.channel.on("rsync", Reply::Fail(12));
        h.channel.on("find", Reply::ConnectFail);
        let t = target();

        let (result, status, log) = h.run(&t).await;

        assert!(matches!(result, Err(BackupError::TransferFailed(_))));
        assert_eq!(status, RunStatus::Failed);
        assert!(!log.contains("Cleaning up remote directory"));
    }

    #[tokio::test]
    async fn test_cleanup_failure_fails_run() {
        let h = harness();
        h.channel.on("rm -rf", Reply::Fail(1));

        let (result, status, _) = h.run(&target()).await;

        assert!(result.is_err());
        assert_eq!(status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_unwritable_local_root_falls_back() {
        let h = harness();
        let blocker = h.root.join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let mut t = target();
        t.local_path = Some(blocker.display().to_string());

        let (result, _, log) = h.run(&t).await;

        assert!(result.is_ok());
        assert!(log.contains("is not writable"));
        assert!(h.root.join("fallback/web").is_dir());
    }

    #[tokio::test]
    async fn test_settings_default_path_used_without_target_path() {
        let h = harness();
        let settings_root = h.root.join("from-settings");
        h.store
            .set_default_backup_path(Some(settings_root.display().to_string()));

        let (result, _, _) = h.run(&target()).await;

        assert!(result.is_ok());
        assert!(settings_root.join("web").is_dir());
        assert!(!h.root.join("default").exists());
    }
}
