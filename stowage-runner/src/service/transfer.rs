//! Transfer strategy
//!
//! Pulls the remote working directory down to local storage. rsync is tried
//! first; if it fails for any reason the directory is listed over ssh and each
//! regular file is copied with scp, one at a time. The fallback only looks at
//! the top level of the remote directory: the executor writes every artifact
//! flat into it.

use std::path::Path;
use std::sync::Arc;
use stowage_core::domain::target::Target;
use tracing::{info, warn};

use crate::command::{CommandSpec, check_path};
use crate::config::RunnerConfig;
use crate::error::{BackupError, Result};
use crate::remote::{RemoteChannel, SshAuth};
use crate::service::RunLog;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// How a successful transfer was carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Synced,
    Pulled { files: usize },
}

pub struct TransferStrategy {
    channel: Arc<dyn RemoteChannel>,
    config: RunnerConfig,
}

impl TransferStrategy {
    pub fn new(channel: Arc<dyn RemoteChannel>, config: RunnerConfig) -> Self {
        Self { channel, config }
    }

    /// Mirrors the files of `remote_dir` into `local_dir`
    pub async fn transfer(
        &self,
        remote_dir: &str,
        local_dir: &Path,
        target: &Target,
        log: &RunLog,
    ) -> Result<TransferOutcome> {
        log.line("Rsyncing to local...");

        let primary_error = match self.rsync(remote_dir, local_dir, target, log).await {
            Ok(()) => {
                log.line("Rsync completed");
                return Ok(TransferOutcome::Synced);
            }
            Err(e) => e,
        };

        warn!("rsync from {} failed: {}", target.host, primary_error);
        log.line(format!("Rsync failed: {}", primary_error));
        log.line("Falling back to per-file transfer");

        match self.pull_files(remote_dir, local_dir, target, log).await {
            Ok(files) => {
                log.line(format!("Per-file transfer completed ({} files)", files));
                Ok(TransferOutcome::Pulled { files })
            }
            Err(fallback_error) => {
                log.line(format!("Per-file transfer failed: {}", fallback_error));
                Err(BackupError::TransferFailed(format!(
                    "rsync: {}; fallback: {}",
                    primary_error, fallback_error
                )))
            }
        }
    }

    async fn rsync(
        &self,
        remote_dir: &str,
        local_dir: &Path,
        target: &Target,
        log: &RunLog,
    ) -> Result<()> {
        let auth = SshAuth::new(target, &self.config)?;
        let remote_dir = check_path(remote_dir)?;

        let command = CommandSpec::new(self.config.rsync_bin.clone())
            .args(["-az", "--partial", "-e"])
            .arg(auth.rsync_shell())
            .arg(format!("{}:{}/", auth.destination(), remote_dir))
            .arg(format!("{}/", local_arg(local_dir)?));

        self.channel.run_local(&auth.wrap(command), log).await?;
        Ok(())
    }

    /// Lists the remote directory and copies every non-directory entry
    ///
    /// Stops at the first failed copy.
    async fn pull_files(
        &self,
        remote_dir: &str,
        local_dir: &Path,
        target: &Target,
        log: &RunLog,
    ) -> Result<usize> {
        let auth = SshAuth::new(target, &self.config)?;
        let local = local_arg(local_dir)?;

        log.line("Listing remote files");
        let listing = CommandSpec::new("find")
            .path(remote_dir)?
            .args(["-mindepth", "1", "-maxdepth", "1"])
            .args(["-exec", "stat", "-c", "%f:%n", "{}", "+"]);
        let output = self.channel.run_remote(target, &listing, log).await?;

        let files = regular_files(&output.stdout);
        info!("Pulling {} file(s) from {}", files.len(), target.host);

        for file in &files {
            let name = file.rsplit('/').next().unwrap_or(file.as_str());
            log.line(format!("Downloading {}", name));

            let command = CommandSpec::new(self.config.scp_bin.clone())
                .args(auth.scp_args())
                .arg(format!("{}:{}", auth.destination(), check_path(file)?))
                .arg(format!("{}/", local));

            if let Err(e) = self.channel.run_local(&auth.wrap(command), log).await {
                log.line(format!("Download of {} failed", name));
                return Err(e);
            }

            log.line(format!("Downloaded {}", name));
        }

        Ok(files.len())
    }
}

/// Parses `stat -c %f:%n` output, keeping entries that are not directories
///
/// `%f` is the raw mode in hex; directory detection uses the file type bits.
pub fn regular_files(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let (mode, path) = line.trim().split_once(':')?;
            match u32::from_str_radix(mode, 16) {
                Ok(mode) if mode & S_IFMT == S_IFDIR => None,
                Ok(_) => Some(path.to_string()),
                Err(_) => {
                    warn!("Skipping unparseable listing line: {}", line);
                    None
                }
            }
        })
        .collect()
}

/// Local paths are passed without a shell but must be absolute so no tool
/// reads them as an option or a `host:path` pair
fn local_arg(path: &Path) -> Result<String> {
    let unsafe_path = || BackupError::UnsafeArgument {
        kind: "local path",
        value: path.display().to_string(),
    };

    let text = path.to_str().ok_or_else(unsafe_path)?;
    if !path.is_absolute() {
        return Err(unsafe_path());
    }

    Ok(text.trim_end_matches('/').to_string())
}
