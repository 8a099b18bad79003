//! Runner configuration
//!
//! Defines the configurable parameters of the backup engine: remote and local
//! storage locations, ssh connection settings and the external tool names.

use std::path::PathBuf;
use std::time::Duration;

/// Backup engine configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Remote directory under which per-run working directories are created
    pub remote_tmp_root: String,

    /// Local storage root used when neither the target nor the settings store names one
    pub default_local_root: String,

    /// Local root used when the resolved root is not writable
    pub fallback_local_root: String,

    /// ssh `ConnectTimeout`
    pub connect_timeout: Duration,

    pub ssh_bin: String,
    pub sshpass_bin: String,
    pub rsync_bin: String,
    pub scp_bin: String,
}

impl RunnerConfig {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - STOWAGE_REMOTE_TMP (default: /tmp)
    /// - STOWAGE_BACKUP_ROOT (default: ~/backups)
    /// - STOWAGE_FALLBACK_ROOT (default: ~/stowage-backups)
    /// - STOWAGE_CONNECT_TIMEOUT (seconds, default: 15)
    /// - STOWAGE_SSH_BIN, STOWAGE_SSHPASS_BIN, STOWAGE_RSYNC_BIN, STOWAGE_SCP_BIN
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let connect_timeout = match std::env::var("STOWAGE_CONNECT_TIMEOUT") {
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                anyhow::anyhow!("STOWAGE_CONNECT_TIMEOUT must be a number of seconds")
            })?),
            Err(_) => defaults.connect_timeout,
        };

        let var_or = |key: &str, default: String| std::env::var(key).unwrap_or(default);

        Ok(Self {
            remote_tmp_root: var_or("STOWAGE_REMOTE_TMP", defaults.remote_tmp_root),
            default_local_root: var_or("STOWAGE_BACKUP_ROOT", defaults.default_local_root),
            fallback_local_root: var_or("STOWAGE_FALLBACK_ROOT", defaults.fallback_local_root),
            connect_timeout,
            ssh_bin: var_or("STOWAGE_SSH_BIN", defaults.ssh_bin),
            sshpass_bin: var_or("STOWAGE_SSHPASS_BIN", defaults.sshpass_bin),
            rsync_bin: var_or("STOWAGE_RSYNC_BIN", defaults.rsync_bin),
            scp_bin: var_or("STOWAGE_SCP_BIN", defaults.scp_bin),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.remote_tmp_root.starts_with('/') {
            anyhow::bail!("remote_tmp_root must be an absolute path");
        }

        if self.remote_tmp_root.trim_end_matches('/').is_empty() {
            anyhow::bail!("remote_tmp_root cannot be the filesystem root");
        }

        if self.default_local_root.is_empty() || self.fallback_local_root.is_empty() {
            anyhow::bail!("local backup roots cannot be empty");
        }

        if self.connect_timeout.as_secs() == 0 {
            anyhow::bail!("connect_timeout must be greater than 0");
        }

        for (name, bin) in [
            ("ssh_bin", &self.ssh_bin),
            ("sshpass_bin", &self.sshpass_bin),
            ("rsync_bin", &self.rsync_bin),
            ("scp_bin", &self.scp_bin),
        ] {
            if bin.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        Ok(())
    }

    /// Fallback root with `~` expanded
    pub fn fallback_root(&self) -> PathBuf {
        expand_home(&self.fallback_local_root)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            remote_tmp_root: "/tmp".to_string(),
            default_local_root: "~/backups".to_string(),
            fallback_local_root: "~/stowage-backups".to_string(),
            connect_timeout: Duration::from_secs(15),
            ssh_bin: "ssh".to_string(),
            sshpass_bin: "sshpass".to_string(),
            rsync_bin: "rsync".to_string(),
            scp_bin: "scp".to_string(),
        }
    }
}

/// Expands a leading `~` to the current user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));

    if path == "~" {
        home()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(path)
    }
}
