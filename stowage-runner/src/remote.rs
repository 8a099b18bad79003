//! Remote command channel
//!
//! Executes commands on a target over the system ssh client, and commands on
//! the local host, streaming both output streams into the run log line by line.
//! The channel never retries; callers own any retry or fallback policy.

use async_trait::async_trait;
use std::process::Stdio;
use stowage_core::domain::target::Target;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::{CommandSpec, check_host, check_path};
use crate::config::RunnerConfig;
use crate::error::{BackupError, Result};
use crate::service::RunLog;

/// Exit status used by ssh for its own connection errors
const SSH_CONNECTION_ERROR: i32 = 255;

/// Exit status used by sshpass when the password is rejected
const SSHPASS_BAD_PASSWORD: i32 = 5;

/// Collected output of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Executes commands remotely on a target, or locally
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Runs `command` on the target; non-zero exits are errors
    async fn run_remote(
        &self,
        target: &Target,
        command: &CommandSpec,
        log: &RunLog,
    ) -> Result<CommandOutput>;

    /// Runs `command` on this host; non-zero exits are errors
    async fn run_local(&self, command: &CommandSpec, log: &RunLog) -> Result<CommandOutput>;
}

/// Auth material and ssh options for one target
///
/// Shared by the channel and the transfer tools so every session is opened
/// the same way. A password, when present, wins over a private key.
pub struct SshAuth<'a> {
    target: &'a Target,
    config: &'a RunnerConfig,
}

impl<'a> SshAuth<'a> {
    pub fn new(target: &'a Target, config: &'a RunnerConfig) -> Result<Self> {
        check_host(&target.host)?;
        check_host(&target.username)?;
        if target.password().is_none() {
            if let Some(key) = target.private_key_path() {
                check_path(key)?;
            }
        }

        Ok(Self { target, config })
    }

    pub fn uses_password(&self) -> bool {
        self.target.password().is_some()
    }

    /// `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.target.username, self.target.host)
    }

    /// Options for `ssh` (port flag `-p`)
    pub fn ssh_args(&self) -> Vec<String> {
        self.with_port("-p")
    }

    /// Options for `scp` (port flag `-P`)
    pub fn scp_args(&self) -> Vec<String> {
        self.with_port("-P")
    }

    /// The remote shell string handed to `rsync -e`
    pub fn rsync_shell(&self) -> String {
        std::iter::once(self.config.ssh_bin.clone())
            .chain(self.ssh_args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Wraps `command` in `sshpass -e` when password auth is in use
    ///
    /// The password travels in the `SSHPASS` environment variable, never argv.
    pub fn wrap(&self, command: CommandSpec) -> CommandSpec {
        match self.target.password() {
            Some(password) => command
                .env("SSHPASS", password)
                .wrapped_in(self.config.sshpass_bin.clone(), ["-e"]),
            None => command,
        }
    }

    fn with_port(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec![
            port_flag.to_string(),
            self.target.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout.as_secs()),
        ];

        if !self.uses_password() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
            if let Some(key) = self.target.private_key_path() {
                args.push("-i".to_string());
                args.push(key.to_string());
            }
        }

        args
    }
}

/// Channel backed by the system `ssh` binary
pub struct SshChannel {
    config: RunnerConfig,
}

impl SshChannel {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn run_remote(
        &self,
        target: &Target,
        command: &CommandSpec,
        log: &RunLog,
    ) -> Result<CommandOutput> {
        let auth = SshAuth::new(target, &self.config)?;

        let mut ssh = CommandSpec::new(self.config.ssh_bin.clone())
            .args(auth.ssh_args())
            .arg(auth.destination())
            .arg("--");
        ssh = if command.has_secrets() {
            ssh.secret(command.to_remote_line())
        } else {
            ssh.arg(command.to_remote_line())
        };
        let ssh = auth.wrap(ssh);

        debug!("Running on {}: {}", target.host, command);

        let output = spawn_streaming(&ssh, log)
            .await
            .map_err(|e| BackupError::ConnectFailed {
                host: target.host.clone(),
                reason: format!("failed to start {}: {}", ssh.program(), e),
            })?;

        let connect_error = output.exit_code == SSH_CONNECTION_ERROR
            || (auth.uses_password() && output.exit_code == SSHPASS_BAD_PASSWORD);

        if connect_error {
            return Err(BackupError::ConnectFailed {
                host: target.host.clone(),
                reason: last_line(&output.stderr),
            });
        }

        if output.exit_code != 0 {
            return Err(BackupError::RemoteExecFailed {
                command: command.to_string(),
                exit_code: output.exit_code,
            });
        }

        Ok(output)
    }

    async fn run_local(&self, command: &CommandSpec, log: &RunLog) -> Result<CommandOutput> {
        debug!("Running locally: {}", command);

        let output = spawn_streaming(command, log)
            .await
            .map_err(|e| BackupError::LocalExecFailed {
                command: command.to_string(),
                reason: format!("failed to start: {}", e),
            })?;

        if output.exit_code != 0 {
            return Err(BackupError::LocalExecFailed {
                command: command.to_string(),
                reason: format!(
                    "exit code {}: {}",
                    output.exit_code,
                    last_line(&output.stderr)
                ),
            });
        }

        Ok(output)
    }
}

/// Spawns `spec` and forwards both output streams to `log` as lines arrive
async fn spawn_streaming(spec: &CommandSpec, log: &RunLog) -> std::io::Result<CommandOutput> {
    let mut child = Command::new(spec.program())
        .args(spec.argv())
        .envs(spec.envs().iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

    let (stdout, stderr, status) = tokio::join!(
        forward_lines(stdout, log),
        forward_lines(stderr, log),
        child.wait()
    );

    Ok(CommandOutput {
        exit_code: status?.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Reads `reader` to EOF, logging each line
///
/// Lines are split on raw bytes and decoded lossily, so invalid UTF-8 never
/// stops the drain and the child never sees a closed pipe.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, log: &RunLog) -> String {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut collected = String::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Output stream read failed: {}", e);
                break;
            }
        }

        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim_end_matches(['\n', '\r']);
        if !line.trim().is_empty() {
            log.line(line);
        }
        collected.push_str(line);
        collected.push('\n');
    }

    collected
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, RunRepository};
    use crate::testing::target;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn test_key_auth_options() {
        let config = RunnerConfig::default();
        let mut t = target();
        t.port = 2222;
        t.private_key_path = Some("/home/ops/.ssh/id_ed25519".to_string());

        let auth = SshAuth::new(&t, &config).unwrap();
        let args = auth.ssh_args();

        assert_eq!(&args[..2], &["-p".to_string(), "2222".to_string()]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.ends_with(&["-i".to_string(), "/home/ops/.ssh/id_ed25519".to_string()]));
        assert_eq!(auth.scp_args()[0], "-P");
        assert_eq!(auth.destination(), "deploy@web1.example.com");

        let wrapped = auth.wrap(CommandSpec::new("ssh"));
        assert_eq!(wrapped.program(), "ssh");
    }

    #[test]
    fn test_password_wins_over_key() {
        let config = RunnerConfig::default();
        let mut t = target();
        t.password = Some("hunter2".to_string());
        t.private_key_path = Some("/home/ops/.ssh/id_ed25519".to_string());

        let auth = SshAuth::new(&t, &config).unwrap();
        let args = auth.ssh_args();
        assert!(!args.contains(&"-i".to_string()));
        assert!(!args.contains(&"BatchMode=yes".to_string()));

        let wrapped = auth.wrap(CommandSpec::new("ssh").arg("host"));
        assert_eq!(wrapped.program(), "sshpass");
        assert_eq!(wrapped.argv(), vec!["-e", "ssh", "host"]);
        assert!(wrapped.envs().iter().any(|(k, v)| k == "SSHPASS" && v == "hunter2"));
        assert!(!wrapped.argv().contains(&"hunter2"));
    }

    #[test]
    fn test_unsafe_host_is_rejected() {
        let config = RunnerConfig::default();
        let mut t = target();
        t.host = "web1;reboot".to_string();
        assert!(matches!(
            SshAuth::new(&t, &config),
            Err(BackupError::UnsafeArgument { .. })
        ));
    }

    #[test]
    fn test_rsync_shell() {
        let config = RunnerConfig::default();
        let t = target();
        let auth = SshAuth::new(&t, &config).unwrap();
        assert!(auth.rsync_shell().starts_with("ssh -p 22 -o StrictHostKeyChecking=accept-new"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_local_streams_output_and_reports_failures() {
        let store = Arc::new(MemoryStore::new());
        let run = store.create_run(Uuid::new_v4()).await.unwrap();
        let log = RunLog::start(run.id, store.clone());
        let channel = SshChannel::new(RunnerConfig::default());

        let ok = CommandSpec::new("sh").arg("-c").arg("echo out; echo err >&2");
        let output = channel.run_local(&ok, &log).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");

        let failing = CommandSpec::new("sh").arg("-c").arg("echo nope >&2; exit 3");
        let err = channel.run_local(&failing, &log).await.unwrap_err();
        assert!(matches!(err, BackupError::LocalExecFailed { ref reason, .. } if reason.contains("exit code 3")));

        let missing = CommandSpec::new("definitely-not-a-real-binary-4711");
        assert!(matches!(
            channel.run_local(&missing, &log).await,
            Err(BackupError::LocalExecFailed { .. })
        ));

        log.flush().await;
        let text = store.run(run.id).unwrap().log;
        assert!(text.contains("] out"));
        assert!(text.contains("] err"));
        assert!(text.contains("] nope"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_local_keeps_draining_after_invalid_utf8() {
        let store = Arc::new(MemoryStore::new());
        let run = store.create_run(Uuid::new_v4()).await.unwrap();
        let log = RunLog::start(run.id, store.clone());
        let channel = SshChannel::new(RunnerConfig::default());

        let script = "printf 'caf\\351\\nafter-line\\n' >&2; \
                      yes filler | head -n 30000 >&2; \
                      echo done";
        let spec = CommandSpec::new("sh").arg("-c").arg(script);
        let output = channel.run_local(&spec, &log).await.unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "done\n");
        assert!(output.stderr.starts_with("caf\u{FFFD}\nafter-line\n"));
        assert_eq!(output.stderr.lines().filter(|l| *l == "filler").count(), 30000);

        log.flush().await;
        let text = store.run(run.id).unwrap().log;
        assert!(text.contains("] caf\u{FFFD}"));
        assert!(text.contains("] after-line"));
        assert!(text.contains("] done"));
    }
}
