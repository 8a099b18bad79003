//! Error types for backup runs and scheduling

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// Errors raised by the channel, transfer, executor and scheduler
#[derive(Debug, Error)]
pub enum BackupError {
    /// Could not open a session to the remote host
    #[error("Failed to connect to {host}: {reason}")]
    ConnectFailed { host: String, reason: String },

    /// Remote command ran but exited non-zero
    #[error("Remote command `{command}` failed with exit code {exit_code}")]
    RemoteExecFailed { command: String, exit_code: i32 },

    /// Local command could not be spawned or exited non-zero
    #[error("Local command `{command}` failed: {reason}")]
    LocalExecFailed { command: String, reason: String },

    /// Both the primary and the fallback transfer failed
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Database dump failed; recovered by the executor
    #[error("Database dump failed: {0}")]
    DatabaseDumpFailed(String),

    /// Schedule expression or parameters rejected at policy-write time
    #[error("Invalid schedule: {0}")]
    ScheduleValidationFailed(String),

    /// A single policy could not be registered during a load
    #[error("Failed to load policy {policy_id}: {reason}")]
    PolicyLoadFailed { policy_id: Uuid, reason: String },

    /// A value failed the allow-list check while building a command
    #[error("Unsafe {kind} rejected: {value:?}")]
    UnsafeArgument { kind: &'static str, value: String },

    /// Another run for the same target is still in flight
    #[error("Target {0} already has a backup in progress")]
    TargetBusy(Uuid),

    #[error("Target {0} not found")]
    TargetNotFound(Uuid),

    #[error("Schedule policy {0} not found")]
    PolicyNotFound(Uuid),

    /// Persistent store failure
    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cron primitive failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<tokio_cron_scheduler::JobSchedulerError> for BackupError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        BackupError::Scheduler(format!("{:?}", err))
    }
}
