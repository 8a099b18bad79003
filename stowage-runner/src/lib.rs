//! Stowage backup engine
//!
//! Runs file and database backups of remote Linux hosts over ssh and keeps
//! them on schedule.
//!
//! Architecture:
//! - Command model: structured, allow-listed commands (`command`)
//! - Remote channel: ssh/local execution with streamed output (`remote`)
//! - Services: run log, transfer strategy, backup executor, launcher (`service`)
//! - Scheduling: cron derivation (`cron`) and policy triggers (`scheduler`)
//! - Repositories: store traits the engine persists through (`repository`)

pub mod command;
pub mod config;
pub mod cron;
pub mod error;
pub mod naming;
pub mod remote;
pub mod repository;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::RunnerConfig;
pub use error::{BackupError, Result};
pub use remote::{RemoteChannel, SshChannel};
pub use repository::Stores;
pub use scheduler::BackupScheduler;
pub use service::{BackupExecutor, RunLauncher};
