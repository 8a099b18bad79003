//! Service layer
//!
//! Run execution and everything it leans on: the per-run log, the transfer
//! strategy and the background launcher.

mod execution;
mod launcher;
mod run_log;
pub mod transfer;

pub use execution::{BackupExecutor, RunPlan};
pub use launcher::RunLauncher;
pub use run_log::RunLog;
pub use transfer::{TransferOutcome, TransferStrategy};
