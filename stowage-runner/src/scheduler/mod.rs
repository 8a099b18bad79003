//! Scheduler layer
//!
//! Keeps one recurring cron trigger per enabled schedule policy and launches
//! backup runs when a trigger fires.

pub mod jobs;

pub use jobs::BackupScheduler;
