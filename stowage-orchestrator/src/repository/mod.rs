//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity;
//! `PgStore` exposes them to the backup engine through its store traits.

pub mod policy;
pub mod run;
pub mod settings;
pub mod store;
pub mod target;

// Re-export for convenience
pub use policy as policy_repository;
pub use run as run_repository;
pub use settings as settings_repository;
pub use store::PgStore;
pub use target as target_repository;
