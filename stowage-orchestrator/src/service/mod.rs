//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and the backup engine.

pub mod policy;
pub mod run;
pub mod settings;
pub mod target;

// Re-export for convenience
pub use policy as policy_service;
pub use run as run_service;
pub use settings as settings_service;
pub use target as target_service;
