//! Run DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned immediately when a run is started; the run continues in the background
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchedRun {
    pub run_id: Uuid,
}
