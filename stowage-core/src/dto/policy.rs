//! Schedule policy DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::policy::ScheduleKind;

/// Request to create or replace a schedule policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub target_id: Option<Uuid>,
    pub kind: ScheduleKind,
    pub time_of_day: Option<String>,
    pub day_of_week: Option<u8>,
    pub day_of_month: Option<u8>,
    pub cron_expression: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Result of firing a policy by hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRunResult {
    pub policy_id: Uuid,
    /// Runs started; busy targets are skipped
    pub launched: usize,
}
