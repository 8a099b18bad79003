//! Schedule policy domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stored recurring-trigger definition
///
/// `target_id = None` means the policy runs for every known target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePolicy {
    pub id: Uuid,
    pub target_id: Option<Uuid>,
    pub kind: ScheduleKind,
    /// `HH:MM`, defaults to 02:00 when absent
    pub time_of_day: Option<String>,
    /// 0-6, Sunday = 0
    pub day_of_week: Option<u8>,
    /// 1-31
    pub day_of_month: Option<u8>,
    /// Raw expression for `Custom`; the derived one for other kinds once scheduled
    pub cron_expression: Option<String>,
    pub enabled: bool,
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Daily => "daily",
            ScheduleKind::Weekly => "weekly",
            ScheduleKind::Monthly => "monthly",
            ScheduleKind::Custom => "custom",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ScheduleKind::Daily),
            "weekly" => Ok(ScheduleKind::Weekly),
            "monthly" => Ok(ScheduleKind::Monthly),
            "custom" => Ok(ScheduleKind::Custom),
            other => Err(format!("unknown schedule kind: {}", other)),
        }
    }
}
