//! Settings DTOs

use serde::{Deserialize, Serialize};

/// Global default local backup root; `None` means the engine's own default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupPathSetting {
    pub path: Option<String>,
}
