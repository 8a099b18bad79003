//! Target DTOs

use serde::{Deserialize, Serialize};

use crate::domain::target::DEFAULT_SSH_PORT;

/// Request to register a new backup target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTarget {
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub local_path: Option<String>,
    #[serde(default)]
    pub custom_paths: Vec<String>,
    #[serde(default)]
    pub backup_www: bool,
    #[serde(default)]
    pub backup_logs: bool,
    #[serde(default)]
    pub backup_nginx: bool,
    #[serde(default)]
    pub backup_db: bool,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_names: Option<Vec<String>>,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}
