//! Target domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default SSH port for targets that don't configure one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A remote host configured as a backup source
///
/// Immutable for the duration of a run. Secrets are accepted on input but
/// never serialized back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub private_key_path: Option<String>,

    /// Dedicated local storage root for this target
    pub local_path: Option<String>,
    #[serde(default)]
    pub custom_paths: Vec<String>,

    pub backup_www: bool,
    pub backup_logs: bool,
    pub backup_nginx: bool,
    pub backup_db: bool,

    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    #[serde(default, skip_serializing)]
    pub db_password: Option<String>,
    /// Explicit database list; `None` means every database
    pub db_names: Option<Vec<String>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Target {
    /// Human readable name, falling back to `user@host`
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}@{}", self.username, self.host),
        }
    }

    /// Password auth wins over key auth when both are configured
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn private_key_path(&self) -> Option<&str> {
        self.private_key_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Configured database host; blank values count as unset
    pub fn db_host(&self) -> Option<&str> {
        self.db_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    pub fn db_user(&self) -> Option<&str> {
        self.db_user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Returns the explicit database names, or `None` for "dump all"
    pub fn selected_databases(&self) -> Option<Vec<&str>> {
        let names: Vec<&str> = self
            .db_names
            .as_ref()?
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();

        if names.is_empty() { None } else { Some(names) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target {
            id: Uuid::new_v4(),
            name: None,
            host: "db1.internal".to_string(),
            port: DEFAULT_SSH_PORT,
            username: "deploy".to_string(),
            password: None,
            private_key_path: None,
            local_path: None,
            custom_paths: vec![],
            backup_www: false,
            backup_logs: false,
            backup_nginx: false,
            backup_db: false,
            db_host: None,
            db_port: None,
            db_user: None,
            db_password: None,
            db_names: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_user_at_host() {
        let mut t = target();
        assert_eq!(t.display_name(), "deploy@db1.internal");

        t.name = Some("   ".to_string());
        assert_eq!(t.display_name(), "deploy@db1.internal");

        t.name = Some("Shop frontend".to_string());
        assert_eq!(t.display_name(), "Shop frontend");
    }

    #[test]
    fn test_selected_databases_ignores_blank_names() {
        let mut t = target();
        assert!(t.selected_databases().is_none());

        t.db_names = Some(vec!["".to_string(), "  ".to_string()]);
        assert!(t.selected_databases().is_none());

        t.db_names = Some(vec!["shop".to_string(), " crm ".to_string()]);
        assert_eq!(t.selected_databases(), Some(vec!["shop", "crm"]));
    }

    #[test]
    fn test_blank_db_host_counts_as_unset() {
        let mut t = target();
        assert_eq!(t.db_host(), None);

        t.db_host = Some("   ".to_string());
        assert_eq!(t.db_host(), None);

        t.db_host = Some(" db.internal ".to_string());
        assert_eq!(t.db_host(), Some("db.internal"));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut t = target();
        t.password = Some("hunter2".to_string());
        t.db_password = Some("s3cret".to_string());

        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("s3cret"));
    }
}
