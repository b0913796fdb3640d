//! Read-only source of the records seeded into an empty security store.
//!
//! # Responsibility
//! - Define the provider contract consulted once by bootstrap.
//! - Ship built-in defaults and load replacements from JSON.

use crate::model::mapping::UserRoleMapping;
use crate::model::privilege::Privilege;
use crate::model::role::Role;
use crate::model::user::User;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const BUILTIN_DEFAULTS_JSON: &str = include_str!("builtin.json");

/// Supplier of default records, one list per kind.
pub trait DefaultsProvider: Send + Sync {
    fn users(&self) -> Vec<User>;
    fn roles(&self) -> Vec<Role>;
    fn privileges(&self) -> Vec<Privilege>;
    fn user_role_mappings(&self) -> Vec<UserRoleMapping>;
}

/// Error while loading a defaults document.
#[derive(Debug)]
pub enum DefaultsError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for DefaultsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read defaults `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid defaults document: {err}"),
        }
    }
}

impl Error for DefaultsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for DefaultsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// In-memory defaults document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityDefaults {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub privileges: Vec<Privilege>,
    #[serde(default)]
    pub user_role_mappings: Vec<UserRoleMapping>,
}

impl SecurityDefaults {
    /// Defaults shipped with the crate: `admin` and `anonymous` users, their
    /// roles, privileges and default-source mappings.
    pub fn builtin() -> Result<Self, DefaultsError> {
        Self::from_json_str(BUILTIN_DEFAULTS_JSON)
    }

    pub fn from_json_str(json: &str) -> Result<Self, DefaultsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefaultsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DefaultsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

impl DefaultsProvider for SecurityDefaults {
    fn users(&self) -> Vec<User> {
        self.users.clone()
    }

    fn roles(&self) -> Vec<Role> {
        self.roles.clone()
    }

    fn privileges(&self) -> Vec<Privilege> {
        self.privileges.clone()
    }

    fn user_role_mappings(&self) -> Vec<UserRoleMapping> {
        self.user_role_mappings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{DefaultsError, SecurityDefaults};
    use crate::model::mapping::DEFAULT_SOURCE;

    #[test]
    fn builtin_defaults_are_consistent() {
        let defaults = SecurityDefaults::builtin().unwrap();
        assert_eq!(defaults.users.len(), 2);
        assert_eq!(defaults.roles.len(), 2);
        assert_eq!(defaults.privileges.len(), 3);

        for mapping in &defaults.user_role_mappings {
            assert_eq!(mapping.source, DEFAULT_SOURCE);
            assert!(defaults.users.iter().any(|user| user.id == mapping.user_id));
            for role in &mapping.roles {
                assert!(defaults.roles.iter().any(|candidate| &candidate.id == role));
            }
        }
        for role in &defaults.roles {
            for privilege in &role.privileges {
                assert!(defaults.privileges.iter().any(|p| &p.id == privilege));
            }
        }
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let defaults = SecurityDefaults::from_json_str(r#"{"roles":[{"id":"r"}]}"#).unwrap();
        assert!(defaults.users.is_empty());
        assert_eq!(defaults.roles.len(), 1);
        assert!(defaults.user_role_mappings.is_empty());
    }

    #[test]
    fn unreadable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = SecurityDefaults::from_path(&missing).unwrap_err();
        assert!(matches!(err, DefaultsError::Io { ref path, .. } if *path == missing));
    }
}
