//! User record.

use crate::model::kind::{require_identity, EntityKind, ModelValidationError};
use crate::model::record::StoredEntity;
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};

/// Account state of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
    Locked,
    /// Must change password at next login.
    ChangePassword,
}

/// User profile owned by the security store.
///
/// Profile fields are opaque to the store; only `id` and `version` drive its
/// behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: UserStatus,
    /// Hashed credential, never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl User {
    /// Creates an active user with empty profile fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl StoredEntity for User {
    type Key = String;

    const KIND: EntityKind = EntityKind::User;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> Option<VersionToken> {
        self.version
    }

    fn set_version(&mut self, version: Option<VersionToken>) {
        self.version = version;
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        require_identity(EntityKind::User, "id", &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserStatus};

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let user: User = serde_json::from_str(
            r#"{"id":"admin","firstName":"Administrator","status":"changepassword"}"#,
        )
        .unwrap();
        assert_eq!(user.id, "admin");
        assert_eq!(user.first_name, "Administrator");
        assert_eq!(user.status, UserStatus::ChangePassword);
        assert!(user.version.is_none());
        assert!(user.password.is_none());
    }
}
