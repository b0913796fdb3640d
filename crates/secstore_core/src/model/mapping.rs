//! User to role mapping record.
//!
//! # Invariants
//! - At most one mapping exists per `(user_id, source)`.
//! - Mappings under `DEFAULT_SOURCE` follow the lifecycle of the stored user
//!   with the same id.

use crate::model::kind::{require_identity, EntityKind, ModelValidationError};
use crate::model::record::{RecordKey, StoredEntity};
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Source of users managed by this store.
pub const DEFAULT_SOURCE: &str = "default";

/// Composite identity of a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub user_id: String,
    pub source: String,
}

impl MappingKey {
    pub fn new(user_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            source: source.into(),
        }
    }
}

/// Renders `user/source`. Mapping errors carry this form, never the bare
/// user id.
impl Display for MappingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.source)
    }
}

impl RecordKey for MappingKey {
    const COLUMNS: &'static [&'static str] = &["user_id", "source"];

    fn values(&self) -> Vec<&str> {
        vec![self.user_id.as_str(), self.source.as_str()]
    }
}

/// Roles held by one user as seen from one identity source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleMapping {
    pub user_id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl UserRoleMapping {
    pub fn new(
        user_id: impl Into<String>,
        source: impl Into<String>,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source: source.into(),
            version: None,
            roles: roles.into_iter().collect(),
        }
    }

    /// Mapping for a user of this store, without a version (unconditional).
    pub fn default_source(user_id: impl Into<String>, roles: BTreeSet<String>) -> Self {
        Self {
            user_id: user_id.into(),
            source: DEFAULT_SOURCE.to_string(),
            version: None,
            roles,
        }
    }
}

impl StoredEntity for UserRoleMapping {
    type Key = MappingKey;

    const KIND: EntityKind = EntityKind::UserRoleMapping;

    fn key(&self) -> MappingKey {
        MappingKey::new(self.user_id.clone(), self.source.clone())
    }

    fn version(&self) -> Option<VersionToken> {
        self.version
    }

    fn set_version(&mut self, version: Option<VersionToken>) {
        self.version = version;
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        require_identity(EntityKind::UserRoleMapping, "userId", &self.user_id)?;
        require_identity(EntityKind::UserRoleMapping, "source", &self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::{MappingKey, UserRoleMapping, DEFAULT_SOURCE};
    use crate::model::record::{RecordKey, StoredEntity};

    #[test]
    fn key_binds_user_then_source() {
        let key = MappingKey::new("alice", "ldap");
        assert_eq!(key.values(), vec!["alice", "ldap"]);
        assert_eq!(key.to_string(), "alice/ldap");
    }

    #[test]
    fn blank_source_is_rejected() {
        let mapping = UserRoleMapping::new("alice", " ", Vec::new());
        assert!(mapping.validate().is_err());
        let mapping = UserRoleMapping::default_source("alice", Default::default());
        assert_eq!(mapping.source, DEFAULT_SOURCE);
        assert!(mapping.validate().is_ok());
    }
}
