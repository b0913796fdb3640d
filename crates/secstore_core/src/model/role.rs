//! Role record.

use crate::model::kind::{require_identity, EntityKind, ModelValidationError};
use crate::model::record::StoredEntity;
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Named grant of privileges, optionally composed of other roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub read_only: bool,
    /// Privilege ids granted directly. Not checked against stored privileges.
    #[serde(default)]
    pub privileges: BTreeSet<String>,
    /// Nested role ids.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl StoredEntity for Role {
    type Key = String;

    const KIND: EntityKind = EntityKind::Role;

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
        require_identity(EntityKind::Role, "id", &self.id)
    }
}
