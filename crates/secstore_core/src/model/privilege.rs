//! Privilege record.

use crate::model::kind::{require_identity, EntityKind, ModelValidationError};
use crate::model::record::StoredEntity;
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed permission definition. `kind` selects how `properties` are read by
/// the authorization engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Privilege {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Privilege {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Sets one property, returning the updated privilege.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl StoredEntity for Privilege {
    type Key = String;

    const KIND: EntityKind = EntityKind::Privilege;

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
        require_identity(EntityKind::Privilege, "id", &self.id)
    }
}
