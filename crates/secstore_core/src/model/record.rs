//! Contracts that let one generic store persist every record kind.

use crate::model::kind::{EntityKind, ModelValidationError};
use crate::model::version::VersionToken;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// Identity of a stored record, mapped onto one or more key columns.
pub trait RecordKey: Clone + PartialEq + Display {
    /// Key column names, in bind order.
    const COLUMNS: &'static [&'static str];

    /// Key values, aligned with `COLUMNS`.
    fn values(&self) -> Vec<&str>;
}

impl RecordKey for String {
    const COLUMNS: &'static [&'static str] = &["id"];

    fn values(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

/// A record kind persisted by `RecordStore`.
///
/// The serialized body excludes `version`; storage keeps it in its own column.
pub trait StoredEntity: Clone + Serialize + DeserializeOwned {
    type Key: RecordKey;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    fn version(&self) -> Option<VersionToken>;

    fn set_version(&mut self, version: Option<VersionToken>);

    /// Checks the shape storage relies on (non-blank identity).
    fn validate(&self) -> Result<(), ModelValidationError>;
}
