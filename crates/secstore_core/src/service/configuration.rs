//! Typed CRUD facade over the four record stores.
//!
//! # Responsibility
//! - Gate every call on the lifecycle and scope one connection per call.
//! - Apply the version check before writes and translate storage races into
//!   `ConcurrentModification`.
//! - Keep each user's default-source mapping in step with the user record.
//!
//! # Invariants
//! - `add_user`, `update_user` and `remove_user` touch user and mapping in one
//!   immediate transaction.
//! - A caller-supplied version must equal the stored version; no version
//!   means an unconditional write.
//! - Reads return `None`/empty on missing data, never `NotFound`.

use crate::db::{DatabaseInstance, DbConnection, DbError};
use crate::lifecycle::LifecycleGate;
use crate::model::kind::{EntityKind, ModelValidationError};
use crate::model::mapping::{MappingKey, UserRoleMapping, DEFAULT_SOURCE};
use crate::model::privilege::Privilege;
use crate::model::record::StoredEntity;
use crate::model::role::Role;
use crate::model::user::User;
use crate::model::version::VersionToken;
use crate::service::bootstrap::BootstrapError;
use crate::store::{RecordStore, RecordStores, StoreError};
use log::trace;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ConfigResult<T> = Result<T, SecurityConfigError>;

/// Error surfaced by security configuration operations.
#[derive(Debug)]
pub enum SecurityConfigError {
    /// The store has not been started (or was stopped).
    NotStarted,
    /// Update against a record that does not exist.
    NotFound { kind: EntityKind, id: String },
    /// The record changed since the caller (or this call) read it.
    ConcurrentModification { kind: EntityKind, id: String },
    /// Add against an identity that already exists.
    DuplicateKey { kind: EntityKind, id: String },
    Invalid(ModelValidationError),
    Store(StoreError),
    /// Seeding defaults failed; the store did not start.
    Bootstrap(BootstrapError),
}

impl Display for SecurityConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "security store is not started"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::ConcurrentModification { kind, id } => {
                write!(f, "{kind} '{id}' updated in the meantime")
            }
            Self::DuplicateKey { kind, id } => write!(f, "{kind} '{id}' already exists"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Bootstrap(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SecurityConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Bootstrap(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SecurityConfigError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ConcurrentModification { kind, key } => {
                Self::ConcurrentModification { kind, id: key }
            }
            StoreError::DuplicateKey { kind, key } => Self::DuplicateKey { kind, id: key },
            StoreError::Validation(err) => Self::Invalid(err),
            other => Self::Store(other),
        }
    }
}

impl From<DbError> for SecurityConfigError {
    fn from(value: DbError) -> Self {
        Self::Store(StoreError::Db(value))
    }
}

impl From<rusqlite::Error> for SecurityConfigError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(value))
    }
}

impl From<ModelValidationError> for SecurityConfigError {
    fn from(value: ModelValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<BootstrapError> for SecurityConfigError {
    fn from(value: BootstrapError) -> Self {
        Self::Bootstrap(value)
    }
}

/// Stateless view over a started security store.
///
/// Cheap to create; holds only borrows of the store's database, record
/// stores and lifecycle gate.
pub struct SecurityConfiguration<'a> {
    database: &'a DatabaseInstance,
    stores: &'a RecordStores,
    gate: &'a dyn LifecycleGate,
}

impl<'a> SecurityConfiguration<'a> {
    pub fn new(
        database: &'a DatabaseInstance,
        stores: &'a RecordStores,
        gate: &'a dyn LifecycleGate,
    ) -> Self {
        Self {
            database,
            stores,
            gate,
        }
    }

    fn open_db(&self) -> ConfigResult<DbConnection<'a>> {
        if !self.gate.is_started() {
            return Err(SecurityConfigError::NotStarted);
        }
        Ok(self.database.acquire()?)
    }

    //
    // Users
    //

    pub fn get_users(&self) -> ConfigResult<Vec<User>> {
        trace!("event=user_browse module=security_config");
        let conn = self.open_db()?;
        Ok(self.stores.users.browse(&conn)?)
    }

    pub fn get_user(&self, id: &str) -> ConfigResult<Option<User>> {
        trace!("event=user_get module=security_config user_id={id}");
        let conn = self.open_db()?;
        Ok(self.stores.users.read(&conn, &id.to_string())?)
    }

    /// Adds a user together with its default-source mapping to `roles`.
    ///
    /// # Errors
    /// - `DuplicateKey` when the user, or a default-source mapping for its
    ///   id, already exists. Nothing is stored in that case.
    pub fn add_user(&self, user: &User, roles: BTreeSet<String>) -> ConfigResult<VersionToken> {
        trace!("event=user_add module=security_config user_id={}", user.id);
        let conn = self.open_db()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let version = self.stores.users.add(&tx, user)?;
        self.stores
            .user_role_mappings
            .add(&tx, &UserRoleMapping::default_source(&user.id, roles))?;

        tx.commit()?;
        Ok(version)
    }

    /// Updates a user and replaces its default-source roles.
    ///
    /// A missing default-source mapping is created rather than reported.
    ///
    /// # Errors
    /// - `NotFound` when the user does not exist.
    /// - `ConcurrentModification` when `user.version` is stale.
    pub fn update_user(&self, user: &User, roles: BTreeSet<String>) -> ConfigResult<VersionToken> {
        trace!("event=user_update module=security_config user_id={}", user.id);
        let conn = self.open_db()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let version = update_record(&tx, &self.stores.users, user)?;

        let mapping = UserRoleMapping::default_source(&user.id, roles);
        match update_record(&tx, &self.stores.user_role_mappings, &mapping) {
            Ok(_) => {}
            Err(SecurityConfigError::NotFound { .. }) => {
                trace!(
                    "event=user_update module=security_config status=mapping_created user_id={}",
                    user.id
                );
                self.stores.user_role_mappings.add(&tx, &mapping)?;
            }
            Err(err) => return Err(err),
        }

        tx.commit()?;
        Ok(version)
    }

    /// Removes a user and, when it existed, its default-source mapping.
    ///
    /// Returns whether the user existed. A missing mapping is not an error.
    pub fn remove_user(&self, id: &str) -> ConfigResult<bool> {
        trace!("event=user_remove module=security_config user_id={id}");
        let conn = self.open_db()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let removed = self.stores.users.delete(&tx, &id.to_string())?;
        if removed {
            self.stores
                .user_role_mappings
                .delete(&tx, &MappingKey::new(id, DEFAULT_SOURCE))?;
        }

        tx.commit()?;
        Ok(removed)
    }

    //
    // Privileges
    //

    pub fn get_privileges(&self) -> ConfigResult<Vec<Privilege>> {
        trace!("event=privilege_browse module=security_config");
        let conn = self.open_db()?;
        Ok(self.stores.privileges.browse(&conn)?)
    }

    pub fn get_privilege(&self, id: &str) -> ConfigResult<Option<Privilege>> {
        trace!("event=privilege_get module=security_config privilege_id={id}");
        let conn = self.open_db()?;
        Ok(self.stores.privileges.read(&conn, &id.to_string())?)
    }

    pub fn add_privilege(&self, privilege: &Privilege) -> ConfigResult<VersionToken> {
        trace!(
            "event=privilege_add module=security_config privilege_id={}",
            privilege.id
        );
        let conn = self.open_db()?;
        Ok(self.stores.privileges.add(&conn, privilege)?)
    }

    pub fn update_privilege(&self, privilege: &Privilege) -> ConfigResult<VersionToken> {
        trace!(
            "event=privilege_update module=security_config privilege_id={}",
            privilege.id
        );
        let conn = self.open_db()?;
        update_record(&conn, &self.stores.privileges, privilege)
    }

    /// Roles referencing the privilege are left untouched.
    pub fn remove_privilege(&self, id: &str) -> ConfigResult<bool> {
        trace!("event=privilege_remove module=security_config privilege_id={id}");
        let conn = self.open_db()?;
        Ok(self.stores.privileges.delete(&conn, &id.to_string())?)
    }

    //
    // Roles
    //

    pub fn get_roles(&self) -> ConfigResult<Vec<Role>> {
        trace!("event=role_browse module=security_config");
        let conn = self.open_db()?;
        Ok(self.stores.roles.browse(&conn)?)
    }

    pub fn get_role(&self, id: &str) -> ConfigResult<Option<Role>> {
        trace!("event=role_get module=security_config role_id={id}");
        let conn = self.open_db()?;
        Ok(self.stores.roles.read(&conn, &id.to_string())?)
    }

    pub fn add_role(&self, role: &Role) -> ConfigResult<VersionToken> {
        trace!("event=role_add module=security_config role_id={}", role.id);
        let conn = self.open_db()?;
        Ok(self.stores.roles.add(&conn, role)?)
    }

    pub fn update_role(&self, role: &Role) -> ConfigResult<VersionToken> {
        trace!("event=role_update module=security_config role_id={}", role.id);
        let conn = self.open_db()?;
        update_record(&conn, &self.stores.roles, role)
    }

    /// Mappings referencing the role are left untouched.
    pub fn remove_role(&self, id: &str) -> ConfigResult<bool> {
        trace!("event=role_remove module=security_config role_id={id}");
        let conn = self.open_db()?;
        Ok(self.stores.roles.delete(&conn, &id.to_string())?)
    }

    //
    // User-role mappings
    //

    pub fn get_user_role_mappings(&self) -> ConfigResult<Vec<UserRoleMapping>> {
        trace!("event=mapping_browse module=security_config");
        let conn = self.open_db()?;
        Ok(self.stores.user_role_mappings.browse(&conn)?)
    }

    pub fn get_user_role_mapping(
        &self,
        user_id: &str,
        source: &str,
    ) -> ConfigResult<Option<UserRoleMapping>> {
        trace!("event=mapping_get module=security_config user_id={user_id} source={source}");
        let conn = self.open_db()?;
        Ok(self
            .stores
            .user_role_mappings
            .read(&conn, &MappingKey::new(user_id, source))?)
    }

    pub fn add_user_role_mapping(&self, mapping: &UserRoleMapping) -> ConfigResult<VersionToken> {
        trace!(
            "event=mapping_add module=security_config user_id={} source={}",
            mapping.user_id,
            mapping.source
        );
        let conn = self.open_db()?;
        Ok(self.stores.user_role_mappings.add(&conn, mapping)?)
    }

    pub fn update_user_role_mapping(
        &self,
        mapping: &UserRoleMapping,
    ) -> ConfigResult<VersionToken> {
        trace!(
            "event=mapping_update module=security_config user_id={} source={}",
            mapping.user_id,
            mapping.source
        );
        let conn = self.open_db()?;
        update_record(&conn, &self.stores.user_role_mappings, mapping)
    }

    pub fn remove_user_role_mapping(&self, user_id: &str, source: &str) -> ConfigResult<bool> {
        trace!("event=mapping_remove module=security_config user_id={user_id} source={source}");
        let conn = self.open_db()?;
        Ok(self
            .stores
            .user_role_mappings
            .delete(&conn, &MappingKey::new(user_id, source))?)
    }
}

/// Read handle, check caller version, write through the handle.
fn update_record<E: StoredEntity>(
    conn: &Connection,
    store: &RecordStore<E>,
    entity: &E,
) -> ConfigResult<VersionToken> {
    entity.validate()?;
    let key = entity.key();
    let handle = store
        .read_raw(conn, &key)?
        .ok_or_else(|| SecurityConfigError::NotFound {
            kind: E::KIND,
            id: key.to_string(),
        })?;

    if let Some(expected) = entity.version() {
        if expected != handle.version() {
            return Err(SecurityConfigError::ConcurrentModification {
                kind: E::KIND,
                id: key.to_string(),
            });
        }
    }

    Ok(store.write(conn, &handle, entity)?)
}
