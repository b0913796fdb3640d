//! Generic record store and its SQLite implementation.
//!
//! # Responsibility
//! - Map a `StoredEntity` onto its table: key columns, `version`, JSON body.
//! - Implement compare-and-swap writes and deletes on the `version` column.
//!
//! # Invariants
//! - `write` only succeeds when the stored version equals the handle version.
//! - Read paths reject bodies that do not decode instead of masking them.

use super::registration::{Admission, Registration, RegistrationState};
use crate::db::DbError;
use crate::model::kind::{EntityKind, ModelValidationError};
use crate::model::record::{RecordKey, StoredEntity};
use crate::model::version::VersionToken;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error from a record store operation.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Validation(ModelValidationError),
    Serialization(serde_json::Error),
    /// Insert against an identity that already exists.
    DuplicateKey { kind: EntityKind, key: String },
    /// The record changed (or vanished) after its handle was read.
    ConcurrentModification { kind: EntityKind, key: String },
    /// Entity identity differs from the handle it is written through.
    KeyMismatch {
        kind: EntityKind,
        expected: String,
        actual: String,
    },
    InvalidData(String),
    /// The first-use hook of this store failed earlier in this process.
    RegistrationFailed(EntityKind),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record body serialization failed: {err}"),
            Self::DuplicateKey { kind, key } => write!(f, "{kind} '{key}' already exists"),
            Self::ConcurrentModification { kind, key } => {
                write!(f, "{kind} '{key}' updated in the meantime")
            }
            Self::KeyMismatch {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "{kind} '{actual}' cannot be written through handle of '{expected}'"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record: {message}"),
            Self::RegistrationFailed(kind) => {
                write!(f, "{kind} store failed to initialize in this process")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// A stored record's identity and the version it had when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle<K> {
    key: K,
    version: VersionToken,
}

impl<K> RecordHandle<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn version(&self) -> VersionToken {
        self.version
    }
}

/// Store for one record kind.
///
/// Holds no connection; every operation runs on the connection (or
/// transaction) passed in, so callers control scoping and atomicity.
pub struct RecordStore<E: StoredEntity> {
    registration: Registration,
    _entity: PhantomData<fn() -> E>,
}

impl<E: StoredEntity> Default for RecordStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StoredEntity> RecordStore<E> {
    pub fn new() -> Self {
        Self {
            registration: Registration::new(),
            _entity: PhantomData,
        }
    }

    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    /// Whether `register` completed successfully in this process.
    pub fn is_ready(&self) -> bool {
        self.registration.state() == RegistrationState::Ready
    }

    /// Prepares the backing table for use, running `on_first_use` at most once.
    ///
    /// The hook runs only when this kind has never been registered in the
    /// database, inside the transaction that records the registration; an
    /// error rolls both back. Returns whether the hook ran.
    ///
    /// # Errors
    /// - `RegistrationFailed` when an earlier attempt in this process failed.
    /// - Whatever the hook or storage returns; the store is then `Failed`.
    pub fn register<F>(&self, conn: &Connection, on_first_use: F) -> StoreResult<bool>
    where
        F: FnOnce(&Connection) -> StoreResult<()>,
    {
        let guard = match self.registration.begin() {
            Admission::Initialize(guard) => guard,
            Admission::AlreadyReady => return Ok(false),
            Admission::AlreadyFailed => return Err(StoreError::RegistrationFailed(E::KIND)),
        };

        let outcome = prepare_backing_store(conn, E::KIND, on_first_use);
        guard.complete(outcome.is_ok());
        outcome
    }

    /// Lists every record of this kind from one statement.
    pub fn browse(&self, conn: &Connection) -> StoreResult<Vec<E>> {
        let sql = format!(
            "SELECT version, payload FROM {} ORDER BY {};",
            E::KIND.table(),
            E::Key::COLUMNS.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(decode_record::<E>(row.get(0)?, &row.get::<_, String>(1)?)?);
        }
        Ok(records)
    }

    pub fn read(&self, conn: &Connection, key: &E::Key) -> StoreResult<Option<E>> {
        let sql = format!(
            "SELECT version, payload FROM {} WHERE {};",
            E::KIND.table(),
            key_predicate::<E::Key>()
        );
        let row = conn
            .query_row(&sql, params_from_iter(key.values()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;

        match row {
            Some((version, payload)) => {
                let record = decode_record::<E>(version, &payload)?;
                if record.key() != *key {
                    return Err(StoreError::InvalidData(format!(
                        "{} row '{key}' holds body for '{}'",
                        E::KIND.table(),
                        record.key()
                    )));
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Reads only the identity and current version of a record.
    pub fn read_raw(
        &self,
        conn: &Connection,
        key: &E::Key,
    ) -> StoreResult<Option<RecordHandle<E::Key>>> {
        let sql = format!(
            "SELECT version FROM {} WHERE {};",
            E::KIND.table(),
            key_predicate::<E::Key>()
        );
        let version = conn
            .query_row(&sql, params_from_iter(key.values()), |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;

        Ok(version.map(|version| RecordHandle {
            key: key.clone(),
            version: VersionToken::from_storage(version),
        }))
    }

    /// Inserts a new record at `VersionToken::INITIAL`.
    ///
    /// The caller-supplied version, if any, is ignored.
    pub fn add(&self, conn: &Connection, entity: &E) -> StoreResult<VersionToken> {
        entity.validate()?;
        let key = entity.key();
        let columns = E::Key::COLUMNS;
        let placeholders = (1..=columns.len() + 2)
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}, version, payload) VALUES ({placeholders});",
            E::KIND.table(),
            columns.join(", ")
        );

        let mut values = key_values(&key);
        values.push(Value::Integer(VersionToken::INITIAL.as_storage()));
        values.push(Value::Text(encode_body(entity)?));

        match conn.execute(&sql, params_from_iter(values)) {
            Ok(_) => Ok(VersionToken::INITIAL),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateKey {
                kind: E::KIND,
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Overwrites the record behind `handle`, advancing its version by one.
    ///
    /// # Errors
    /// - `ConcurrentModification` when the stored version moved past the
    ///   handle or the record was deleted since it was read.
    pub fn write(
        &self,
        conn: &Connection,
        handle: &RecordHandle<E::Key>,
        entity: &E,
    ) -> StoreResult<VersionToken> {
        entity.validate()?;
        let key = entity.key();
        if key != handle.key {
            return Err(StoreError::KeyMismatch {
                kind: E::KIND,
                expected: handle.key.to_string(),
                actual: key.to_string(),
            });
        }

        let arity = E::Key::COLUMNS.len();
        let sql = format!(
            "UPDATE {}
             SET payload = ?{}, version = version + 1
             WHERE {} AND version = ?{};",
            E::KIND.table(),
            arity + 1,
            key_predicate::<E::Key>(),
            arity + 2
        );

        let mut values = key_values(&key);
        values.push(Value::Text(encode_body(entity)?));
        values.push(Value::Integer(handle.version.as_storage()));

        let changed = conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StoreError::ConcurrentModification {
                kind: E::KIND,
                key: key.to_string(),
            });
        }

        Ok(handle.version.next())
    }

    /// Removes a record, returning whether it existed.
    ///
    /// # Errors
    /// - `ConcurrentModification` when the record was rewritten between the
    ///   version read and the delete.
    pub fn delete(&self, conn: &Connection, key: &E::Key) -> StoreResult<bool> {
        match self.read_raw(conn, key)? {
            Some(handle) => self.delete_at(conn, &handle),
            None => Ok(false),
        }
    }

    /// Removes the record only if it still has the handle's version.
    ///
    /// Returns `false` when it was deleted since the handle was read.
    pub(crate) fn delete_at(
        &self,
        conn: &Connection,
        handle: &RecordHandle<E::Key>,
    ) -> StoreResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} AND version = ?{};",
            E::KIND.table(),
            key_predicate::<E::Key>(),
            E::Key::COLUMNS.len() + 1
        );
        let mut values = key_values(&handle.key);
        values.push(Value::Integer(handle.version.as_storage()));

        if conn.execute(&sql, params_from_iter(values))? == 1 {
            return Ok(true);
        }

        match self.read_raw(conn, &handle.key)? {
            Some(_) => Err(StoreError::ConcurrentModification {
                kind: E::KIND,
                key: handle.key.to_string(),
            }),
            None => Ok(false),
        }
    }

    pub fn count(&self, conn: &Connection) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {};", E::KIND.table());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative row count {count}")))
    }
}

fn prepare_backing_store<F>(conn: &Connection, kind: EntityKind, on_first_use: F) -> StoreResult<bool>
where
    F: FnOnce(&Connection) -> StoreResult<()>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let first_use = tx.execute(
        "INSERT OR IGNORE INTO store_registrations (kind) VALUES (?1);",
        [kind.table()],
    )? == 1;

    if first_use {
        debug!(
            "event=store_register module=store status=first_use kind={}",
            kind.table()
        );
        on_first_use(&*tx)?;
    }

    tx.commit()?;
    Ok(first_use)
}

fn key_predicate<K: RecordKey>() -> String {
    K::COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn key_values<K: RecordKey>(key: &K) -> Vec<Value> {
    key.values()
        .into_iter()
        .map(|value| Value::Text(value.to_string()))
        .collect()
}

fn encode_body<E: StoredEntity>(entity: &E) -> StoreResult<String> {
    let mut body = entity.clone();
    body.set_version(None);
    Ok(serde_json::to_string(&body)?)
}

fn decode_record<E: StoredEntity>(version: i64, payload: &str) -> StoreResult<E> {
    let mut record: E = serde_json::from_str(payload).map_err(|err| {
        StoreError::InvalidData(format!("undecodable {} body: {err}", E::KIND.table()))
    })?;
    if version < 1 {
        return Err(StoreError::InvalidData(format!(
            "invalid version `{version}` in {}.version",
            E::KIND.table()
        )));
    }
    record.set_version(Some(VersionToken::from_storage(version)));
    Ok(record)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::{RecordStore, StoreError};
    use crate::db::open_db_in_memory;
    use crate::model::mapping::{MappingKey, UserRoleMapping};
    use crate::model::role::Role;
    use crate::model::version::VersionToken;

    #[test]
    fn write_with_stale_handle_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let store = RecordStore::<Role>::new();
        store.add(&conn, &Role::new("dev", "Developers")).unwrap();

        let key = "dev".to_string();
        let first = store.read_raw(&conn, &key).unwrap().unwrap();
        let stale = first.clone();

        let mut role = store.read(&conn, &key).unwrap().unwrap();
        role.description = "first".to_string();
        assert_eq!(store.write(&conn, &first, &role).unwrap(), VersionToken::INITIAL.next());

        role.description = "second".to_string();
        let err = store.write(&conn, &stale, &role).unwrap_err();
        assert!(matches!(err, StoreError::ConcurrentModification { .. }));

        let stored = store.read(&conn, &key).unwrap().unwrap();
        assert_eq!(stored.description, "first");
        assert_eq!(stored.version, Some(VersionToken::INITIAL.next()));
    }

    #[test]
    fn delete_with_stale_handle_keeps_rewritten_record() {
        let conn = open_db_in_memory().unwrap();
        let store = RecordStore::<Role>::new();
        store.add(&conn, &Role::new("dev", "Developers")).unwrap();

        let key = "dev".to_string();
        let handle = store.read_raw(&conn, &key).unwrap().unwrap();
        let mut role = store.read(&conn, &key).unwrap().unwrap();
        role.description = "rewritten".to_string();
        store.write(&conn, &handle, &role).unwrap();

        let err = store.delete_at(&conn, &handle).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrentModification { ref key, .. } if key == "dev"
        ));
        let stored = store.read(&conn, &key).unwrap().unwrap();
        assert_eq!(stored.description, "rewritten");
    }

    #[test]
    fn delete_with_handle_of_removed_record_is_false() {
        let conn = open_db_in_memory().unwrap();
        let store = RecordStore::<Role>::new();
        store.add(&conn, &Role::new("dev", "Developers")).unwrap();
        let key = "dev".to_string();
        let handle = store.read_raw(&conn, &key).unwrap().unwrap();

        assert!(store.delete(&conn, &key).unwrap());
        assert!(!store.delete_at(&conn, &handle).unwrap());
    }

    #[test]
    fn write_through_foreign_handle_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let store = RecordStore::<Role>::new();
        store.add(&conn, &Role::new("a", "A")).unwrap();
        let handle = store.read_raw(&conn, &"a".to_string()).unwrap().unwrap();

        let err = store.write(&conn, &handle, &Role::new("b", "B")).unwrap_err();
        assert!(matches!(err, StoreError::KeyMismatch { .. }));
    }

    #[test]
    fn composite_keys_are_independent() {
        let conn = open_db_in_memory().unwrap();
        let store = RecordStore::<UserRoleMapping>::new();
        store
            .add(&conn, &UserRoleMapping::new("alice", "default", vec!["a".to_string()]))
            .unwrap();
        store
            .add(&conn, &UserRoleMapping::new("alice", "ldap", vec!["b".to_string()]))
            .unwrap();

        let ldap = store
            .read(&conn, &MappingKey::new("alice", "ldap"))
            .unwrap()
            .unwrap();
        assert!(ldap.roles.contains("b"));
        assert_eq!(store.count(&conn).unwrap(), 2);

        assert!(store.delete(&conn, &MappingKey::new("alice", "ldap")).unwrap());
        assert!(!store.delete(&conn, &MappingKey::new("alice", "ldap")).unwrap());
        assert_eq!(store.count(&conn).unwrap(), 1);
    }

    #[test]
    fn corrupt_body_is_reported_not_masked() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO roles (id, version, payload) VALUES ('broken', 1, 'not json');",
            [],
        )
        .unwrap();

        let store = RecordStore::<Role>::new();
        let err = store.read(&conn, &"broken".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
