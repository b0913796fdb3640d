//! Shared handle to the security database.
//!
//! # Responsibility
//! - Own the database location and open it once (schema included).
//! - Hand out scoped connections; dropping the guard releases it.
//!
//! # Invariants
//! - File databases give every acquisition its own connection.
//! - The in-memory database lives in a single connection, so acquisitions
//!   are serialized by a mutex. A caller must not acquire twice on one thread.

use super::open::{connect_db, open_db, open_db_in_memory, DEFAULT_BUSY_TIMEOUT};
use super::DbResult;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Where the security database lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// Process-private database, discarded with the instance.
    #[default]
    Memory,
    File { path: PathBuf },
}

enum Backend {
    Memory(Mutex<Connection>),
    File { path: PathBuf },
}

/// Opened security database.
pub struct DatabaseInstance {
    backend: Backend,
    busy_timeout: Duration,
}

/// Connection acquired for the duration of one store operation.
pub enum DbConnection<'a> {
    Owned(Connection),
    Shared(MutexGuard<'a, Connection>),
}

impl Deref for DbConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Owned(conn) => conn,
            Self::Shared(guard) => &**guard,
        }
    }
}

impl DatabaseInstance {
    /// Opens the database at `location`, applying migrations.
    pub fn open(location: &DatabaseLocation, busy_timeout: Duration) -> DbResult<Self> {
        match location {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File { path } => Self::open_file_with_timeout(path, busy_timeout),
        }
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = open_db_in_memory()?;
        Ok(Self {
            backend: Backend::Memory(Mutex::new(conn)),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    pub fn open_file(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_file_with_timeout(path.as_ref(), DEFAULT_BUSY_TIMEOUT)
    }

    fn open_file_with_timeout(path: &Path, busy_timeout: Duration) -> DbResult<Self> {
        // Migrations run once here; the bootstrap connection is not kept.
        drop(open_db(path, busy_timeout)?);
        Ok(Self {
            backend: Backend::File {
                path: path.to_path_buf(),
            },
            busy_timeout,
        })
    }

    /// Acquires a connection for one operation.
    pub fn acquire(&self) -> DbResult<DbConnection<'_>> {
        match &self.backend {
            Backend::Memory(conn) => Ok(DbConnection::Shared(
                conn.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            Backend::File { path } => Ok(DbConnection::Owned(connect_db(
                path,
                self.busy_timeout,
            )?)),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.backend, Backend::Memory(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{DatabaseInstance, DatabaseLocation};
    use std::time::Duration;

    #[test]
    fn memory_acquisitions_share_one_database() {
        let db = DatabaseInstance::open_in_memory().unwrap();
        {
            let conn = db.acquire().unwrap();
            conn.execute(
                "INSERT INTO roles (id, version, payload) VALUES ('r', 1, '{}');",
                [],
            )
            .unwrap();
        }
        let conn = db.acquire().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM roles;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn file_acquisitions_see_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let location = DatabaseLocation::File {
            path: dir.path().join("security.db"),
        };
        let db = DatabaseInstance::open(&location, Duration::from_secs(1)).unwrap();
        assert!(!db.is_in_memory());

        db.acquire()
            .unwrap()
            .execute(
                "INSERT INTO privileges (id, version, payload) VALUES ('p', 1, '{}');",
                [],
            )
            .unwrap();
        let count: i64 = db
            .acquire()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM privileges;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn location_deserializes_from_tagged_json() {
        let location: DatabaseLocation =
            serde_json::from_str(r#"{"kind":"file","path":"/var/lib/security.db"}"#).unwrap();
        assert_eq!(
            location,
            DatabaseLocation::File {
                path: "/var/lib/security.db".into()
            }
        );
    }
}
