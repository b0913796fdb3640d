//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the store.
//! - Trigger schema migrations before the first usable connection.
//!
//! # Invariants
//! - File connections run in WAL mode with a busy timeout, so writers queue
//!   on the database lock instead of failing immediately.
//! - `open_db*` connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info, trace};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Busy timeout applied when configuration does not override it.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let outcome = configure_connection(&conn, busy_timeout, true)
        .and_then(|()| apply_migrations(&mut conn));
    match outcome {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode=file duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens a private in-memory database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    let mut conn = Connection::open_in_memory()?;

    if let Err(err) = configure_connection(&conn, DEFAULT_BUSY_TIMEOUT, false)
        .and_then(|()| apply_migrations(&mut conn))
    {
        error!(
            "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_bootstrap_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode=memory duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

/// Opens one more connection to an already migrated database file.
///
/// Used for per-operation acquisition; does not re-run migrations. WAL mode
/// is persistent in the file once `open_db` set it.
pub fn connect_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn, busy_timeout, false)?;
    trace!("event=db_connect module=db status=ok");
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration, wal: bool) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    if wal {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    Ok(())
}
