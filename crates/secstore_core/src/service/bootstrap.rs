//! One-time seeding of freshly prepared stores from a defaults provider.
//!
//! # Invariants
//! - Seeding of a kind happens inside that store's registration hook, in
//!   the transaction that marks the kind as prepared.
//! - Any failure aborts the whole bootstrap; the failed kind is rolled back
//!   and later kinds are not attempted.

use crate::defaults::DefaultsProvider;
use crate::model::kind::EntityKind;
use crate::model::record::StoredEntity;
use crate::store::{RecordStore, RecordStores, StoreError};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fatal failure while preparing one kind.
#[derive(Debug)]
pub struct BootstrapError {
    pub kind: EntityKind,
    pub source: StoreError,
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to initialize {} store: {}", self.kind, self.source)
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// What bootstrap did for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindBootstrap {
    pub kind: EntityKind,
    /// The kind was prepared for the first time by this call.
    pub first_use: bool,
    /// Default records inserted.
    pub seeded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub kinds: Vec<KindBootstrap>,
}

impl BootstrapReport {
    pub fn seeded(&self, kind: EntityKind) -> usize {
        self.kinds
            .iter()
            .find(|entry| entry.kind == kind)
            .map_or(0, |entry| entry.seeded)
    }
}

/// Registers every store, seeding defaults into the ones prepared now.
pub fn bootstrap(
    conn: &Connection,
    stores: &RecordStores,
    defaults: &dyn DefaultsProvider,
) -> Result<BootstrapReport, BootstrapError> {
    let kinds = vec![
        seed_kind(conn, &stores.users, || defaults.users())?,
        seed_kind(conn, &stores.roles, || defaults.roles())?,
        seed_kind(conn, &stores.privileges, || defaults.privileges())?,
        seed_kind(conn, &stores.user_role_mappings, || {
            defaults.user_role_mappings()
        })?,
    ];
    Ok(BootstrapReport { kinds })
}

fn seed_kind<E, F>(
    conn: &Connection,
    store: &RecordStore<E>,
    load_defaults: F,
) -> Result<KindBootstrap, BootstrapError>
where
    E: StoredEntity,
    F: FnOnce() -> Vec<E>,
{
    let mut seeded = 0;
    let first_use = store
        .register(conn, |conn| {
            let records = load_defaults();
            if records.is_empty() {
                return Ok(());
            }

            info!(
                "event=store_bootstrap module=bootstrap status=start kind={} count={}",
                E::KIND.table(),
                records.len()
            );
            for record in &records {
                store.add(conn, record)?;
            }
            seeded = records.len();
            Ok(())
        })
        .map_err(|source| BootstrapError {
            kind: E::KIND,
            source,
        })?;

    Ok(KindBootstrap {
        kind: E::KIND,
        first_use,
        seeded,
    })
}
