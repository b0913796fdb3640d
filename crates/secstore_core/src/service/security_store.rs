//! Security configuration source: database, stores, defaults and lifecycle.
//!
//! # Responsibility
//! - Run bootstrap as the start hook and open the lifecycle gate after it.
//! - Hand out fresh `SecurityConfiguration` views.
//!
//! # Invariants
//! - A failed bootstrap leaves the gate closed; the store never serves a
//!   partially seeded model.

use crate::config::{ConfigError, StoreConfig};
use crate::db::DatabaseInstance;
use crate::defaults::DefaultsProvider;
use crate::lifecycle::{Lifecycle, LifecycleGate, LifecycleState};
use crate::service::bootstrap::{bootstrap, BootstrapReport};
use crate::service::configuration::{ConfigResult, SecurityConfiguration, SecurityConfigError};
use crate::store::RecordStores;
use log::{error, info};
use std::time::Instant;

/// Owner of one security database and its record stores.
pub struct SecurityStore {
    database: DatabaseInstance,
    defaults: Box<dyn DefaultsProvider>,
    stores: RecordStores,
    lifecycle: Lifecycle,
}

impl SecurityStore {
    pub fn new(database: DatabaseInstance, defaults: impl DefaultsProvider + 'static) -> Self {
        Self {
            database,
            defaults: Box::new(defaults),
            stores: RecordStores::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Opens the configured database and defaults. Does not start the store.
    pub fn open(config: &StoreConfig) -> Result<Self, ConfigError> {
        let database = DatabaseInstance::open(&config.database, config.busy_timeout())?;
        let defaults = config.load_defaults()?;
        Ok(Self::new(database, defaults))
    }

    /// Prepares every store, seeding defaults on first use, then opens the gate.
    ///
    /// Returns `None` when the store was already started.
    ///
    /// # Errors
    /// - `Bootstrap` when seeding fails; the store stays closed and later
    ///   starts in this process keep failing.
    pub fn start(&self) -> ConfigResult<Option<BootstrapReport>> {
        let started_at = Instant::now();
        let mut report = None;

        let started = self.lifecycle.start(|| -> ConfigResult<()> {
            info!("event=store_start module=security_store status=start");
            let conn = self.database.acquire()?;
            report = Some(bootstrap(&conn, &self.stores, self.defaults.as_ref())?);
            Ok(())
        });

        match started {
            Ok(true) => {
                info!(
                    "event=store_start module=security_store status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Ok(false) => Ok(None),
            Err(err) => {
                error!(
                    "event=store_start module=security_store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Closes the gate. Returns whether the store was started.
    pub fn stop(&self) -> bool {
        let stopped = self.lifecycle.stop();
        if stopped {
            info!("event=store_stop module=security_store status=ok");
        }
        stopped
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Creates a new configuration view. Calls fail with `NotStarted` while
    /// the store is not started.
    pub fn load_configuration(&self) -> SecurityConfiguration<'_> {
        SecurityConfiguration::new(&self.database, &self.stores, &self.lifecycle)
    }

    /// Number of stored records per kind, for diagnostics.
    pub fn record_counts(&self) -> ConfigResult<RecordCounts> {
        if !self.is_started() {
            return Err(SecurityConfigError::NotStarted);
        }
        let conn = self.database.acquire()?;
        Ok(RecordCounts {
            users: self.stores.users.count(&conn)?,
            roles: self.stores.roles.count(&conn)?,
            privileges: self.stores.privileges.count(&conn)?,
            user_role_mappings: self.stores.user_role_mappings.count(&conn)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub users: u64,
    pub roles: u64,
    pub privileges: u64,
    pub user_role_mappings: u64,
}
