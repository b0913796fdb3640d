//! Persistence core for an authorization model.
//! This crate is the single writer of users, roles, privileges and user/role
//! mappings, with optimistic concurrency and first-run default seeding.

pub mod config;
pub mod db;
pub mod defaults;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use db::{DatabaseInstance, DatabaseLocation};
pub use defaults::{DefaultsError, DefaultsProvider, SecurityDefaults};
pub use lifecycle::{Lifecycle, LifecycleGate, LifecycleState};
pub use logging::{default_log_level, init_logging, logging_status, LoggingStatus};
pub use model::kind::{EntityKind, ModelValidationError};
pub use model::mapping::{MappingKey, UserRoleMapping, DEFAULT_SOURCE};
pub use model::privilege::Privilege;
pub use model::record::{RecordKey, StoredEntity};
pub use model::role::Role;
pub use model::user::{User, UserStatus};
pub use model::version::{InvalidVersionToken, VersionToken};
pub use service::bootstrap::{bootstrap, BootstrapError, BootstrapReport, KindBootstrap};
pub use service::configuration::{ConfigResult, SecurityConfigError, SecurityConfiguration};
pub use service::security_store::{RecordCounts, SecurityStore};
pub use store::{RecordHandle, RecordStore, RecordStores, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
