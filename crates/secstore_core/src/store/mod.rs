//! Record store layer: one generic SQLite store per record kind.
//!
//! # Responsibility
//! - Provide get/browse/add/write/delete over a single kind's table.
//! - Surface the storage version of each record and reject stale writes.
//! - Run the one-time first-use hook of each kind.
//!
//! # Invariants
//! - Every successful `add` stores version 1; every successful `write`
//!   increments the version by exactly one.
//! - Write paths call `StoredEntity::validate()` before SQL mutations.
//! - Stores never cache; every call goes to the connection it is given.

pub mod record_store;
mod registration;

pub use record_store::{RecordHandle, RecordStore, StoreError, StoreResult};

use crate::model::mapping::UserRoleMapping;
use crate::model::privilege::Privilege;
use crate::model::role::Role;
use crate::model::user::User;

/// The four stores backing one security database.
#[derive(Default)]
pub struct RecordStores {
    pub users: RecordStore<User>,
    pub roles: RecordStore<Role>,
    pub privileges: RecordStore<Privilege>,
    pub user_role_mappings: RecordStore<UserRoleMapping>,
}

impl RecordStores {
    pub fn new() -> Self {
        Self::default()
    }
}
