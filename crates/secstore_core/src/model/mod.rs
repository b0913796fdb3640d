//! Authorization model records.
//!
//! # Responsibility
//! - Define the four persisted record shapes: users, roles, privileges and
//!   user/role mappings.
//! - Carry the storage-assigned version token next to caller-visible fields.
//!
//! # Invariants
//! - Identity fields are never blank once a record reaches storage.
//! - `version` is assigned by storage; callers only echo it back.

pub mod kind;
pub mod mapping;
pub mod privilege;
pub mod record;
pub mod role;
pub mod user;
pub mod version;
