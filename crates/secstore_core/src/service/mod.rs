//! Security configuration services.
//!
//! # Responsibility
//! - Seed empty stores from defaults once (`bootstrap`).
//! - Expose typed CRUD with optimistic concurrency (`configuration`).
//! - Own the database, stores and lifecycle of one security store
//!   (`security_store`).

pub mod bootstrap;
pub mod configuration;
pub mod security_store;
