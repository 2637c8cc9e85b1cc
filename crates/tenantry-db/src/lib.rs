//! Tenantry Database: SurrealDB persistence behind the tenant gate.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The gated store every repository goes through ([`GatedStore`])
//! - Repository implementations of the `tenantry-core` traits
//! - Error types ([`DbError`])

pub mod compile;
mod connection;
mod error;
pub mod repository;
mod schema;
mod store;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};
pub use store::GatedStore;
