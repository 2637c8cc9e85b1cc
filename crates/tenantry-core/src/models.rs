//! Domain models for Tenantry.

pub mod project;
pub mod task;
pub mod tenant;
pub mod user;
