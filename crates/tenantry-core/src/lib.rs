//! Tenantry Core: domain models, error taxonomy, ambient request
//! context, the tenant gate and repository traits.

pub mod access;
pub mod context;
pub mod error;
pub mod events;
pub mod gate;
pub mod models;
pub mod repository;
pub mod validate;

pub use context::AmbientContext;
pub use error::{AppError, AppResult};
pub use gate::{GatePolicy, PrimaryKeyPolicy, TenantGate};
