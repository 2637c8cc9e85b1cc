//! Application services: authorization and orchestration on top of the
//! repositories. Tenant scoping is not their concern; every repository
//! call is already gated.

mod project;
mod task;
mod tenant;
mod user;

pub use project::{NewProjectInput, ProjectService};
pub use task::TaskService;
pub use tenant::TenantService;
pub use user::{ProfileChanges, UserChanges, UserService};

use tenantry_core::error::{AppError, AppResult};

/// Maps a missing referenced row (including one owned by another
/// tenant) to a validation error.
pub(crate) fn referenced<T>(result: AppResult<T>, what: &str) -> AppResult<T> {
    match result {
        Err(AppError::NotFound { id, .. }) => {
            Err(AppError::validation(format!("{what} {id} does not exist")))
        }
        other => other,
    }
}
