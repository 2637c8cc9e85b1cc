//! Access-control decision point.
//!
//! Tenant isolation is enforced by the gate; this module answers the
//! remaining question of what an authenticated principal may do inside
//! its own tenant.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::AmbientContext;
use crate::error::{AppError, AppResult};
use crate::models::user::Role;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Require the principal to hold one of `allowed`.
pub fn require_role(principal: &Principal, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "role {} may not perform this action",
            principal.role
        )))
    }
}

/// Require the principal to own a resource, or be an admin.
///
/// `owner` is `None` when the resource has no owner the principal could
/// match; only admins pass in that case.
pub fn require_owner_or_admin(principal: &Principal, owner: Option<Uuid>) -> AppResult<()> {
    if principal.is_admin() || owner == Some(principal.id) {
        Ok(())
    } else {
        Err(AppError::forbidden("only the owner or an admin may do this"))
    }
}

/// Active tenant of the current request.
pub fn require_tenant() -> AppResult<Uuid> {
    AmbientContext::tenant_id().ok_or(AppError::TenantContext)
}
