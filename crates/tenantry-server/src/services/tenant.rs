use tenantry_core::access::{Principal, require_role, require_tenant};
use tenantry_core::error::AppResult;
use tenantry_core::models::tenant::{Tenant, UpdateTenant};
use tenantry_core::models::user::Role;
use tenantry_core::repository::TenantRepository;
use tracing::info;

/// Tenants are exempt from the gate, so this service only ever addresses
/// the tenant of the current request.
pub struct TenantService<T: TenantRepository> {
    tenants: T,
}

impl<T: TenantRepository> TenantService<T> {
    pub fn new(tenants: T) -> Self {
        Self { tenants }
    }

    pub async fn current(&self) -> AppResult<Tenant> {
        self.tenants.get_by_id(require_tenant()?).await
    }

    /// Rename the current tenant; the subdomain follows the new name.
    pub async fn rename(&self, principal: &Principal, input: UpdateTenant) -> AppResult<Tenant> {
        require_role(principal, &[Role::Admin])?;
        let tenant = self.tenants.update(require_tenant()?, input).await?;
        info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "tenant updated");
        Ok(tenant)
    }

    /// Delete the current tenant together with its users, projects and
    /// tasks. Outstanding access tokens stop resolving to a tenant.
    pub async fn delete(&self, principal: &Principal) -> AppResult<()> {
        require_role(principal, &[Role::Admin])?;
        let tenant_id = require_tenant()?;
        self.tenants.delete(tenant_id).await?;
        info!(tenant_id = %tenant_id, admin_id = %principal.id, "tenant deleted");
        Ok(())
    }
}
