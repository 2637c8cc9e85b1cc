//! Atomic tenant + first user creation.

use serde_json::json;
use surrealdb::Connection;
use tenantry_core::context::AmbientContext;
use tenantry_core::error::{AppError, AppResult};
use tenantry_core::gate::{DataOperation, Entity};
use tenantry_core::models::tenant::{Tenant, derive_subdomain};
use tenantry_core::models::user::{NewRegistration, User};
use tenantry_core::repository::RegistrationStore;
use tracing::info;

use super::{now, record, timestamp};
use crate::store::GatedStore;

#[derive(Clone)]
pub struct SurrealRegistrationStore<C: Connection> {
    store: GatedStore<C>,
}

impl<C: Connection> SurrealRegistrationStore<C> {
    pub fn new(store: GatedStore<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> RegistrationStore for SurrealRegistrationStore<C> {
    async fn register(&self, input: NewRegistration) -> AppResult<(Tenant, User)> {
        let subdomain = derive_subdomain(&input.tenant_name);
        if subdomain.is_empty() {
            return Err(AppError::validation(
                "company name must contain at least one letter or digit",
            ));
        }

        let created_at = now();
        let stamp = timestamp(created_at);

        let tenant = Tenant {
            id: input.tenant_id,
            name: input.tenant_name,
            subdomain,
            created_at,
            updated_at: created_at,
        };
        let user = User {
            id: input.user_id,
            tenant_id: input.tenant_id,
            email: input.email,
            name: input.name,
            password_hash: input.password_hash,
            role: input.role,
            refresh_token_hash: Some(input.refresh_token_hash),
            created_at,
            updated_at: created_at,
        };

        let tenant_row = record([
            ("id", json!(tenant.id.to_string())),
            ("name", json!(tenant.name)),
            ("subdomain", json!(tenant.subdomain)),
            ("created_at", json!(stamp)),
            ("updated_at", json!(stamp)),
        ]);
        let user_row = record([
            ("id", json!(user.id.to_string())),
            ("tenant_id", json!(user.tenant_id.to_string())),
            ("email", json!(user.email)),
            ("name", json!(user.name)),
            ("password_hash", json!(user.password_hash)),
            ("role", json!(user.role.as_str())),
            ("refresh_token_hash", json!(user.refresh_token_hash)),
            ("created_at", json!(stamp)),
            ("updated_at", json!(stamp)),
        ]);

        // A fresh context: the new user belongs to the new tenant, never
        // to whatever tenant the caller may be bound to.
        AmbientContext::bind(self.store.transaction(vec![
            DataOperation::create(Entity::Tenant, tenant_row),
            DataOperation::create(Entity::User, user_row),
        ]))
        .await?;

        info!(tenant_id = %tenant.id, user_id = %user.id, subdomain = %tenant.subdomain, "registered tenant");
        Ok((tenant, user))
    }
}
