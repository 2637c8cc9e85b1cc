//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use surrealdb::Connection;
use tenantry_core::access::require_tenant;
use tenantry_core::error::{AppError, AppResult};
use tenantry_core::gate::{DataOperation, Entity, Filter};
use tenantry_core::models::tenant::{Tenant, UpdateTenant, derive_subdomain};
use tenantry_core::repository::TenantRepository;
use tracing::info;
use uuid::Uuid;

use super::{now, parse_uuid, record, timestamp};
use crate::error::DbError;
use crate::store::GatedStore;

#[derive(Debug, Deserialize)]
struct TenantRow {
    record_id: String,
    name: String,
    subdomain: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid("tenant.id", &self.record_id)?,
            name: self.name,
            subdomain: self.subdomain,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    store: GatedStore<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(store: GatedStore<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Tenant> {
        let row: TenantRow = self
            .store
            .fetch_one(DataOperation::find_unique(Entity::Tenant, id))
            .await?
            .ok_or_else(|| DbError::not_found("tenant", id))?;
        Ok(row.try_into_tenant()?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> AppResult<Tenant> {
        let Some(name) = input.name else {
            return self.get_by_id(id).await;
        };
        let subdomain = derive_subdomain(&name);
        if subdomain.is_empty() {
            return Err(AppError::validation(
                "tenant name must contain at least one letter or digit",
            ));
        }

        let patch = record([
            ("name", json!(name)),
            ("subdomain", json!(subdomain)),
            ("updated_at", json!(timestamp(now()))),
        ]);
        let row: TenantRow = self
            .store
            .fetch_one(DataOperation::update(Entity::Tenant, id, patch))
            .await?
            .ok_or_else(|| DbError::not_found("tenant", id))?;
        Ok(row.try_into_tenant()?)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        // The scoped deletes are filtered by the active tenant, so only
        // that tenant's own row may go with them.
        if require_tenant()? != id {
            return Err(DbError::not_found("tenant", id).into());
        }
        self.get_by_id(id).await?;

        self.store
            .transaction(vec![
                DataOperation::delete_many(Entity::Task, Filter::new()),
                DataOperation::delete_many(Entity::Project, Filter::new()),
                DataOperation::delete_many(Entity::User, Filter::new()),
                DataOperation::delete(Entity::Tenant, id),
            ])
            .await?;
        info!(tenant_id = %id, "tenant deleted with all of its data");
        Ok(())
    }
}
