//! SurrealDB implementation of [`UserRepository`] and
//! [`CredentialStore`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use surrealdb::Connection;
use tenantry_core::access::require_tenant;
use tenantry_core::error::AppResult;
use tenantry_core::gate::{DataOperation, Entity, Filter, ID_FIELD};
use tenantry_core::models::user::{NewUser, UpdateUser, User};
use tenantry_core::repository::{
    CredentialStore, PaginatedResult, Pagination, UserRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{now, page, parse_uuid, record, timestamp};
use crate::error::DbError;
use crate::store::GatedStore;

#[derive(Debug, Deserialize)]
pub(crate) struct UserRow {
    record_id: String,
    tenant_id: String,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    refresh_token_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid("user.id", &self.record_id)?,
            tenant_id: parse_uuid("user.tenant_id", &self.tenant_id)?,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            role: self
                .role
                .parse()
                .map_err(|e: String| DbError::decode("user.role", e))?,
            refresh_token_hash: self.refresh_token_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    record_id: String,
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    store: GatedStore<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(store: GatedStore<C>) -> Self {
        Self { store }
    }

    async fn first(&self, op: DataOperation, missing: impl ToString) -> AppResult<User> {
        let row: UserRow = self
            .store
            .fetch_one(op)
            .await?
            .ok_or_else(|| DbError::not_found("user", missing))?;
        Ok(row.try_into_user()?)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: NewUser) -> AppResult<User> {
        let tenant_id = require_tenant()?;
        let id = Uuid::new_v4();
        let stamp = timestamp(now());
        let row = record([
            ("id", json!(id.to_string())),
            ("email", json!(input.email)),
            ("name", json!(input.name)),
            ("password_hash", json!(input.password_hash)),
            ("role", json!(input.role.as_str())),
            ("created_at", json!(stamp)),
            ("updated_at", json!(stamp)),
        ]);
        let user = self
            .first(DataOperation::create(Entity::User, row), id)
            .await?;
        info!(user_id = %id, tenant_id = %tenant_id, "user created");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.first(DataOperation::find_unique(Entity::User, id), id)
            .await
    }

    async fn get_by_email(&self, email: &str) -> AppResult<User> {
        let filter = Filter::new().eq("email", email);
        self.first(DataOperation::find_first(Entity::User, filter), email)
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> AppResult<User> {
        if input.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut patch = record([("updated_at", json!(timestamp(now())))]);
        if let Some(email) = input.email {
            patch.insert("email".into(), json!(email));
        }
        if let Some(name) = input.name {
            patch.insert("name".into(), json!(name));
        }
        if let Some(password_hash) = input.password_hash {
            patch.insert("password_hash".into(), json!(password_hash));
        }
        if let Some(role) = input.role {
            patch.insert("role".into(), json!(role.as_str()));
        }

        self.first(DataOperation::update(Entity::User, id, patch), id)
            .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let deleted: Vec<IdRow> = self
            .store
            .fetch(DataOperation::delete(Entity::User, id))
            .await?;
        if deleted.is_empty() {
            return Err(DbError::not_found("user", id).into());
        }
        Ok(())
    }

    async fn delete_with_cleanup(&self, id: Uuid) -> AppResult<()> {
        // Scoped existence check; a user of another tenant is not found.
        self.get_by_id(id).await?;

        let id_value = Value::String(id.to_string());
        let owned: Vec<IdRow> = self
            .store
            .fetch(DataOperation::find_many(
                Entity::Project,
                Filter::new().eq("owner_id", id_value.clone()),
            ))
            .await?;

        let mut ops = Vec::with_capacity(owned.len() + 3);
        for project in &owned {
            ops.push(DataOperation::delete_many(
                Entity::Task,
                Filter::new().eq("project_id", project.record_id.as_str()),
            ));
        }
        ops.push(DataOperation::delete_many(
            Entity::Task,
            Filter::new().eq("assigned_to_id", id_value.clone()),
        ));
        ops.push(DataOperation::delete_many(
            Entity::Project,
            Filter::new().eq("owner_id", id_value),
        ));
        ops.push(DataOperation::delete(Entity::User, id));

        self.store.transaction(ops).await?;
        info!(user_id = %id, projects = owned.len(), "deleted user with owned data");
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<User>> {
        let total = self
            .store
            .count(DataOperation::count(Entity::User, Filter::new()))
            .await?;
        let rows: Vec<UserRow> = self
            .store
            .fetch(DataOperation::find_many(Entity::User, Filter::new()).paginate(page(pagination)))
            .await?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

impl<C: Connection> CredentialStore for SurrealUserRepository<C> {
    async fn store_refresh_token(&self, user_id: Uuid, hash: Option<String>) -> AppResult<()> {
        let patch = record([(
            "refresh_token_hash",
            hash.map(Value::String).unwrap_or(Value::Null),
        )]);
        let updated: Vec<IdRow> = self
            .store
            .fetch(DataOperation::update(Entity::User, user_id, patch))
            .await?;
        if updated.is_empty() {
            return Err(DbError::not_found("user", user_id).into());
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        expected: &str,
        new: String,
    ) -> AppResult<bool> {
        let filter = Filter::new()
            .eq(ID_FIELD, user_id.to_string())
            .eq("refresh_token_hash", expected);
        let patch = record([("refresh_token_hash", json!(new))]);
        let swapped: Vec<IdRow> = self
            .store
            .fetch(DataOperation::update_many(Entity::User, filter, patch))
            .await?;
        debug!(user_id = %user_id, swapped = !swapped.is_empty(), "refresh token rotation");
        Ok(!swapped.is_empty())
    }
}
