//! SurrealDB implementation of [`ProjectRepository`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use surrealdb::Connection;
use tenantry_core::error::AppResult;
use tenantry_core::gate::{DataOperation, Entity, Filter};
use tenantry_core::models::project::{CreateProject, Project, UpdateProject};
use tenantry_core::repository::{PaginatedResult, Pagination, ProjectRepository};
use uuid::Uuid;

use super::{now, page, parse_uuid, record, timestamp};
use crate::error::DbError;
use crate::store::GatedStore;

#[derive(Debug, Deserialize)]
struct ProjectRow {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    owner_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    fn try_into_project(self) -> Result<Project, DbError> {
        Ok(Project {
            id: parse_uuid("project.id", &self.record_id)?,
            tenant_id: parse_uuid("project.tenant_id", &self.tenant_id)?,
            name: self.name,
            description: self.description,
            owner_id: parse_uuid("project.owner_id", &self.owner_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealProjectRepository<C: Connection> {
    store: GatedStore<C>,
}

impl<C: Connection> SurrealProjectRepository<C> {
    pub fn new(store: GatedStore<C>) -> Self {
        Self { store }
    }

    async fn one(&self, op: DataOperation, id: Uuid) -> AppResult<Project> {
        let row: ProjectRow = self
            .store
            .fetch_one(op)
            .await?
            .ok_or_else(|| DbError::not_found("project", id))?;
        Ok(row.try_into_project()?)
    }
}

impl<C: Connection> ProjectRepository for SurrealProjectRepository<C> {
    async fn create(&self, input: CreateProject) -> AppResult<Project> {
        let id = Uuid::new_v4();
        let stamp = timestamp(now());
        let row = record([
            ("id", json!(id.to_string())),
            ("name", json!(input.name)),
            ("description", json!(input.description)),
            ("owner_id", json!(input.owner_id.to_string())),
            ("created_at", json!(stamp)),
            ("updated_at", json!(stamp)),
        ]);
        self.one(DataOperation::create(Entity::Project, row), id)
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Project> {
        self.one(DataOperation::find_unique(Entity::Project, id), id)
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateProject) -> AppResult<Project> {
        let mut patch = record([("updated_at", json!(timestamp(now())))]);
        if let Some(name) = input.name {
            patch.insert("name".into(), json!(name));
        }
        if let Some(description) = input.description {
            patch.insert("description".into(), json!(description));
        }
        if let Some(owner_id) = input.owner_id {
            patch.insert("owner_id".into(), json!(owner_id.to_string()));
        }
        self.one(DataOperation::update(Entity::Project, id, patch), id)
            .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.get_by_id(id).await?;
        self.store
            .transaction(vec![
                DataOperation::delete_many(
                    Entity::Task,
                    Filter::new().eq("project_id", id.to_string()),
                ),
                DataOperation::delete(Entity::Project, id),
            ])
            .await?;
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Project>> {
        let total = self
            .store
            .count(DataOperation::count(Entity::Project, Filter::new()))
            .await?;
        let rows: Vec<ProjectRow> = self
            .store
            .fetch(
                DataOperation::find_many(Entity::Project, Filter::new())
                    .paginate(page(pagination)),
            )
            .await?;
        let items = rows
            .into_iter()
            .map(ProjectRow::try_into_project)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
