//! SurrealDB implementation of [`TaskRepository`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use surrealdb::Connection;
use tenantry_core::error::AppResult;
use tenantry_core::gate::{DataOperation, Entity, Filter};
use tenantry_core::models::task::{NewTask, Task, UpdateTask};
use tenantry_core::repository::{PaginatedResult, Pagination, TaskRepository};
use uuid::Uuid;

use super::{now, page, parse_optional_uuid, parse_uuid, record, timestamp};
use crate::error::DbError;
use crate::store::GatedStore;

#[derive(Debug, Deserialize)]
struct TaskRow {
    record_id: String,
    tenant_id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    due_date: DateTime<Utc>,
    project_id: Option<String>,
    assigned_to_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task, DbError> {
        Ok(Task {
            id: parse_uuid("task.id", &self.record_id)?,
            tenant_id: parse_uuid("task.tenant_id", &self.tenant_id)?,
            title: self.title,
            description: self.description,
            status: self
                .status
                .parse()
                .map_err(|e: String| DbError::decode("task.status", e))?,
            priority: self
                .priority
                .parse()
                .map_err(|e: String| DbError::decode("task.priority", e))?,
            due_date: self.due_date,
            project_id: parse_optional_uuid("task.project_id", self.project_id)?,
            assigned_to_id: parse_optional_uuid("task.assigned_to_id", self.assigned_to_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn optional_id(id: Option<Uuid>) -> Value {
    id.map(|id| Value::String(id.to_string()))
        .unwrap_or(Value::Null)
}

#[derive(Clone)]
pub struct SurrealTaskRepository<C: Connection> {
    store: GatedStore<C>,
}

impl<C: Connection> SurrealTaskRepository<C> {
    pub fn new(store: GatedStore<C>) -> Self {
        Self { store }
    }

    async fn one(&self, op: DataOperation, id: Uuid) -> AppResult<Task> {
        let row: TaskRow = self
            .store
            .fetch_one(op)
            .await?
            .ok_or_else(|| DbError::not_found("task", id))?;
        Ok(row.try_into_task()?)
    }
}

impl<C: Connection> TaskRepository for SurrealTaskRepository<C> {
    async fn create(&self, input: NewTask) -> AppResult<Task> {
        let id = Uuid::new_v4();
        let stamp = timestamp(now());
        let row = record([
            ("id", json!(id.to_string())),
            ("title", json!(input.title)),
            ("description", json!(input.description)),
            ("status", json!(input.status.as_str())),
            ("priority", json!(input.priority.as_str())),
            ("due_date", json!(timestamp(input.due_date))),
            ("project_id", optional_id(input.project_id)),
            ("assigned_to_id", optional_id(input.assigned_to_id)),
            ("created_at", json!(stamp)),
            ("updated_at", json!(stamp)),
        ]);
        self.one(DataOperation::create(Entity::Task, row), id).await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Task> {
        self.one(DataOperation::find_unique(Entity::Task, id), id)
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateTask) -> AppResult<Task> {
        let mut patch = record([("updated_at", json!(timestamp(now())))]);
        if let Some(title) = input.title {
            patch.insert("title".into(), json!(title));
        }
        if let Some(description) = input.description {
            patch.insert("description".into(), json!(description));
        }
        if let Some(status) = input.status {
            patch.insert("status".into(), json!(status.as_str()));
        }
        if let Some(priority) = input.priority {
            patch.insert("priority".into(), json!(priority.as_str()));
        }
        if let Some(due_date) = input.due_date {
            patch.insert("due_date".into(), json!(timestamp(due_date)));
        }
        if let Some(project_id) = input.project_id {
            patch.insert("project_id".into(), optional_id(project_id));
        }
        if let Some(assigned_to_id) = input.assigned_to_id {
            patch.insert("assigned_to_id".into(), optional_id(assigned_to_id));
        }
        self.one(DataOperation::update(Entity::Task, id, patch), id)
            .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let deleted: Vec<TaskRow> = self
            .store
            .fetch(DataOperation::delete(Entity::Task, id))
            .await?;
        if deleted.is_empty() {
            return Err(DbError::not_found("task", id).into());
        }
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Task>> {
        let total = self
            .store
            .count(DataOperation::count(Entity::Task, Filter::new()))
            .await?;
        let rows: Vec<TaskRow> = self
            .store
            .fetch(
                DataOperation::find_many(Entity::Task, Filter::new()).paginate(page(pagination)),
            )
            .await?;
        let items = rows
            .into_iter()
            .map(TaskRow::try_into_task)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
