use chrono::Utc;
use tenantry_core::access::{Principal, require_owner_or_admin};
use tenantry_core::error::{AppError, AppResult};
use tenantry_core::events::{EventBus, TaskEvent, TaskEventKind};
use tenantry_core::models::task::{CreateTask, Task, TaskStatus, UpdateTask};
use tenantry_core::repository::{
    PaginatedResult, Pagination, ProjectRepository, TaskRepository, UserRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::referenced;

/// Task operations. A task is mutable by the owner of its project or by
/// an admin; a task outside any project only by an admin.
pub struct TaskService<T, P, U>
where
    T: TaskRepository,
    P: ProjectRepository,
    U: UserRepository,
{
    tasks: T,
    projects: P,
    users: U,
    events: EventBus,
}

impl<T, P, U> TaskService<T, P, U>
where
    T: TaskRepository,
    P: ProjectRepository,
    U: UserRepository,
{
    pub fn new(tasks: T, projects: P, users: U, events: EventBus) -> Self {
        Self {
            tasks,
            projects,
            users,
            events,
        }
    }

    fn publish(&self, kind: TaskEventKind, task: &Task) {
        self.events.publish(TaskEvent {
            kind,
            tenant_id: task.tenant_id,
            task: task.clone(),
        });
    }

    /// The principal must own the project `project_id` or be an admin.
    async fn check_project(&self, principal: &Principal, project_id: Uuid) -> AppResult<()> {
        let project = referenced(self.projects.get_by_id(project_id).await, "project")?;
        require_owner_or_admin(principal, Some(project.owner_id))
    }

    async fn check_assignee(&self, user_id: Uuid) -> AppResult<()> {
        referenced(self.users.get_by_id(user_id).await, "user").map(|_| ())
    }

    async fn authorize(&self, principal: &Principal, task: &Task) -> AppResult<()> {
        let owner = match task.project_id {
            Some(project_id) => match self.projects.get_by_id(project_id).await {
                Ok(project) => Some(project.owner_id),
                Err(AppError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        require_owner_or_admin(principal, owner)
    }

    pub async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Task>> {
        self.tasks.list(pagination).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Task> {
        self.tasks.get_by_id(id).await
    }

    /// Create a task; missing fields take their defaults and the due date
    /// follows from the priority.
    pub async fn create(&self, principal: &Principal, input: CreateTask) -> AppResult<Task> {
        if let Some(project_id) = input.project_id {
            self.check_project(principal, project_id).await?;
        }
        if let Some(user_id) = input.assigned_to_id {
            self.check_assignee(user_id).await?;
        }

        let task = self.tasks.create(input.resolve(Utc::now())).await?;
        info!(task_id = %task.id, priority = %task.priority, "task created");
        self.publish(TaskEventKind::Created, &task);
        Ok(task)
    }

    pub async fn update(&self, principal: &Principal, id: Uuid, input: UpdateTask) -> AppResult<Task> {
        if input.is_empty() {
            return Err(AppError::validation("no changes supplied"));
        }

        let existing = self.tasks.get_by_id(id).await?;
        self.authorize(principal, &existing).await?;
        if let Some(Some(project_id)) = input.project_id {
            self.check_project(principal, project_id).await?;
        }
        if let Some(Some(user_id)) = input.assigned_to_id {
            self.check_assignee(user_id).await?;
        }

        let task = self.tasks.update(id, input).await?;
        debug!(task_id = %id, "task updated");
        self.publish(TaskEventKind::Updated, &task);
        if task.is_due_soon(Utc::now()) {
            self.publish(TaskEventKind::DueSoon, &task);
        }
        Ok(task)
    }

    pub async fn update_status(
        &self,
        principal: &Principal,
        id: Uuid,
        status: TaskStatus,
    ) -> AppResult<Task> {
        let input = UpdateTask {
            status: Some(status),
            ..Default::default()
        };
        self.update(principal, id, input).await
    }

    /// Assign the task to `user_id`, or unassign it with `None`.
    pub async fn assign(
        &self,
        principal: &Principal,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> AppResult<Task> {
        let input = UpdateTask {
            assigned_to_id: Some(user_id),
            ..Default::default()
        };
        self.update(principal, id, input).await
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> AppResult<()> {
        let task = self.tasks.get_by_id(id).await?;
        self.authorize(principal, &task).await?;
        self.tasks.delete(id).await?;
        info!(task_id = %id, "task deleted");
        self.publish(TaskEventKind::Deleted, &task);
        Ok(())
    }
}
