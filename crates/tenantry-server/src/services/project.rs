use serde::Deserialize;
use tenantry_core::access::{Principal, require_owner_or_admin};
use tenantry_core::error::AppResult;
use tenantry_core::models::project::{CreateProject, Project, UpdateProject};
use tenantry_core::repository::{PaginatedResult, Pagination, ProjectRepository, UserRepository};
use tenantry_core::validate::not_blank;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::referenced;

/// Project creation payload; the owner is always the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProjectInput {
    #[validate(custom(function = "not_blank", message = "Project name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub struct ProjectService<P: ProjectRepository, U: UserRepository> {
    projects: P,
    users: U,
}

impl<P: ProjectRepository, U: UserRepository> ProjectService<P, U> {
    pub fn new(projects: P, users: U) -> Self {
        Self { projects, users }
    }

    pub async fn create(&self, principal: &Principal, input: NewProjectInput) -> AppResult<Project> {
        let project = self
            .projects
            .create(CreateProject {
                name: input.name,
                description: input.description,
                owner_id: principal.id,
            })
            .await?;
        info!(project_id = %project.id, owner_id = %principal.id, "project created");
        Ok(project)
    }

    pub async fn list(&self, pagination: Pagination) -> AppResult<PaginatedResult<Project>> {
        self.projects.list(pagination).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Project> {
        self.projects.get_by_id(id).await
    }

    /// Owner or admin only. Ownership may be handed to another user of
    /// the same tenant.
    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        input: UpdateProject,
    ) -> AppResult<Project> {
        let project = self.projects.get_by_id(id).await?;
        require_owner_or_admin(principal, Some(project.owner_id))?;

        if let Some(owner_id) = input.owner_id {
            referenced(self.users.get_by_id(owner_id).await, "user")?;
        }
        self.projects.update(id, input).await
    }

    /// Owner or admin only. The project's tasks go with it.
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> AppResult<()> {
        let project = self.projects.get_by_id(id).await?;
        require_owner_or_admin(principal, Some(project.owner_id))?;
        self.projects.delete(id).await?;
        info!(project_id = %id, "project deleted");
        Ok(())
    }
}
