//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. None of them take a tenant id:
//! implementations route every operation through the tenant gate, which
//! scopes it to the tenant of the caller's ambient context.

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    project::{CreateProject, Project, UpdateProject},
    task::{NewTask, Task, UpdateTask},
    tenant::{Tenant, UpdateTenant},
    user::{NewRegistration, NewUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant (exempt from the gate)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = AppResult<Tenant>> + Send;
    /// Re-derives the subdomain when the name changes.
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = AppResult<Tenant>> + Send;
    /// Remove the tenant of the current context with all of its tasks,
    /// projects and users, atomically.
    fn delete(&self, id: Uuid) -> impl Future<Output = AppResult<()>> + Send;
}

/// Atomic creation of a tenant together with its first user.
pub trait RegistrationStore: Send + Sync {
    fn register(
        &self,
        input: NewRegistration,
    ) -> impl Future<Output = AppResult<(Tenant, User)>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: NewUser) -> impl Future<Output = AppResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = AppResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = AppResult<User>> + Send;
    fn update(&self, id: Uuid, input: UpdateUser)
    -> impl Future<Output = AppResult<User>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = AppResult<()>> + Send;
    /// Delete the user after removing the tasks assigned to them, the
    /// projects they own and those projects' tasks, in one transaction.
    fn delete_with_cleanup(&self, id: Uuid) -> impl Future<Output = AppResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = AppResult<PaginatedResult<User>>> + Send;
}

/// Storage for each user's single active refresh credential.
pub trait CredentialStore: Send + Sync {
    /// Overwrite (or clear, with `None`) the stored refresh token hash.
    fn store_refresh_token(
        &self,
        user_id: Uuid,
        hash: Option<String>,
    ) -> impl Future<Output = AppResult<()>> + Send;

    /// Replace the stored hash with `new` only if it currently equals
    /// `expected`. Returns whether the swap happened.
    fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        expected: &str,
        new: String,
    ) -> impl Future<Output = AppResult<bool>> + Send;
}

pub trait ProjectRepository: Send + Sync {
    fn create(&self, input: CreateProject) -> impl Future<Output = AppResult<Project>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = AppResult<Project>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateProject,
    ) -> impl Future<Output = AppResult<Project>> + Send;
    /// Deletes the project's tasks with it.
    fn delete(&self, id: Uuid) -> impl Future<Output = AppResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = AppResult<PaginatedResult<Project>>> + Send;
}

pub trait TaskRepository: Send + Sync {
    fn create(&self, input: NewTask) -> impl Future<Output = AppResult<Task>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = AppResult<Task>> + Send;
    fn update(&self, id: Uuid, input: UpdateTask)
    -> impl Future<Output = AppResult<Task>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = AppResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = AppResult<PaginatedResult<Task>>> + Send;
}
