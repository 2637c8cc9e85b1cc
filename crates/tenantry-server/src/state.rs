//! Shared application state handed to every handler.

use std::sync::Arc;

use surrealdb::engine::any::Any;
use tenantry_auth::{AuthConfig, SessionManager};
use tenantry_core::events::EventBus;
use tenantry_db::DbManager;
use tenantry_db::repository::{
    SurrealProjectRepository, SurrealRegistrationStore, SurrealTaskRepository,
    SurrealTenantRepository, SurrealUserRepository,
};

use crate::services::{ProjectService, TaskService, TenantService, UserService};

type Users = SurrealUserRepository<Any>;
type Projects = SurrealProjectRepository<Any>;

pub type Sessions = SessionManager<Users, SurrealRegistrationStore<Any>>;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Sessions>,
    pub users: Arc<UserService<Users>>,
    pub projects: Arc<ProjectService<Projects, Users>>,
    pub tasks: Arc<TaskService<SurrealTaskRepository<Any>, Projects, Users>>,
    pub tenants: Arc<TenantService<SurrealTenantRepository<Any>>>,
    pub events: EventBus,
    /// Show internal error messages in 500 bodies.
    pub expose_error_detail: bool,
}

impl AppState {
    pub fn new(db: &DbManager, auth: AuthConfig, events: EventBus) -> Self {
        let store = db.store();
        let users = SurrealUserRepository::new(store.clone());
        let projects = SurrealProjectRepository::new(store.clone());

        Self {
            sessions: Arc::new(SessionManager::new(
                users.clone(),
                SurrealRegistrationStore::new(store.clone()),
                auth,
            )),
            users: Arc::new(UserService::new(users.clone())),
            projects: Arc::new(ProjectService::new(projects.clone(), users.clone())),
            tasks: Arc::new(TaskService::new(
                SurrealTaskRepository::new(store.clone()),
                projects,
                users,
                events.clone(),
            )),
            tenants: Arc::new(TenantService::new(SurrealTenantRepository::new(store))),
            events,
            expose_error_detail: false,
        }
    }

    pub fn with_error_detail(mut self, expose: bool) -> Self {
        self.expose_error_detail = expose;
        self
    }
}
