use serde::Deserialize;
use tenantry_core::access::{Principal, require_role};
use tenantry_core::error::{AppError, AppResult};
use tenantry_core::models::user::{Role, UpdateUser, User};
use tenantry_core::repository::{PaginatedResult, Pagination, UserRepository};
use tenantry_core::validate::{mailbox, not_blank};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileChanges {
    #[validate(
        length(min = 2, message = "Name must be at least 2 characters"),
        custom(function = "not_blank", message = "Name must be at least 2 characters")
    )]
    pub name: Option<String>,
    #[validate(
        email(message = "Invalid email address"),
        custom(function = "mailbox", message = "Invalid email address")
    )]
    pub email: Option<String>,
}

/// Fields an admin may change on any user of the tenant.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(
        length(min = 2, message = "Name must be at least 2 characters"),
        custom(function = "not_blank", message = "Name must be at least 2 characters")
    )]
    pub name: Option<String>,
    #[validate(
        email(message = "Invalid email address"),
        custom(function = "mailbox", message = "Invalid email address")
    )]
    pub email: Option<String>,
    pub role: Option<Role>,
}

fn checked(name: Option<String>, email: Option<String>, role: Option<Role>) -> AppResult<UpdateUser> {
    let changes = UpdateUser {
        name,
        email,
        role,
        password_hash: None,
    };
    if changes.is_empty() {
        return Err(AppError::validation("no changes supplied"));
    }
    Ok(changes)
}

pub struct UserService<U: UserRepository> {
    users: U,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(users: U) -> Self {
        Self { users }
    }

    pub async fn me(&self, principal: &Principal) -> AppResult<User> {
        self.users.get_by_id(principal.id).await
    }

    pub async fn update_me(&self, principal: &Principal, input: ProfileChanges) -> AppResult<User> {
        let changes = checked(input.name, input.email, None)?;
        self.users.update(principal.id, changes).await
    }

    /// Removes the caller together with their projects and assigned tasks.
    pub async fn delete_me(&self, principal: &Principal) -> AppResult<()> {
        self.users.delete_with_cleanup(principal.id).await?;
        info!(user_id = %principal.id, "user deleted own account");
        Ok(())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> AppResult<PaginatedResult<User>> {
        require_role(principal, &[Role::Admin])?;
        self.users.list(pagination).await
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> AppResult<User> {
        require_role(principal, &[Role::Admin])?;
        self.users.get_by_id(id).await
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        input: UserChanges,
    ) -> AppResult<User> {
        require_role(principal, &[Role::Admin])?;
        let changes = checked(input.name, input.email, input.role)?;
        let user = self.users.update(id, changes).await?;
        info!(user_id = %id, admin_id = %principal.id, "user updated by admin");
        Ok(user)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> AppResult<()> {
        require_role(principal, &[Role::Admin])?;
        self.users.delete_with_cleanup(id).await?;
        info!(user_id = %id, admin_id = %principal.id, "user deleted by admin");
        Ok(())
    }
}
