//! Session lifecycle: registration, login, logout, refresh rotation and
//! per-request authentication.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tenantry_core::access::Principal;
use tenantry_core::context::AmbientContext;
use tenantry_core::error::{AppError, AppResult};
use tenantry_core::models::tenant::Tenant;
use tenantry_core::models::user::{NewRegistration, NewUser, Role, UpdateUser, User};
use tenantry_core::repository::{CredentialStore, RegistrationStore, UserRepository};
use tenantry_core::validate::{mailbox, not_blank};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{TokenCodec, TokenKind, TokenPair, hash_refresh_token};

/// Input for the tenant + first user registration flow.
///
/// Password length is left to the configured policy, checked by
/// [`SessionManager`].
#[derive(Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(
        email(message = "Invalid email address"),
        custom(function = "mailbox", message = "Invalid email address")
    )]
    pub email: String,
    pub password: String,
    #[validate(
        length(min = 2, message = "Name must be at least 2 characters"),
        custom(function = "not_blank", message = "Name must be at least 2 characters")
    )]
    pub name: String,
    #[validate(custom(function = "not_blank", message = "Company name is required"))]
    pub company_name: String,
    /// USER unless the request asks for another role.
    #[serde(default)]
    pub role: Role,
}

/// Input for adding a user to the caller's tenant.
#[derive(Clone, Deserialize, Validate)]
pub struct Enrollment {
    #[validate(
        email(message = "Invalid email address"),
        custom(function = "mailbox", message = "Invalid email address")
    )]
    pub email: String,
    pub password: String,
    #[validate(
        length(min = 2, message = "Name must be at least 2 characters"),
        custom(function = "not_blank", message = "Name must be at least 2 characters")
    )]
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub tenant: Tenant,
    pub user: User,
    pub tokens: TokenPair,
}

/// Runs `fut` in a fresh context with no tenant, for lookups that must
/// resolve a principal before any tenant is known.
async fn unscoped<F: Future>(fut: F) -> F::Output {
    AmbientContext::bind(fut).await
}

fn principal_of(user: &User) -> Principal {
    Principal {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}

fn rejected(reason: &str) -> AppError {
    AppError::AuthenticationFailed {
        reason: reason.to_string(),
    }
}

/// Session manager.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct SessionManager<U, R>
where
    U: UserRepository + CredentialStore,
    R: RegistrationStore,
{
    users: U,
    registrations: R,
    codec: TokenCodec,
    config: AuthConfig,
}

impl<U, R> SessionManager<U, R>
where
    U: UserRepository + CredentialStore,
    R: RegistrationStore,
{
    pub fn new(users: U, registrations: R, config: AuthConfig) -> Self {
        Self {
            users,
            registrations,
            codec: TokenCodec::new(&config),
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Argon2id hashing on the blocking pool.
    pub async fn hash_password(&self, password: String) -> AppResult<String> {
        let pepper = self.config.pepper.clone();
        let params = self.config.argon2;
        tokio::task::spawn_blocking(move || {
            password::hash_password(&password, pepper.as_deref(), params)
        })
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
    }

    async fn verify_password(&self, password: String, hash: String) -> AppResult<bool> {
        let pepper = self.config.pepper.clone();
        tokio::task::spawn_blocking(move || {
            password::verify_password(&password, &hash, pepper.as_deref())
        })
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
        .map_err(AppError::from)
    }

    fn check_password_policy(&self, password: &str) -> AppResult<()> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AppError::validation(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }
        Ok(())
    }

    /// Create a tenant and its first user in one transaction and issue
    /// their first token pair.
    pub async fn register(&self, input: Registration) -> AppResult<RegistrationOutcome> {
        input.validate()?;
        self.check_password_policy(&input.password)?;

        // Advisory: the unique index settles races at commit.
        match unscoped(self.users.get_by_email(&input.email)).await {
            Ok(_) => {
                warn!("registration rejected: email already registered");
                return Err(AppError::Conflict {
                    entity: "user".into(),
                });
            }
            Err(AppError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let password_hash = self.hash_password(input.password).await?;
        let role = input.role;
        let principal = Principal {
            id: Uuid::new_v4(),
            email: input.email,
            role,
        };
        let tokens = self.codec.issue_pair(&principal)?;

        let (tenant, user) = self
            .registrations
            .register(NewRegistration {
                tenant_id: Uuid::new_v4(),
                tenant_name: input.company_name,
                user_id: principal.id,
                email: principal.email,
                name: input.name,
                password_hash,
                role,
                refresh_token_hash: hash_refresh_token(&tokens.refresh_token),
            })
            .await
            .inspect_err(|e| warn!(error = %e, "registration failed"))?;

        info!(tenant_id = %tenant.id, user_id = %user.id, "tenant and user registered");
        Ok(RegistrationOutcome {
            tenant,
            user,
            tokens,
        })
    }

    /// Add a user to the tenant of the current context. The new user has
    /// no session until they log in.
    pub async fn enroll(&self, input: Enrollment) -> AppResult<User> {
        input.validate()?;
        self.check_password_policy(&input.password)?;

        match unscoped(self.users.get_by_email(&input.email)).await {
            Ok(_) => {
                warn!("enrollment rejected: email already registered");
                return Err(AppError::Conflict {
                    entity: "user".into(),
                });
            }
            Err(AppError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let password_hash = self.hash_password(input.password).await?;
        self.users
            .create(NewUser {
                email: input.email,
                name: input.name,
                password_hash,
                role: input.role,
            })
            .await
    }

    /// Authenticate with email and password and issue a new token pair,
    /// replacing any previous refresh token.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let user = match unscoped(self.users.get_by_email(email)).await {
            Ok(user) => user,
            Err(AppError::NotFound { .. }) => {
                warn!("login failed");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "login failed");
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.codec.issue_pair(&principal_of(&user))?;
        unscoped(
            self.users
                .store_refresh_token(user.id, Some(hash_refresh_token(&tokens.refresh_token))),
        )
        .await?;

        info!(user_id = %user.id, tenant_id = %user.tenant_id, "user logged in");
        Ok(tokens)
    }

    /// Clear the stored refresh token. Idempotent.
    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        match self.users.store_refresh_token(user_id, None).await {
            Ok(()) | Err(AppError::NotFound { .. }) => {
                info!(user_id = %user_id, "user logged out");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange a refresh token for a new pair. Each refresh token can be
    /// used once; the swap is a compare-and-swap on the stored hash.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self
            .codec
            .verify(TokenKind::Refresh, refresh_token)
            .inspect_err(|e| warn!(error = %e, "refresh token rejected"))?;
        let subject = claims.principal()?;

        let user = match unscoped(self.users.get_by_id(subject.id)).await {
            Ok(user) => user,
            Err(AppError::NotFound { .. }) => return Err(rejected("invalid refresh token")),
            Err(e) => return Err(e),
        };

        let presented = hash_refresh_token(refresh_token);
        if user.refresh_token_hash.as_deref() != Some(presented.as_str()) {
            warn!(user_id = %user.id, "refresh token does not match stored token");
            return Err(rejected("invalid refresh token"));
        }

        let tokens = self.codec.issue_pair(&principal_of(&user))?;
        let swapped = unscoped(self.users.rotate_refresh_token(
            user.id,
            &presented,
            hash_refresh_token(&tokens.refresh_token),
        ))
        .await;

        match swapped {
            Ok(true) => {
                info!(user_id = %user.id, "refresh token rotated");
                Ok(tokens)
            }
            // Lost the race to a concurrent refresh with the same token.
            Ok(false) | Err(AppError::Conflict { .. }) => {
                warn!(user_id = %user.id, "refresh token already used");
                Err(rejected("invalid refresh token"))
            }
            Err(e) => Err(e),
        }
    }

    /// Verify an access token and return its principal.
    pub fn verify_access(&self, access_token: &str) -> AppResult<Principal> {
        let claims = self.codec.verify(TokenKind::Access, access_token)?;
        Ok(claims.principal()?)
    }

    /// Verify a bearer credential (`"Bearer <token>"` or the bare token).
    pub fn authenticate(&self, bearer: &str) -> AppResult<Principal> {
        let token = bearer.strip_prefix("Bearer ").unwrap_or(bearer).trim();
        if token.is_empty() {
            return Err(rejected("missing bearer token"));
        }
        self.verify_access(token)
    }

    /// Resolve the principal's tenant and make it the active tenant of
    /// the caller's context.
    pub async fn attach_tenant(&self, principal: &Principal) -> AppResult<Uuid> {
        let user = match self.users.get_by_id(principal.id).await {
            Ok(user) => user,
            Err(AppError::NotFound { .. }) => {
                warn!(user_id = %principal.id, "principal no longer resolves to a tenant");
                return Err(AppError::forbidden("no tenant assigned"));
            }
            Err(e) => return Err(e),
        };
        AmbientContext::set_tenant_id(user.tenant_id)?;
        Ok(user.tenant_id)
    }

    /// Change a user's password after verifying the current one. Clears
    /// the stored refresh token so other sessions cannot refresh.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> AppResult<()> {
        let user = self.users.get_by_id(user_id).await?;
        if !self
            .verify_password(current.to_string(), user.password_hash)
            .await?
        {
            warn!(user_id = %user_id, "password change rejected");
            return Err(AuthError::InvalidCredentials.into());
        }
        self.check_password_policy(new)?;

        let password_hash = self.hash_password(new.to_string()).await?;
        self.users
            .update(
                user_id,
                UpdateUser {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;
        self.users.store_refresh_token(user_id, None).await?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}
