//! Integration tests for the session lifecycle.

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantry_auth::config::{Argon2Params, AuthConfig};
use tenantry_auth::service::{Enrollment, Registration, SessionManager};
use tenantry_auth::token::{self, Claims};
use tenantry_core::context::AmbientContext;
use tenantry_core::error::AppError;
use tenantry_core::gate::{DataOperation, Entity, Filter, GatePolicy};
use tenantry_core::models::task::CreateTask;
use tenantry_core::models::user::Role;
use tenantry_core::repository::{Pagination, TaskRepository, UserRepository};
use tenantry_db::GatedStore;
use tenantry_db::repository::{
    SurrealRegistrationStore, SurrealTaskRepository, SurrealUserRepository,
};

type Manager = SessionManager<SurrealUserRepository<Db>, SurrealRegistrationStore<Db>>;

fn test_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        jwt_issuer: "tenantry-test".into(),
        argon2: Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..Default::default()
    }
}

async fn setup() -> (Manager, GatedStore<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();
    let store = GatedStore::new(db, GatePolicy::default());

    let manager = SessionManager::new(
        SurrealUserRepository::new(store.clone()),
        SurrealRegistrationStore::new(store.clone()),
        test_config(),
    );
    (manager, store)
}

fn registration(company: &str, email: &str) -> Registration {
    Registration {
        email: email.into(),
        password: "pw12345!".into(),
        name: "Alice".into(),
        company_name: company.into(),
        role: Role::default(),
    }
}

#[tokio::test]
async fn acme_scenario() {
    let (manager, store) = setup().await;

    let acme = manager.register(registration("Acme", "a@x.com")).await.unwrap();
    assert_eq!(acme.tenant.subdomain, "acme");
    assert_eq!(acme.user.tenant_id, acme.tenant.id);
    assert_eq!(acme.user.role, Role::User);

    let tokens = manager.login("a@x.com", "pw12345!").await.unwrap();
    let principal = manager.verify_access(&tokens.access_token).unwrap();
    assert_eq!(principal.id, acme.user.id);

    let wrong = manager.login("a@x.com", "wrong-password").await.unwrap_err();
    let unknown = manager.login("nobody@x.com", "pw12345!").await.unwrap_err();
    assert!(matches!(wrong, AppError::AuthenticationFailed { .. }));
    assert_eq!(wrong.to_string(), unknown.to_string());

    let other = manager
        .register(registration("Globex Corp", "g@x.com"))
        .await
        .unwrap();

    let tasks = SurrealTaskRepository::new(store.clone());
    AmbientContext::bind(async {
        manager.attach_tenant(&principal).await.unwrap();
        tasks
            .create(
                CreateTask {
                    title: "Acme only".into(),
                    ..Default::default()
                }
                .resolve(chrono::Utc::now()),
            )
            .await
            .unwrap();
    })
    .await;

    let other_principal = manager.verify_access(&other.tokens.access_token).unwrap();
    let listed = AmbientContext::bind(async {
        let tenant = manager.attach_tenant(&other_principal).await.unwrap();
        assert_eq!(tenant, other.tenant.id);
        tasks.list(Pagination::default()).await.unwrap()
    })
    .await;
    assert!(listed.items.is_empty());
}

#[tokio::test]
async fn refresh_rotates_and_is_single_use() {
    let (manager, _) = setup().await;
    manager.register(registration("Acme", "a@x.com")).await.unwrap();

    let first = manager.login("a@x.com", "pw12345!").await.unwrap();
    let second = manager.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);

    let reused = manager.refresh(&first.refresh_token).await;
    assert!(matches!(reused, Err(AppError::AuthenticationFailed { .. })));

    // The rotated token still works exactly once.
    manager.refresh(&second.refresh_token).await.unwrap();
    assert!(manager.refresh(&second.refresh_token).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_with_one_token_succeed_at_most_once() {
    let (manager, _) = setup().await;
    let manager = Arc::new(manager);
    manager.register(registration("Acme", "a@x.com")).await.unwrap();

    for _ in 0..5 {
        let tokens = manager.login("a@x.com", "pw12345!").await.unwrap();
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                let token = tokens.refresh_token.clone();
                tokio::spawn(async move { manager.refresh(&token).await })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::AuthenticationFailed { .. }) => {}
                Err(other) => panic!("unexpected refresh failure: {other:?}"),
            }
        }
        assert!(successes <= 1, "{successes} refreshes succeeded");
    }
}

#[tokio::test]
async fn login_invalidates_previous_refresh_token() {
    let (manager, _) = setup().await;
    let registered = manager.register(registration("Acme", "a@x.com")).await.unwrap();

    manager.login("a@x.com", "pw12345!").await.unwrap();
    assert!(manager.refresh(&registered.tokens.refresh_token).await.is_err());
}

#[tokio::test]
async fn logout_revokes_refresh_and_is_idempotent() {
    let (manager, _) = setup().await;
    let registered = manager.register(registration("Acme", "a@x.com")).await.unwrap();

    AmbientContext::bind(async {
        manager.attach_tenant(&manager.verify_access(&registered.tokens.access_token).unwrap())
            .await
            .unwrap();
        manager.logout(registered.user.id).await.unwrap();
        manager.logout(registered.user.id).await.unwrap();
    })
    .await;

    assert!(manager.refresh(&registered.tokens.refresh_token).await.is_err());
    // Access tokens are not revoked; they expire naturally.
    assert!(manager.verify_access(&registered.tokens.access_token).is_ok());
}

#[tokio::test]
async fn verify_access_rejects_bad_tokens() {
    let (manager, _) = setup().await;
    let registered = manager.register(registration("Acme", "a@x.com")).await.unwrap();
    let config = test_config();

    // Refresh token presented as an access token.
    assert!(manager.verify_access(&registered.tokens.refresh_token).is_err());
    assert!(manager.verify_access("garbage").is_err());

    let principal = manager.verify_access(&registered.tokens.access_token).unwrap();
    let mut expired = Claims::new(&principal, &config.jwt_issuer, 900);
    expired.iat -= 7200;
    expired.exp = chrono::Utc::now().timestamp() - 1;
    let expired = token::issue(&expired, config.access_token_secret.as_bytes()).unwrap();
    assert!(matches!(
        manager.verify_access(&expired),
        Err(AppError::AuthenticationFailed { .. })
    ));

    let claims = Claims::new(&principal, &config.jwt_issuer, 900);
    let forged = token::issue(&claims, b"not-the-secret").unwrap();
    assert!(manager.verify_access(&forged).is_err());

    assert!(manager.authenticate(&format!("Bearer {}", registered.tokens.access_token)).is_ok());
    assert!(manager.authenticate("Bearer ").is_err());
}

#[tokio::test]
async fn duplicate_email_registration_conflicts() {
    let (manager, _) = setup().await;
    manager.register(registration("Acme", "dup@x.com")).await.unwrap();

    let second = manager.register(registration("Other", "dup@x.com")).await;
    assert!(matches!(second, Err(AppError::Conflict { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_registrations_yield_one_tenant() {
    let (manager, store) = setup().await;
    let manager = Arc::new(manager);

    let a = tokio::spawn({
        let manager = manager.clone();
        async move { manager.register(registration("First", "dup@x.com")).await }
    });
    let b = tokio::spawn({
        let manager = manager.clone();
        async move { manager.register(registration("Second", "dup@x.com")).await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict { .. })))
    );

    let tenants = AmbientContext::bind(
        store.count(DataOperation::count(Entity::Tenant, Filter::new())),
    )
    .await
    .unwrap();
    assert_eq!(tenants, 1);

    let users = SurrealUserRepository::new(store);
    let all = AmbientContext::bind(users.list(Pagination::default()))
        .await
        .unwrap();
    assert_eq!(all.total, 1);

    let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(all.items[0].tenant_id, winner.tenant.id);
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let (manager, _) = setup().await;
    let mut input = registration("Acme", "a@x.com");
    input.password = "short".into();
    assert!(matches!(
        manager.register(input).await,
        Err(AppError::Validation { .. })
    ));
}

#[tokio::test]
async fn password_length_follows_configuration() {
    let (_, store) = setup().await;
    let strict = SessionManager::new(
        SurrealUserRepository::new(store.clone()),
        SurrealRegistrationStore::new(store),
        AuthConfig {
            min_password_length: 12,
            ..test_config()
        },
    );

    let mut input = registration("Acme", "a@x.com");
    input.password = "ten-chars!".into();
    assert!(matches!(
        strict.register(input.clone()).await,
        Err(AppError::Validation { .. })
    ));

    input.password = "twelve-chars".into();
    strict.register(input).await.unwrap();
}

#[tokio::test]
async fn malformed_registration_is_a_validation_error() {
    let (manager, _) = setup().await;
    for email in ["a@@b.com", "a@b..com", "a\"b@x.com", "a@-x.com"] {
        let result = manager.register(registration("Acme", email)).await;
        assert!(
            matches!(result, Err(AppError::Validation { .. })),
            "{email}: {result:?}"
        );
    }

    let mut nameless = registration("Acme", "a@x.com");
    nameless.name = " ".into();
    assert!(matches!(
        manager.register(nameless).await,
        Err(AppError::Validation { .. })
    ));
}

#[tokio::test]
async fn change_password_requires_current_and_clears_refresh() {
    let (manager, store) = setup().await;
    let registered = manager.register(registration("Acme", "a@x.com")).await.unwrap();
    let principal = manager.verify_access(&registered.tokens.access_token).unwrap();

    AmbientContext::bind(async {
        manager.attach_tenant(&principal).await.unwrap();
        let wrong = manager
            .change_password(principal.id, "not-it", "new-password-1")
            .await;
        assert!(matches!(wrong, Err(AppError::AuthenticationFailed { .. })));

        manager
            .change_password(principal.id, "pw12345!", "new-password-1")
            .await
            .unwrap();
        let user = SurrealUserRepository::new(store.clone())
            .get_by_id(principal.id)
            .await
            .unwrap();
        assert!(user.refresh_token_hash.is_none());
    })
    .await;

    assert!(manager.login("a@x.com", "pw12345!").await.is_err());
    manager.login("a@x.com", "new-password-1").await.unwrap();
}

#[tokio::test]
async fn attach_tenant_fails_for_deleted_principal() {
    let (manager, store) = setup().await;
    let registered = manager.register(registration("Acme", "a@x.com")).await.unwrap();
    let principal = manager.verify_access(&registered.tokens.access_token).unwrap();

    AmbientContext::bind(async {
        manager.attach_tenant(&principal).await.unwrap();
        SurrealUserRepository::new(store.clone())
            .delete(principal.id)
            .await
            .unwrap();
    })
    .await;

    let attached = AmbientContext::bind(manager.attach_tenant(&principal)).await;
    assert!(matches!(attached, Err(AppError::AuthorizationDenied { .. })));
}

#[tokio::test]
async fn enrolled_user_joins_the_callers_tenant() {
    let (manager, _) = setup().await;
    let acme = manager.register(registration("Acme", "a@x.com")).await.unwrap();
    let admin = manager.verify_access(&acme.tokens.access_token).unwrap();

    let bob = AmbientContext::bind(async {
        manager.attach_tenant(&admin).await.unwrap();
        manager
            .enroll(Enrollment {
                email: "bob@x.com".into(),
                password: "bobs-password".into(),
                name: "Bob".into(),
                role: Role::User,
            })
            .await
            .unwrap()
    })
    .await;
    assert_eq!(bob.tenant_id, acme.tenant.id);
    assert_eq!(bob.role, Role::User);

    let tokens = manager.login("bob@x.com", "bobs-password").await.unwrap();
    let principal = manager.verify_access(&tokens.access_token).unwrap();
    let tenant = AmbientContext::bind(manager.attach_tenant(&principal))
        .await
        .unwrap();
    assert_eq!(tenant, acme.tenant.id);
}

#[tokio::test]
async fn enrollment_needs_a_tenant_and_a_fresh_email() {
    let (manager, _) = setup().await;
    let acme = manager.register(registration("Acme", "a@x.com")).await.unwrap();
    let admin = manager.verify_access(&acme.tokens.access_token).unwrap();
    let enrollment = |email: &str| Enrollment {
        email: email.into(),
        password: "long-enough".into(),
        name: "Someone".into(),
        role: Role::User,
    };

    let unbound = AmbientContext::bind(manager.enroll(enrollment("c@x.com"))).await;
    assert!(matches!(unbound, Err(AppError::TenantContext)));

    let duplicate = AmbientContext::bind(async {
        manager.attach_tenant(&admin).await.unwrap();
        manager.enroll(enrollment("a@x.com")).await
    })
    .await;
    assert!(matches!(duplicate, Err(AppError::Conflict { .. })));
}
