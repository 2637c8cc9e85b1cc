//! Ambient, request-scoped context.
//!
//! Each inbound request runs inside [`AmbientContext::bind`], which
//! registers a fresh context in a process-wide registry and makes its
//! handle visible (through tokio task-local storage) to every
//! continuation of the bound future. Repository code reads the active
//! tenant from here instead of taking it as a parameter.
//!
//! The registry entry lives exactly as long as the bound future: it is
//! removed when the future completes, returns an error, panics, or is
//! dropped because the request was aborted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Key under which the active tenant id is stored.
pub const TENANT_ID_KEY: &str = "tenant_id";

/// Opaque identifier of one bound context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

tokio::task_local! {
    static CURRENT: ContextHandle;
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

static REGISTRY: LazyLock<RwLock<HashMap<ContextHandle, HashMap<String, String>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Removes the registry entry when the bound future goes away.
struct ScopeGuard(ContextHandle);

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        REGISTRY.write().remove(&self.0);
        trace!(handle = self.0.0, "context discarded");
    }
}

/// Entry point for the ambient context. All methods are associated
/// functions; the state is process-wide.
pub struct AmbientContext;

impl AmbientContext {
    /// Run `fut` inside a new, empty context.
    ///
    /// Nested calls open an independent context that shadows the outer
    /// one for the duration of the inner future.
    pub async fn bind<F: Future>(fut: F) -> F::Output {
        let handle = ContextHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        REGISTRY.write().insert(handle, HashMap::new());
        let _guard = ScopeGuard(handle);
        trace!(handle = handle.0, "context bound");
        CURRENT.scope(handle, fut).await
    }

    /// Spawn a task that inherits the caller's context.
    ///
    /// The child sees values set by the parent (and vice versa) until the
    /// parent's bound future completes; after that it observes an empty
    /// context.
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::handle() {
            Some(handle) => tokio::spawn(CURRENT.scope(handle, fut)),
            None => tokio::spawn(fut),
        }
    }

    /// Handle of the caller's context, if any.
    pub fn handle() -> Option<ContextHandle> {
        CURRENT.try_with(|h| *h).ok()
    }

    /// Whether `handle` still refers to a live context.
    pub fn is_live(handle: ContextHandle) -> bool {
        REGISTRY.read().contains_key(&handle)
    }

    /// Read a value from the caller's context. Returns `None` outside a
    /// bound context.
    pub fn get(key: &str) -> Option<String> {
        let handle = Self::handle()?;
        REGISTRY
            .read()
            .get(&handle)
            .and_then(|values| values.get(key).cloned())
    }

    /// Store a value in the caller's context.
    pub fn set(key: &str, value: impl Into<String>) -> AppResult<()> {
        let Some(handle) = Self::handle() else {
            warn!(key, "attempted to set a context value outside a bound context");
            return Err(AppError::TenantContext);
        };

        let mut registry = REGISTRY.write();
        match registry.get_mut(&handle) {
            Some(values) => {
                values.insert(key.to_string(), value.into());
                Ok(())
            }
            None => {
                warn!(key, "attempted to set a value on a discarded context");
                Err(AppError::TenantContext)
            }
        }
    }

    /// Active tenant of the caller's context.
    pub fn tenant_id() -> Option<Uuid> {
        Self::get(TENANT_ID_KEY).and_then(|raw| Uuid::parse_str(&raw).ok())
    }

    pub fn set_tenant_id(tenant_id: Uuid) -> AppResult<()> {
        Self::set(TENANT_ID_KEY, tenant_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn get_outside_bound_context_is_absent() {
        assert!(AmbientContext::handle().is_none());
        assert!(AmbientContext::tenant_id().is_none());
        assert!(AmbientContext::get("anything").is_none());
    }

    #[tokio::test]
    async fn set_outside_bound_context_fails() {
        let err = AmbientContext::set_tenant_id(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::TenantContext));
    }

    #[tokio::test]
    async fn value_visible_across_awaits() {
        let tenant = Uuid::new_v4();
        let seen = AmbientContext::bind(async move {
            assert!(AmbientContext::tenant_id().is_none());
            AmbientContext::set_tenant_id(tenant).unwrap();
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            AmbientContext::tenant_id()
        })
        .await;
        assert_eq!(seen, Some(tenant));
    }

    #[tokio::test]
    async fn context_is_discarded_after_completion() {
        let handle = AmbientContext::bind(async {
            let handle = AmbientContext::handle().unwrap();
            assert!(AmbientContext::is_live(handle));
            handle
        })
        .await;
        assert!(!AmbientContext::is_live(handle));
    }

    #[tokio::test]
    async fn context_is_discarded_on_error() {
        let handle = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let captured = handle.clone();
        let result: Result<(), &str> = AmbientContext::bind(async move {
            *captured.lock() = AmbientContext::handle();
            AmbientContext::set_tenant_id(Uuid::new_v4()).unwrap();
            Err("handler failed")
        })
        .await;
        assert!(result.is_err());
        let handle = (*handle.lock()).expect("handle captured");
        assert!(!AmbientContext::is_live(handle));
    }

    #[tokio::test]
    async fn context_is_discarded_on_abort() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(AmbientContext::bind(async move {
            let _ = tx.send(AmbientContext::handle().unwrap());
            tokio::time::sleep(Duration::from_secs(60)).await;
        }));
        let handle = rx.await.unwrap();
        assert!(AmbientContext::is_live(handle));

        task.abort();
        let _ = task.await;
        assert!(!AmbientContext::is_live(handle));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_contexts_are_isolated() {
        let mut tasks = Vec::new();
        for _ in 0..32 {
            tasks.push(tokio::spawn(AmbientContext::bind(async {
                let tenant = Uuid::new_v4();
                AmbientContext::set_tenant_id(tenant).unwrap();
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                    assert_eq!(AmbientContext::tenant_id(), Some(tenant));
                }
                tenant
            })));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn spawned_tasks_inherit_context() {
        let tenant = Uuid::new_v4();
        let child_saw = AmbientContext::bind(async move {
            AmbientContext::set_tenant_id(tenant).unwrap();
            AmbientContext::spawn(async { AmbientContext::tenant_id() })
                .await
                .unwrap()
        })
        .await;
        assert_eq!(child_saw, Some(tenant));
    }

    #[tokio::test]
    async fn plain_spawn_does_not_inherit() {
        let child_saw = AmbientContext::bind(async {
            AmbientContext::set_tenant_id(Uuid::new_v4()).unwrap();
            tokio::spawn(async { AmbientContext::tenant_id() })
                .await
                .unwrap()
        })
        .await;
        assert_eq!(child_saw, None);
    }

    #[tokio::test]
    async fn nested_bind_opens_an_independent_context() {
        AmbientContext::bind(async {
            let outer = Uuid::new_v4();
            AmbientContext::set_tenant_id(outer).unwrap();

            let inner_seen = AmbientContext::bind(async { AmbientContext::tenant_id() }).await;
            assert_eq!(inner_seen, None);
            assert_eq!(AmbientContext::tenant_id(), Some(outer));
        })
        .await;
    }
}
