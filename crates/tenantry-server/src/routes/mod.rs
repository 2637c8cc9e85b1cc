//! REST API under `/api/v1`.

mod auth;
mod projects;
mod tasks;
mod tenants;
mod users;

use axum::extract::{FromRequest, Request};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tenantry_core::error::AppError;
use tenantry_core::repository::Pagination;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::{bind_context, reveal_error_detail, tenant_scope};
use crate::state::AppState;

pub const MAX_PAGE_SIZE: u64 = 100;

/// JSON body extractor whose rejection is a validation error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// [`ApiJson`] that also runs the payload's `#[validate]` rules.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ApiJson(value) = ApiJson::<T>::from_request(request, state).await?;
        value.validate().map_err(AppError::from)?;
        Ok(ValidJson(value))
    }
}

/// `?offset=&limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl From<ListQuery> for Pagination {
    fn from(query: ListQuery) -> Self {
        let defaults = Pagination::default();
        Pagination {
            offset: query.offset.unwrap_or(defaults.offset),
            limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(users::routes())
        .merge(projects::routes())
        .merge(tasks::routes())
        .merge(tenants::routes())
        .route_layer(from_fn_with_state(state.clone(), tenant_scope));

    let api = auth::public_routes().merge(protected);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api);
    if state.expose_error_detail {
        app = app.layer(from_fn(reveal_error_detail));
    }

    app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(from_fn(bind_context)),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
