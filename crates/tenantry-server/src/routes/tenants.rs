use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::{Extension, Router};
use tenantry_core::access::Principal;
use tenantry_core::models::tenant::{Tenant, UpdateTenant};

use super::ValidJson;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/tenants/current",
        get(current).patch(rename).delete(delete_current),
    )
}

async fn current(State(state): State<AppState>) -> ApiResult<Json<Tenant>> {
    Ok(Json(state.tenants.current().await?))
}

async fn rename(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidJson(input): ValidJson<UpdateTenant>,
) -> ApiResult<Json<Tenant>> {
    Ok(Json(state.tenants.rename(&principal, input).await?))
}

async fn delete_current(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<StatusCode> {
    state.tenants.delete(&principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
