use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::{Extension, Router};
use tenantry_core::access::Principal;
use tenantry_core::models::project::{Project, UpdateProject};
use tenantry_core::repository::PaginatedResult;
use uuid::Uuid;

use super::{ListQuery, ValidJson};
use crate::error::ApiResult;
use crate::services::NewProjectInput;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list).post(create))
        .route("/projects/{id}", get(fetch).patch(update).delete(delete))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Project>>> {
    Ok(Json(state.projects.list(query.into()).await?))
}

async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidJson(input): ValidJson<NewProjectInput>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.projects.create(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn fetch(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.get(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<UpdateProject>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.update(&principal, id, input).await?))
}

async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.projects.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
