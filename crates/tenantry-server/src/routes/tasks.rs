use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch};
use axum::{Extension, Router};
use serde::Deserialize;
use tenantry_core::access::Principal;
use tenantry_core::models::task::{CreateTask, Task, TaskStatus, UpdateTask};
use tenantry_core::repository::PaginatedResult;
use uuid::Uuid;

use super::{ApiJson, ListQuery, ValidJson};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
struct StatusChange {
    status: TaskStatus,
}

#[derive(Deserialize)]
struct Assignment {
    /// `null` unassigns.
    assigned_to_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list).post(create))
        .route("/tasks/{id}", get(fetch).patch(update).delete(delete))
        .route("/tasks/{id}/status", patch(update_status))
        .route("/tasks/{id}/assign", patch(assign))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Task>>> {
    Ok(Json(state.tasks.list(query.into()).await?))
}

async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidJson(input): ValidJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn fetch(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.get(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<UpdateTask>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.update(&principal, id, input).await?))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<StatusChange>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        state.tasks.update_status(&principal, id, input.status).await?,
    ))
}

async fn assign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<Assignment>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        state.tasks.assign(&principal, id, input.assigned_to_id).await?,
    ))
}

async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.tasks.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
