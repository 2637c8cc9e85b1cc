use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::{Extension, Router};
use serde::Deserialize;
use tenantry_auth::Enrollment;
use tenantry_core::access::{Principal, require_role};
use tenantry_core::models::user::{Role, User};
use tenantry_core::repository::PaginatedResult;
use uuid::Uuid;
use validator::Validate;

use super::{ListQuery, ValidJson};
use crate::error::ApiResult;
use crate::services::{ProfileChanges, UserChanges};
use crate::state::AppState;

#[derive(Deserialize, Validate)]
struct PasswordChange {
    #[validate(length(min = 1, message = "Current password is required"))]
    current_password: String,
    new_password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).patch(update_me).delete(delete_me))
        .route("/users/me/password", put(change_password))
        .route("/users/admin", get(list).post(enroll))
        .route(
            "/users/admin/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.me(&principal).await?))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidJson(input): ValidJson<ProfileChanges>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.update_me(&principal, input).await?))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidJson(input): ValidJson<PasswordChange>,
) -> ApiResult<StatusCode> {
    state
        .sessions
        .change_password(principal.id, &input.current_password, &input.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<StatusCode> {
    state.users.delete_me(&principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<User>>> {
    Ok(Json(state.users.list(&principal, query.into()).await?))
}

async fn enroll(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidJson(input): ValidJson<Enrollment>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_role(&principal, &[Role::Admin])?;
    let user = state.sessions.enroll(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.get(&principal, id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<UserChanges>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.update(&principal, id, input).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.users.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
