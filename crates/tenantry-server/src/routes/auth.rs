use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::{Extension, Router};
use serde::Deserialize;
use tenantry_auth::{Registration, RegistrationOutcome, TokenPair};
use tenantry_core::access::Principal;
use tenantry_core::validate::not_blank;
use validator::Validate;

use super::ValidJson;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize, Validate)]
struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Deserialize, Validate)]
struct RefreshRequest {
    #[validate(custom(function = "not_blank", message = "Refresh token is required"))]
    refresh_token: String,
}

/// Routes reachable without a bearer token. They still run inside a
/// bound context, with no tenant attached.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

async fn register(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<Registration>,
) -> ApiResult<(StatusCode, Json<RegistrationOutcome>)> {
    let outcome = state.sessions.register(input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn login(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    Ok(Json(state.sessions.login(&input.email, &input.password).await?))
}

async fn refresh(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    Ok(Json(state.sessions.refresh(&input.refresh_token).await?))
}

async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<StatusCode> {
    state.sessions.logout(principal.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
