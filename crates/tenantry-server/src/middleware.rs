//! Request-scoped context and tenant attachment.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tenantry_core::context::AmbientContext;
use tenantry_core::error::AppError;
use tracing::debug;

use crate::error::{ApiResult, ErrorDetail};
use crate::state::AppState;

/// Run the rest of the request inside a fresh ambient context. The
/// context is discarded when the response is produced or the request is
/// aborted.
pub async fn bind_context(request: Request, next: Next) -> Response {
    AmbientContext::bind(next.run(request)).await
}

/// Replace the generic body of internal error responses with the
/// underlying message. Only layered when error detail is exposed.
pub async fn reveal_error_detail(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<ErrorDetail>() {
        Some(detail) => detail.reveal(response.status()),
        None => response,
    }
}

/// Authenticate the bearer token, make the caller's tenant the active
/// tenant and expose the [`Principal`](tenantry_core::access::Principal)
/// to handlers as a request extension.
pub async fn tenant_scope(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationFailed {
            reason: "missing bearer token".into(),
        })?;

    let principal = state.sessions.authenticate(bearer)?;
    let tenant_id = state.sessions.attach_tenant(&principal).await?;
    debug!(user_id = %principal.id, tenant_id = %tenant_id, "tenant attached");

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
