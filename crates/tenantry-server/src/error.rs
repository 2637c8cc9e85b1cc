//! HTTP mapping of the shared error taxonomy.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tenantry_core::error::AppError;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    code: &'static str,
    message: String,
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            status: "error",
            code,
            message,
        }),
    )
        .into_response()
}

/// Underlying message of an internal error, carried as a response
/// extension. The body only shows it when the router is built with
/// error detail exposed.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl ErrorDetail {
    /// Rebuild the error body with the underlying message.
    pub fn reveal(self, status: StatusCode) -> Response {
        error_response(status, self.code, self.message)
    }
}

/// Handler error; wraps [`AppError`] so it can be turned into a response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::validation(rejection.body_text()))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::AuthenticationFailed { .. } => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR")
            }
            AppError::AuthorizationDenied { .. } => (StatusCode::FORBIDDEN, "AUTHORIZATION_ERROR"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Crypto(_) | AppError::TenantContext | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if self.0.is_internal() {
            error!(error = %self.0, "request failed");
            let mut response = error_response(status, code, "Internal server error".into());
            response.extensions_mut().insert(ErrorDetail {
                code,
                message: self.0.to_string(),
            });
            return response;
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(error = %self.0, "request rejected");
        }
        error_response(status, code, self.0.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn statuses_follow_the_taxonomy() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                AppError::AuthenticationFailed {
                    reason: "no".into(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::forbidden("no"), StatusCode::FORBIDDEN),
            (AppError::not_found("task", "x"), StatusCode::NOT_FOUND),
            (
                AppError::Conflict {
                    entity: "user".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                AppError::Database("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_detail_is_hidden_by_default() {
        let response = ApiError(AppError::Database("connection refused at 10.0.0.3".into()))
            .into_response();
        let json = body(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "DATABASE_ERROR");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn internal_detail_travels_as_an_extension() {
        let response = ApiError(AppError::Internal("queue full".into())).into_response();
        let detail = response.extensions().get::<ErrorDetail>().cloned().unwrap();
        assert_eq!(detail.code, "SERVER_ERROR");
        assert_eq!(detail.message, "Internal error: queue full");

        let client = ApiError(AppError::validation("bad")).into_response();
        assert!(client.extensions().get::<ErrorDetail>().is_none());
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let json = body(ApiError(AppError::validation("title must not be empty")).into_response())
            .await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(
            json["message"]
                .as_str()
                .unwrap()
                .contains("title must not be empty")
        );
    }
}
