use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tenantry_core::{ErrorKind, ScopeError};
use tracing::error;

/// Response wrapper for anything a handler can fail with.
#[derive(Debug)]
pub struct ApiError(pub anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<ScopeError> for ApiError {
    fn from(e: ScopeError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Structured errors keep their kind and message, even under
        // anyhow contexts. Anything else is logged and reported as a bare
        // 500 so internals never reach the client.
        let safe = match ScopeError::from_anyhow(&self.0) {
            Some(scope) => {
                if scope.kind == ErrorKind::GeneralError {
                    error!(error = ?self.0, "request failed");
                }
                scope.sanitize_for_client()
            }
            None => {
                error!(error = ?self.0, "unhandled error");
                ScopeError::general_error("Internal server error")
            }
        };

        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut res = (status, Json(safe.to_json())).into_response();

        if safe.kind == ErrorKind::NotAuthenticated {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}
