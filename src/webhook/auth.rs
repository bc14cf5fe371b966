//! Bearer-token guard for the operator and sweep endpoints.
//!
//! Fails closed: with no token configured every request is rejected.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::AppError;

/// Expected bearer token for protected routes.
#[derive(Clone)]
pub struct AuthConfig {
    /// Token callers must present; `None` rejects everything.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Reject requests without `Authorization: Bearer <token>` matching the
/// configured token.
pub async fn require_bearer(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth.bearer_token.as_deref().filter(|t| !t.is_empty()) else {
        error!("no api token configured; rejecting protected request");
        return AppError::Unauthorized("api token not configured".into()).into_response();
    };

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "bearer token rejected");
        AppError::Unauthorized("invalid or missing bearer token".into()).into_response()
    }
}
