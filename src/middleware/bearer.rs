//! Bearer-token guard for protected routes.
//!
//! On success the validated claims are attached to the request as a
//! [`CurrentUser`] extension, so handlers receive the caller's identity
//! explicitly instead of reading shared state.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::errors::ApiError;
use crate::AppState;

/// Identity of the authenticated caller for the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub username: String,
    pub email: String,
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
}

/// Middleware: rejects requests without a valid `Authorization: Bearer <jwt>`.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&req) else {
        tracing::warn!(path = %req.uri().path(), "missing bearer token");
        return Err(ApiError::Unauthorized);
    };

    let claims = state.auth.tokens().validate(token).map_err(|e| {
        tracing::warn!(path = %req.uri().path(), "rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(CurrentUser {
        username: claims.sub,
        email: claims.email,
    });
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}
