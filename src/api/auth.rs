use std::sync::Arc;

use axum::{extract::State, Json};

use crate::auth::service::{LOGIN_SUCCEEDED, REGISTRATION_SUCCEEDED};
use crate::errors::ApiError;
use crate::models::auth::{LoginRequest, LoginResponse, RegisterRequest};
use crate::models::envelope::Envelope;
use crate::AppState;

/// POST /api/auth/register - create an identity
///
/// A missing or malformed body is handled as an absent request.
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Envelope<()>, ApiError> {
    state
        .auth
        .register(payload.map(|Json(request)| request))
        .await?;
    Ok(Envelope::done(REGISTRATION_SUCCEEDED))
}

/// POST /api/auth/login - exchange credentials for a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Envelope<LoginResponse>, ApiError> {
    let outcome = state
        .auth
        .login(payload.map(|Json(request)| request))
        .await?;

    Ok(Envelope::ok(LoginResponse {
        username: outcome.username,
        token: outcome.token,
    })
    .with_message(LOGIN_SUCCEEDED))
}
