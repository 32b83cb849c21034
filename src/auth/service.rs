use validator::Validate;

use super::password::PasswordVerification;
use super::token::TokenIssuer;
use super::user_manager::{CreateIdentityError, UserManager};
use crate::errors::ApiError;
use crate::models::auth::{LoginRequest, RegisterRequest};
use crate::models::identity::{errors_by_code, Identity};

pub const REGISTRATION_SUCCEEDED: &str = "User Registration Successful";
pub const REGISTRATION_FAILED: &str = "User Registration Failed";
pub const LOGIN_SUCCEEDED: &str = "Login successful";
pub const LOGIN_FAILED: &str = "Login failed";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The username as submitted.
    pub username: String,
    pub token: String,
    /// The stored hash should be upgraded to the current hashing settings.
    pub rehash_needed: bool,
}

pub struct AuthService {
    users: UserManager,
    tokens: TokenIssuer,
}

/// Field name to messages, for the `data` of a validation failure.
fn validation_details(errors: &validator::ValidationErrors) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {} field is invalid.", field))
                })
                .collect();
            (field.to_string(), serde_json::json!(messages))
        })
        .collect();
    serde_json::Value::Object(fields)
}

impl AuthService {
    pub fn new(users: UserManager, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Validate the request and create exactly one identity, or none on any failure.
    pub async fn register(&self, request: Option<RegisterRequest>) -> Result<Identity, ApiError> {
        let request = request.ok_or_else(|| ApiError::validation(REGISTRATION_FAILED))?;
        if let Err(errors) = request.validate() {
            return Err(ApiError::Validation {
                message: REGISTRATION_FAILED.to_string(),
                details: Some(validation_details(&errors)),
            });
        }

        match self
            .users
            .create(&request.username, &request.email, &request.password)
            .await
        {
            Ok(identity) => Ok(identity),
            Err(CreateIdentityError::Rejected(errors)) => {
                tracing::info!(
                    username = %request.username,
                    reasons = ?errors.iter().map(|e| e.code).collect::<Vec<_>>(),
                    "registration rejected"
                );
                Err(ApiError::Validation {
                    message: REGISTRATION_FAILED.to_string(),
                    details: Some(errors_by_code(&errors)),
                })
            }
            Err(CreateIdentityError::Persistence(e)) => Err(e.into()),
            Err(CreateIdentityError::Hashing(e)) => Err(ApiError::Internal(e)),
        }
    }

    /// Look the user up, verify the password, issue a token.
    ///
    /// An unknown username fails without running password verification.
    pub async fn login(&self, request: Option<LoginRequest>) -> Result<LoginOutcome, ApiError> {
        let request = request.ok_or_else(|| ApiError::validation(LOGIN_FAILED))?;
        if request.validate().is_err() {
            return Err(ApiError::validation(LOGIN_FAILED));
        }

        let Some(identity) = self.users.find_by_name(&request.username).await? else {
            tracing::info!(username = %request.username, "login failed: unknown user");
            return Err(ApiError::validation(LOGIN_FAILED));
        };

        let verification = self.users.check_password(&identity, &request.password).await;
        if verification == PasswordVerification::Failed {
            tracing::info!(username = %request.username, "login failed: password mismatch");
            return Err(ApiError::validation(LOGIN_FAILED));
        }

        let rehash_needed = verification == PasswordVerification::SuccessRehashNeeded;
        if rehash_needed {
            tracing::info!(username = %identity.username, "stored password hash uses outdated settings");
        }

        let token = self
            .tokens
            .issue(&identity)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("token signing failed: {}", e)))?;

        tracing::info!(username = %identity.username, "login succeeded");
        Ok(LoginOutcome {
            username: request.username,
            token,
            rehash_needed,
        })
    }
}
