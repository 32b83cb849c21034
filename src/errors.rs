use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::envelope::Envelope;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("{entity} {id} no longer exists")]
    MissingRow { entity: &'static str, id: i32 },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return PersistenceError::Conflict(db.message().to_string());
            }
        }
        if matches!(
            err,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        ) {
            return PersistenceError::Unavailable(err.to_string());
        }
        PersistenceError::Database(err)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("not found")]
    NotFound { message: Option<String> },

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body: Envelope<serde_json::Value> = match self {
            ApiError::Validation { message, details } => Envelope::failure(Some(message), details),
            ApiError::NotFound { message } => Envelope::failure(message, None),
            ApiError::Unauthorized => {
                Envelope::failure(Some("invalid or missing token".to_string()), None)
            }
            ApiError::Persistence(e) => {
                tracing::error!("Persistence error: {}", e);
                Envelope::failure(Some("internal server error".to_string()), None)
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                Envelope::failure(Some("internal server error".to_string()), None)
            }
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}
