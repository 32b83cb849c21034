use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Uniform wrapper returned by every endpoint.
///
/// `success = false` means `data` is not a valid result, even when present
/// (registration failures carry per-field errors there).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Successful envelope with a message and no payload.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Successful envelope with neither message nor payload.
    pub fn empty() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(message: Option<String>, data: Option<T>) -> Self {
        Self {
            success: false,
            message,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_envelope_serializes_nulls() {
        let env: Envelope<()> = Envelope::empty();
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"success": true, "message": null, "data": null}));
    }

    #[test]
    fn test_ok_with_message() {
        let env = Envelope::ok(json!({"token": "abc"})).with_message("Login successful");
        assert!(env.success);
        assert_eq!(env.message.as_deref(), Some("Login successful"));
        assert_eq!(env.data.unwrap()["token"], "abc");
    }
}
