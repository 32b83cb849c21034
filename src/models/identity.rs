use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user's credential record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub security_stamp: Uuid,
    pub lockout_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub access_failed_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(username: &str, email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            security_stamp: Uuid::new_v4(),
            lockout_enabled: true,
            lockout_end: None,
            access_failed_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// A single reason an identity could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityError {
    pub code: &'static str,
    pub description: String,
}

impl IdentityError {
    pub fn new(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

/// Group errors by code: `{ "DuplicateUserName": ["Username 'x' is already taken."] }`.
pub fn errors_by_code(errors: &[IdentityError]) -> serde_json::Value {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for err in errors {
        grouped.entry(err.code).or_default().push(&err.description);
    }
    serde_json::to_value(grouped).unwrap_or_default()
}
