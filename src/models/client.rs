use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Entity;

/// A point-of-sale customer. `id` is assigned by storage on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: i32,
    pub name: String,
}

impl Client {
    /// Not yet persisted; id 0 until the repository commits it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
        }
    }
}

impl Entity for Client {
    const NAME: &'static str = "client";

    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}

/// Body of `POST /api/client` and `PUT /api/client`. `id` is ignored on create.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientRequest {
    #[serde(default)]
    pub id: i32,
    #[validate(length(min = 1, message = "The Name field is required."))]
    pub name: String,
}
