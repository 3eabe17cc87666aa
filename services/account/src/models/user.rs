//! User model and related payloads

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity
///
/// The password hash is never serialized, so a `User` can be embedded in an
/// access token or returned in a response body as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: Uuid,
    pub login: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub image_url: Option<String>,
}

impl User {
    /// Copy of the user with the password hash cleared
    pub fn without_password(&self) -> Self {
        Self {
            password: String::new(),
            ..self.clone()
        }
    }
}

/// Profile fields a user may update about themselves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}
