//! Token pair models returned to callers

use serde::Serialize;
use uuid::Uuid;

/// Signed, short-lived credential carrying a user snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    #[serde(rename = "accessToken")]
    pub token: String,
}

/// Signed, long-lived credential identified by `id`
///
/// Only the signed string leaves the service; `id` and `user_id` are kept so
/// callers do not need to re-parse the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken {
    #[serde(skip)]
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    #[serde(rename = "refreshToken")]
    pub token: String,
}

/// Access and refresh token issued together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    #[serde(flatten)]
    pub access_token: AccessToken,
    #[serde(flatten)]
    pub refresh_token: RefreshToken,
}
