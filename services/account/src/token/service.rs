//! Token lifecycle: issuance, rotation, validation and bulk revocation
//!
//! This is the only layer that turns codec and store failures into
//! caller-facing [`AppError`]s. Verification failures are collapsed into one
//! generic authorization message so callers cannot tell a bad signature from
//! an expired or malformed token.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, EncodingKey};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::codec::{self, TokenError};
use super::config::TokenConfig;
use crate::{
    context::RequestContext,
    error::{AppError, AppResult},
    models::{AccessToken, RefreshToken, TokenPair, User},
    revocation::{RevocationStore, StoreError},
};

const ACCESS_TOKEN_REJECTED: &str = "Unable to verify user from access token";
const REFRESH_TOKEN_REJECTED: &str = "Unable to verify user from refresh token";

/// Cancellation is retryable for the caller; anything else is internal
fn store_failure(err: &StoreError) -> AppError {
    match err {
        StoreError::Cancelled => AppError::ServiceUnavailable("Request was cancelled".to_string()),
        _ => AppError::Internal,
    }
}

/// Operations the HTTP layer needs from the token subsystem
#[async_trait]
pub trait TokenLifecycle: Send + Sync {
    /// Issue a new pair for `user`, first revoking `previous_token_id` if given
    async fn issue_pair(
        &self,
        ctx: &RequestContext,
        user: &User,
        previous_token_id: Option<Uuid>,
    ) -> AppResult<TokenPair>;

    /// Verify an access token and return the user it was issued for
    fn validate_access_token(&self, token: &str) -> AppResult<User>;

    /// Verify a refresh token and confirm it has not been revoked
    async fn validate_refresh_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> AppResult<RefreshToken>;

    /// Revoke every refresh token of `user_id`
    async fn signout(&self, ctx: &RequestContext, user_id: Uuid) -> AppResult<()>;
}

/// Token service backed by a [`RevocationStore`]
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn RevocationStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    refresh_secret: Vec<u8>,
    access_token_expiry: u64,
    refresh_token_expiry: u64,
}

impl TokenService {
    /// Initialize a new token service
    pub fn new(config: TokenConfig, store: Arc<dyn RevocationStore>) -> Result<Self, TokenError> {
        let (encoding_key, decoding_key) = codec::rsa_keys(&config.private_key, &config.public_key)?;

        Ok(Self {
            store,
            encoding_key,
            decoding_key,
            refresh_secret: config.refresh_secret.into_bytes(),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
        })
    }
}

#[async_trait]
impl TokenLifecycle for TokenService {
    async fn issue_pair(
        &self,
        ctx: &RequestContext,
        user: &User,
        previous_token_id: Option<Uuid>,
    ) -> AppResult<TokenPair> {
        if let Some(previous) = previous_token_id {
            // A failed delete leaves the old entry to expire on its own
            if let Err(e) = self.store.delete(ctx, user.uid, previous).await {
                warn!(
                    "Could not delete previous refresh token for uid: {}, tokenID: {}: {}",
                    user.uid, previous, e
                );
            }
        }

        let access_token = codec::sign_access_token(user, &self.encoding_key, self.access_token_expiry)
            .map_err(|e| {
                error!("Error generating access token for uid: {}: {}", user.uid, e);
                AppError::Internal
            })?;

        let refresh_token =
            codec::sign_refresh_token(user.uid, &self.refresh_secret, self.refresh_token_expiry)
                .map_err(|e| {
                    error!("Error generating refresh token for uid: {}: {}", user.uid, e);
                    AppError::Internal
                })?;

        self.store
            .put(ctx, user.uid, refresh_token.id, refresh_token.expires_in)
            .await
            .map_err(|e| {
                error!("Error storing tokenID for uid: {}: {}", user.uid, e);
                store_failure(&e)
            })?;

        info!("Issued token pair for uid: {}", user.uid);

        Ok(TokenPair {
            access_token: AccessToken {
                token: access_token,
            },
            refresh_token: RefreshToken {
                id: refresh_token.id,
                user_id: user.uid,
                token: refresh_token.token,
            },
        })
    }

    fn validate_access_token(&self, token: &str) -> AppResult<User> {
        codec::verify_access_token(token, &self.decoding_key).map_err(|e| {
            info!("Unable to validate or parse access token: {}", e);
            AppError::Authorization(ACCESS_TOKEN_REJECTED.to_string())
        })
    }

    async fn validate_refresh_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> AppResult<RefreshToken> {
        let claims = codec::verify_refresh_token(token, &self.refresh_secret).map_err(|e| {
            info!("Unable to validate or parse refresh token: {}", e);
            AppError::Authorization(REFRESH_TOKEN_REJECTED.to_string())
        })?;

        let live = self
            .store
            .exists(ctx, claims.user_id, claims.token_id)
            .await
            .map_err(|e| {
                error!(
                    "Could not look up refresh token for uid: {}, tokenID: {}: {}",
                    claims.user_id, claims.token_id, e
                );
                store_failure(&e)
            })?;

        if !live {
            info!(
                "Refresh token for uid: {}, tokenID: {} is revoked or expired",
                claims.user_id, claims.token_id
            );
            return Err(AppError::Authorization(REFRESH_TOKEN_REJECTED.to_string()));
        }

        Ok(RefreshToken {
            id: claims.token_id,
            user_id: claims.user_id,
            token: token.to_string(),
        })
    }

    async fn signout(&self, ctx: &RequestContext, user_id: Uuid) -> AppResult<()> {
        let removed = self
            .store
            .delete_all_for_user(ctx, user_id)
            .await
            .map_err(|e| {
                error!("Failed to revoke refresh tokens for uid: {}: {}", user_id, e);
                store_failure(&e)
            })?;

        info!("Signed out uid: {} ({} refresh tokens revoked)", user_id, removed);
        Ok(())
    }
}
