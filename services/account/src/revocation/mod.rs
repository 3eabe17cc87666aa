//! Revocation store for refresh tokens
//!
//! The store records one entry per live refresh token, keyed by user id and
//! token id, with a TTL equal to the token's remaining lifetime. Presence of
//! the entry is what makes a refresh token usable; deleting it (or letting it
//! expire) kills the token.
//!
//! Deleting an entry that does not exist is a no-op, so rotation after a
//! bulk signout never fails on the missing entry.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::context::{Cancelled, RequestContext};

pub use self::memory::MemoryRevocationStore;
pub use self::redis::RedisRevocationStore;

/// Errors reported by a revocation store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected the operation or could not be reached
    #[error("revocation store backend failure: {0}")]
    Backend(String),

    /// The request context was cancelled before the operation finished
    #[error("revocation store operation cancelled")]
    Cancelled,

    /// Some entries of a bulk delete could not be removed
    #[error("failed to delete {failed} of {total} refresh tokens")]
    PartialDelete { failed: usize, total: usize },
}

impl From<Cancelled> for StoreError {
    fn from(_: Cancelled) -> Self {
        StoreError::Cancelled
    }
}

impl From<common::error::CacheError> for StoreError {
    fn from(err: common::error::CacheError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Type alias for revocation store results
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value record of live refresh-token identifiers
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `(user_id, token_id)` as live for `ttl`
    async fn put(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<()>;

    /// Whether `(user_id, token_id)` is currently live
    async fn exists(&self, ctx: &RequestContext, user_id: Uuid, token_id: Uuid)
    -> StoreResult<bool>;

    /// Remove a single entry; removing a missing entry succeeds
    async fn delete(&self, ctx: &RequestContext, user_id: Uuid, token_id: Uuid)
    -> StoreResult<()>;

    /// Remove every entry belonging to `user_id`, returning how many were removed
    ///
    /// Deletion continues past individual failures; if any occurred the
    /// result is [`StoreError::PartialDelete`].
    async fn delete_all_for_user(&self, ctx: &RequestContext, user_id: Uuid) -> StoreResult<u64>;
}

/// Key under which a refresh token is recorded
pub fn entry_key(user_id: Uuid, token_id: Uuid) -> String {
    format!("refresh_token:{}:{}", user_id, token_id)
}

/// Prefix shared by every entry of `user_id`
pub fn user_prefix(user_id: Uuid) -> String {
    format!("refresh_token:{}:", user_id)
}

/// TTL in whole seconds, never below one so an entry is never written persistent
pub fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
}
