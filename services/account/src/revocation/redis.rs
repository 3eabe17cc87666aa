//! Redis-backed revocation store

use std::time::Duration;

use async_trait::async_trait;
use common::cache::RedisPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{RevocationStore, StoreError, StoreResult, entry_key, ttl_seconds, user_prefix};
use crate::context::RequestContext;

/// Default number of keys requested per `SCAN` step
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Revocation store keeping entries as TTL-bound Redis keys
#[derive(Clone)]
pub struct RedisRevocationStore {
    redis_pool: RedisPool,
    scan_batch: usize,
}

impl RedisRevocationStore {
    /// Create a new store over `redis_pool`
    pub fn new(redis_pool: RedisPool, scan_batch: usize) -> Self {
        Self {
            redis_pool,
            scan_batch: scan_batch.max(1),
        }
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn put(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<()> {
        let key = entry_key(user_id, token_id);
        ctx.run(self.redis_pool.set(&key, "0", Some(ttl_seconds(ttl))))
            .await?
            .map_err(|e| {
                error!(
                    "Could not SET refresh token for userID/tokenID {}/{}: {}",
                    user_id, token_id, e
                );
                StoreError::from(e)
            })
    }

    async fn exists(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
    ) -> StoreResult<bool> {
        let key = entry_key(user_id, token_id);
        Ok(ctx.run(self.redis_pool.exists(&key)).await??)
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
    ) -> StoreResult<()> {
        let key = entry_key(user_id, token_id);
        let removed = ctx.run(self.redis_pool.delete(&key)).await?.map_err(|e| {
            error!(
                "Could not delete refresh token for userID/tokenID {}/{}: {}",
                user_id, token_id, e
            );
            StoreError::from(e)
        })?;

        if removed == 0 {
            debug!(
                "Refresh token for userID/tokenID {}/{} was already gone",
                user_id, token_id
            );
        }

        Ok(())
    }

    async fn delete_all_for_user(&self, ctx: &RequestContext, user_id: Uuid) -> StoreResult<u64> {
        let pattern = format!("{}*", user_prefix(user_id));
        let mut cursor = 0;
        let mut total = 0;
        let mut failed = 0;
        let mut deleted = 0;

        loop {
            let (next, keys) = ctx
                .run(self.redis_pool.scan_step(cursor, &pattern, self.scan_batch))
                .await??;

            total += keys.len();
            match ctx.run(self.redis_pool.delete_many(&keys)).await? {
                Ok(removed) => deleted += removed,
                Err(e) => {
                    warn!(
                        "Failed to delete {} refresh tokens for user {}: {}",
                        keys.len(),
                        user_id,
                        e
                    );
                    failed += keys.len();
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        if failed > 0 {
            return Err(StoreError::PartialDelete { failed, total });
        }

        debug!("Deleted {} refresh tokens for user {}", deleted, user_id);
        Ok(deleted)
    }
}
