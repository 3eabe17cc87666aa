//! In-process revocation store
//!
//! Behaves like the Redis store (per-entry expiry, prefix deletes, no-op
//! deletes of missing entries) and can be told to fail specific operations,
//! which makes it the store of choice for exercising the lifecycle rules.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

use super::{RevocationStore, StoreError, StoreResult, entry_key, user_prefix};
use crate::context::RequestContext;

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Instant>,
    failing_deletes: HashSet<Uuid>,
    fail_writes: bool,
}

impl MemoryState {
    fn is_live(&self, key: &str, now: Instant) -> bool {
        self.entries.get(key).is_some_and(|expires| *expires > now)
    }
}

/// Revocation store held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRevocationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRevocationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with a backend error
    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// Make deletion of `token_id` fail with a backend error
    pub async fn fail_delete_of(&self, token_id: Uuid) {
        self.state.lock().await.failing_deletes.insert(token_id);
    }

    /// Number of live entries for `user_id`
    pub async fn live_count(&self, user_id: Uuid) -> usize {
        let state = self.state.lock().await;
        let prefix = user_prefix(user_id);
        let now = Instant::now();
        state
            .entries
            .keys()
            .filter(|key| key.starts_with(&prefix) && state.is_live(key, now))
            .count()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn put(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<()> {
        ctx.run(async {
            let mut state = self.state.lock().await;
            if state.fail_writes {
                return Err(StoreError::Backend("write rejected".to_string()));
            }
            let now = Instant::now();
            let expires = now
                .checked_add(ttl)
                .ok_or_else(|| StoreError::Backend(format!("ttl {:?} out of range", ttl)))?;

            state.entries.retain(|_, expires| *expires > now);
            state.entries.insert(entry_key(user_id, token_id), expires);
            Ok(())
        })
        .await?
    }

    async fn exists(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
    ) -> StoreResult<bool> {
        ctx.run(async {
            let state = self.state.lock().await;
            state.is_live(&entry_key(user_id, token_id), Instant::now())
        })
        .await
        .map_err(StoreError::from)
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        token_id: Uuid,
    ) -> StoreResult<()> {
        ctx.run(async {
            let mut state = self.state.lock().await;
            if state.failing_deletes.contains(&token_id) {
                return Err(StoreError::Backend("delete rejected".to_string()));
            }
            state.entries.remove(&entry_key(user_id, token_id));
            Ok(())
        })
        .await?
    }

    async fn delete_all_for_user(&self, ctx: &RequestContext, user_id: Uuid) -> StoreResult<u64> {
        ctx.run(async {
            let mut state = self.state.lock().await;
            let prefix = user_prefix(user_id);
            let now = Instant::now();
            let keys: Vec<String> = state
                .entries
                .keys()
                .filter(|key| key.starts_with(&prefix))
                .cloned()
                .collect();

            let total = keys.len();
            let mut failed = 0;
            let mut deleted = 0;
            for key in keys {
                let token_id = key[prefix.len()..].parse::<Uuid>().ok();
                if token_id.is_some_and(|id| state.failing_deletes.contains(&id)) {
                    failed += 1;
                    continue;
                }
                let live = state.is_live(&key, now);
                state.entries.remove(&key);
                if live {
                    deleted += 1;
                }
            }

            if failed > 0 {
                return Err(StoreError::PartialDelete { failed, total });
            }
            Ok(deleted)
        })
        .await?
    }
}
