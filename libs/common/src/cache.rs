//! Redis cache module for the account services
//!
//! This module provides functionality for connecting to Redis and performing
//! the key-value operations the services rely on: TTL-bound writes, existence
//! checks, deletes and incremental cursor scans.

use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::info;

use crate::error::{CacheError, CacheResult};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> anyhow::Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Redis connection handle
///
/// Holds one multiplexed, auto-reconnecting connection. Clones share it.
#[derive(Clone)]
pub struct RedisPool {
    connection: ConnectionManager,
}

impl RedisPool {
    /// Initialize a new Redis connection handle
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(CacheError::Connection)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(CacheError::Connection)?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { connection })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let mut conn = self.connection();

        if let Some(ttl) = ttl_seconds {
            let _: () = conn
                .set_ex(key, value, ttl)
                .await
                .map_err(CacheError::Command)?;
        } else {
            let _: () = conn.set(key, value).await.map_err(CacheError::Command)?;
        }

        Ok(())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(key).await.map_err(CacheError::Command)?;
        Ok(value)
    }

    /// Check whether a key is present
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection();
        let found: bool = conn.exists(key).await.map_err(CacheError::Command)?;
        Ok(found)
    }

    /// Delete a key from Redis, returning how many keys were removed
    pub async fn delete(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.connection();
        let removed: u64 = conn.del(key).await.map_err(CacheError::Command)?;
        Ok(removed)
    }

    /// Delete several keys with one `DEL`, returning how many were removed
    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection();
        let removed: u64 = conn.del(keys).await.map_err(CacheError::Command)?;
        Ok(removed)
    }

    /// Run a single `SCAN` step
    ///
    /// Returns the next cursor and the keys of this batch. A returned cursor
    /// of `0` means the iteration is complete. `count` is a hint to Redis for
    /// the batch size, so the server is never asked to walk the whole
    /// keyspace in one call.
    pub async fn scan_step(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.connection();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;
        Ok((next, keys))
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_redis_config_defaults() {
        unsafe {
            std::env::remove_var("REDIS_URL");
        }

        let config = RedisConfig::from_env().unwrap();
        assert_eq!(config.url, "redis://localhost:6379");
    }

    #[test]
    #[serial]
    fn test_redis_config_from_env() {
        unsafe {
            std::env::set_var("REDIS_URL", "redis://cache:6380");
        }

        let config = RedisConfig::from_env().unwrap();
        assert_eq!(config.url, "redis://cache:6380");

        unsafe {
            std::env::remove_var("REDIS_URL");
        }
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_connection_error() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };

        let result = RedisPool::new(&config).await;
        assert!(matches!(result, Err(CacheError::Connection(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_set_exists_scan_delete() -> anyhow::Result<()> {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };

        let pool = RedisPool::new(&config).await?;
        assert!(pool.health_check().await?);

        pool.set("scan_test:a", "0", Some(5)).await?;
        pool.set("scan_test:b", "0", Some(5)).await?;
        assert!(pool.exists("scan_test:a").await?);

        let mut cursor = 0;
        let mut found = Vec::new();
        loop {
            let (next, keys) = pool.scan_step(cursor, "scan_test:*", 1).await?;
            found.extend(keys);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        found.sort();
        found.dedup();
        assert_eq!(found, vec!["scan_test:a", "scan_test:b"]);

        assert_eq!(pool.delete("scan_test:a").await?, 1);
        assert_eq!(pool.delete("scan_test:a").await?, 0);
        assert_eq!(pool.delete_many(&found).await?, 1);
        assert_eq!(pool.delete_many(&[]).await?, 0);
        assert!(!pool.exists("scan_test:b").await?);

        Ok(())
    }
}
