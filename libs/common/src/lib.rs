//! Common library for the account services
//!
//! This crate provides shared infrastructure used across services: Redis
//! and PostgreSQL connectivity plus the error types those layers report.
//!
//! ```rust,no_run
//! use common::cache::{RedisConfig, RedisPool};
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!
//!     let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
//!     println!("Redis health check: {}", redis.health_check().await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
