//! User storage

pub mod memory;
pub mod user;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{User, UserDetails},
};

pub use self::memory::MemoryUserRepository;
pub use self::user::PgUserRepository;

/// Read/write access to user records
///
/// Implementations report a missing user as [`crate::error::AppError::NotFound`]
/// and a taken login as [`crate::error::AppError::Conflict`].
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Fetch a user by id
    async fn find_by_id(&self, uid: Uuid) -> AppResult<User>;

    /// Fetch a user by login
    async fn find_by_login(&self, login: &str) -> AppResult<User>;

    /// Insert a user whose `password` already holds a hash; returns the stored record
    async fn create(&self, user: &User) -> AppResult<User>;

    /// Replace the profile fields of `uid`; returns the updated record
    async fn update_details(&self, uid: Uuid, details: &UserDetails) -> AppResult<User>;
}
