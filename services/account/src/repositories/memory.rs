//! In-memory user repository

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserLookup;
use crate::{
    error::{AppError, AppResult},
    models::{User, UserDetails},
};

/// User repository kept in a map, keyed by uid
#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserLookup for MemoryUserRepository {
    async fn find_by_id(&self, uid: Uuid) -> AppResult<User> {
        self.users
            .read()
            .await
            .get(&uid)
            .cloned()
            .ok_or_else(|| AppError::not_found("uid", uid.to_string()))
    }

    async fn find_by_login(&self, login: &str) -> AppResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.login == login)
            .cloned()
            .ok_or_else(|| AppError::not_found("login", login))
    }

    async fn create(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.login == user.login) {
            return Err(AppError::conflict("login", user.login.clone()));
        }

        let stored = User {
            uid: Uuid::new_v4(),
            ..user.clone()
        };
        users.insert(stored.uid, stored.clone());
        Ok(stored)
    }

    async fn update_details(&self, uid: Uuid, details: &UserDetails) -> AppResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&uid)
            .ok_or_else(|| AppError::not_found("uid", uid.to_string()))?;

        user.name = details.name.clone();
        user.email = details.email.clone();
        user.website = details.website.clone();
        Ok(user.clone())
    }
}
