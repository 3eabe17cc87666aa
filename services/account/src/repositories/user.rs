//! PostgreSQL user repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use super::UserLookup;
use crate::{
    error::{AppError, AppResult},
    models::{User, UserDetails},
};

const USER_COLUMNS: &str = "uid, login, password, name, email, website, image_url";

/// User repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserLookup for PgUserRepository {
    async fn find_by_id(&self, uid: Uuid) -> AppResult<User> {
        info!("Finding user by ID: {}", uid);

        let query = format!("SELECT {} FROM users WHERE uid = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Unable to get user with uid: {}: {}", uid, e);
                AppError::Internal
            })?
            .ok_or_else(|| AppError::not_found("uid", uid.to_string()))
    }

    async fn find_by_login(&self, login: &str) -> AppResult<User> {
        info!("Finding user by login: {}", login);

        let query = format!("SELECT {} FROM users WHERE login = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Unable to get user with login: {}: {}", login, e);
                AppError::Internal
            })?
            .ok_or_else(|| AppError::not_found("login", login))
    }

    async fn create(&self, user: &User) -> AppResult<User> {
        info!("Creating new user: {}", user.login);

        let query = format!(
            "INSERT INTO users (login, password) VALUES ($1, $2) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&user.login)
            .bind(&user.password)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    info!("Could not create a user with login: {}: already taken", user.login);
                    AppError::conflict("login", user.login.clone())
                }
                e => {
                    error!("Could not create a user with login: {}: {}", user.login, e);
                    AppError::Internal
                }
            })
    }

    async fn update_details(&self, uid: Uuid, details: &UserDetails) -> AppResult<User> {
        let query = format!(
            "UPDATE users SET name = $2, email = $3, website = $4 WHERE uid = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(uid)
            .bind(&details.name)
            .bind(&details.email)
            .bind(&details.website)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to update details for user: {}: {}", uid, e);
                AppError::Internal
            })?
            .ok_or_else(|| AppError::not_found("uid", uid.to_string()))
    }
}
