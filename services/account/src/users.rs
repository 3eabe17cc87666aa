//! User service: signup, signin and profile operations

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{User, UserDetails},
    repositories::UserLookup,
};

/// User service over a [`UserLookup`] backend
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserLookup>,
}

impl UserService {
    /// Create a new user service
    pub fn new(users: Arc<dyn UserLookup>) -> Self {
        Self { users }
    }

    /// Fetch a user by id
    pub async fn get_user(&self, uid: Uuid) -> AppResult<User> {
        self.users.find_by_id(uid).await
    }

    /// Register a new user, storing only the password hash
    pub async fn signup(&self, login: &str, password: &str) -> AppResult<User> {
        let password_hash = hash_password(password).map_err(|e| {
            error!("Unable to hash password for login {}: {}", login, e);
            AppError::Internal
        })?;

        let user = User {
            login: login.to_string(),
            password: password_hash,
            ..Default::default()
        };

        let created = self.users.create(&user).await?;
        info!("Signed up user {} ({})", created.login, created.uid);
        Ok(created)
    }

    /// Authenticate a user by login and password
    ///
    /// An unknown login and a wrong password produce the same error.
    pub async fn signin(&self, login: &str, password: &str) -> AppResult<User> {
        let user = match self.users.find_by_login(login).await {
            Ok(user) => user,
            Err(AppError::NotFound { .. }) => {
                return Err(AppError::Authorization(
                    "Invalid login and password combination".to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        let matches = verify_password(&user.password, password).map_err(|e| {
            error!("Unable to verify password for login {}: {}", login, e);
            AppError::Internal
        })?;

        if !matches {
            return Err(AppError::Authorization(
                "Invalid login and password combination".to_string(),
            ));
        }

        Ok(user)
    }

    /// Update the profile fields of `uid`
    pub async fn update_details(&self, uid: Uuid, details: &UserDetails) -> AppResult<User> {
        self.users.update_details(uid, details).await
    }
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(stored_hash: &str, supplied: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(stored_hash)?;
    Ok(Argon2::default()
        .verify_password(supplied.as_bytes(), &parsed_hash)
        .is_ok())
}
