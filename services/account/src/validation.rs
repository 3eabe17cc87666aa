//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::{error::AppError, models::UserDetails};

/// Validate login
pub fn validate_login(login: &str) -> Result<(), String> {
    if login.is_empty() {
        return Err("Login is required".to_string());
    }

    if login.len() < 3 {
        return Err("Login must be at least 3 characters long".to_string());
    }

    if login.len() > 32 {
        return Err("Login must be at most 32 characters long".to_string());
    }

    static LOGIN_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = LOGIN_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.@-]+$").expect("Failed to compile login regex"));

    if !regex.is_match(login) {
        return Err(
            "Login can only contain letters, numbers, and the characters _ . @ -".to_string(),
        );
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let length = password.chars().count();
    if length < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    if length > 30 {
        return Err("Password must be at most 30 characters long".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate website URL
pub fn validate_website(website: &str) -> Result<(), String> {
    static WEBSITE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = WEBSITE_REGEX.get_or_init(|| {
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("Failed to compile website regex")
    });

    if !regex.is_match(website) {
        return Err("Website must be a valid http(s) URL".to_string());
    }

    Ok(())
}

/// Validate name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.chars().count() > 50 {
        return Err("Name must be at most 50 characters long".to_string());
    }

    Ok(())
}

/// Validate signup/signin credentials
pub fn validate_credentials(login: &str, password: &str) -> Result<(), AppError> {
    validate_login(login).map_err(AppError::BadRequest)?;
    validate_password(password).map_err(AppError::BadRequest)?;
    Ok(())
}

/// Validate the optional profile fields of a details update
pub fn validate_details(details: &UserDetails) -> Result<(), AppError> {
    if let Some(name) = &details.name {
        validate_name(name).map_err(AppError::BadRequest)?;
    }
    if let Some(email) = &details.email {
        validate_email(email).map_err(AppError::BadRequest)?;
    }
    if let Some(website) = &details.website {
        validate_website(website).map_err(AppError::BadRequest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_login() {
        assert!(validate_login("alice").is_ok());
        assert!(validate_login("alice.smith@corp-1").is_ok());
        assert!(validate_login("").is_err());
        assert!(validate_login("ab").is_err());
        assert!(validate_login(&"a".repeat(33)).is_err());
        assert!(validate_login("alice smith").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(31)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn test_validate_website() {
        assert!(validate_website("https://example.com/about").is_ok());
        assert!(validate_website("http://example.com").is_ok());
        assert!(validate_website("ftp://example.com").is_err());
        assert!(validate_website("example.com").is_err());
    }

    #[test]
    fn test_validate_details() {
        let ok = UserDetails {
            name: Some("Alice".to_string()),
            email: Some("alice@example.com".to_string()),
            website: None,
        };
        assert!(validate_details(&ok).is_ok());
        assert!(validate_details(&UserDetails::default()).is_ok());

        let long_name = UserDetails {
            name: Some("n".repeat(51)),
            ..Default::default()
        };
        assert!(matches!(
            validate_details(&long_name),
            Err(AppError::BadRequest(_))
        ));
    }
}
