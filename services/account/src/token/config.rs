//! Token configuration

use anyhow::Result;

/// Longest accepted lifetime for either token kind (one year)
pub const MAX_TOKEN_EXPIRY: u64 = 365 * 24 * 60 * 60;

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// RSA private key (PEM) used to sign access tokens
    pub private_key: String,
    /// RSA public key (PEM) used to verify access tokens
    pub public_key: String,
    /// HMAC secret used to sign and verify refresh tokens
    pub refresh_secret: String,
    /// Access token lifetime in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token lifetime in seconds (default: 3 days)
    pub refresh_token_expiry: u64,
}

impl TokenConfig {
    /// Create a new TokenConfig from environment variables
    ///
    /// # Environment Variables
    /// - `PRIVATE_KEY`: RSA private key (PEM) or path to a PEM file
    /// - `PUBLIC_KEY`: RSA public key (PEM) or path to a PEM file
    /// - `REFRESH_SECRET`: secret for refresh token signatures (required)
    /// - `TOKEN_EXP`: access token expiry in seconds (default: 900)
    /// - `REFRESH_TOKEN_EXP`: refresh token expiry in seconds (default: 259200)
    ///
    /// Both expiries must lie in `1..=MAX_TOKEN_EXPIRY`.
    pub fn from_env() -> Result<Self> {
        let private_key = std::env::var("PRIVATE_KEY")
            .map_err(|_| anyhow::anyhow!("PRIVATE_KEY environment variable not set"))?;
        let private_key = read_pem(&private_key, "private")?;

        let public_key = std::env::var("PUBLIC_KEY")
            .map_err(|_| anyhow::anyhow!("PUBLIC_KEY environment variable not set"))?;
        let public_key = read_pem(&public_key, "public")?;

        let refresh_secret = std::env::var("REFRESH_SECRET")
            .map_err(|_| anyhow::anyhow!("REFRESH_SECRET environment variable not set"))?;
        if refresh_secret.is_empty() {
            anyhow::bail!("REFRESH_SECRET must not be empty");
        }

        let access_token_expiry = std::env::var("TOKEN_EXP")
            .unwrap_or_else(|_| "900".to_string()) // 15 minutes
            .parse()
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("REFRESH_TOKEN_EXP")
            .unwrap_or_else(|_| "259200".to_string()) // 3 days
            .parse()
            .unwrap_or(259200);

        check_expiry("TOKEN_EXP", access_token_expiry)?;
        check_expiry("REFRESH_TOKEN_EXP", refresh_token_expiry)?;

        Ok(TokenConfig {
            private_key,
            public_key,
            refresh_secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

fn check_expiry(var: &str, seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TOKEN_EXPIRY {
        anyhow::bail!(
            "{} must be between 1 and {} seconds, got {}",
            var,
            MAX_TOKEN_EXPIRY,
            seconds
        );
    }
    Ok(())
}

/// Accept either an inline PEM or a path to one
fn read_pem(value: &str, which: &str) -> Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    let contents = std::fs::read_to_string(value)
        .map_err(|e| anyhow::anyhow!("Failed to read {} key file: {}", which, e))?;

    Ok(contents.trim().to_string())
}
