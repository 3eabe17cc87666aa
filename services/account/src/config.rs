//! Server configuration

use std::time::Duration;

use anyhow::Result;

use crate::{middleware::timeout::MAX_HANDLER_TIMEOUT, revocation::redis::DEFAULT_SCAN_BATCH};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Prefix every route is nested under
    pub base_url: String,
    /// Budget for a single request before the timeout response is sent
    pub handler_timeout: Duration,
    /// Socket address to listen on
    pub bind_addr: String,
    /// Keys requested per SCAN step when revoking all of a user's tokens
    pub revocation_scan_batch: usize,
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `ACCOUNT_API_URL`: route prefix (default: /api/account)
    /// - `HANDLER_TIMEOUT`: request budget in seconds (default: 5, at most 3600)
    /// - `BIND_ADDR`: listen address (default: 0.0.0.0:8080)
    /// - `REVOCATION_SCAN_BATCH`: SCAN batch size (default: 100)
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("ACCOUNT_API_URL").unwrap_or_else(|_| "/api/account".to_string());
        if !base_url.starts_with('/') {
            anyhow::bail!("ACCOUNT_API_URL must start with '/'");
        }

        let handler_timeout = std::env::var("HANDLER_TIMEOUT")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        if handler_timeout == 0 || handler_timeout > MAX_HANDLER_TIMEOUT.as_secs() {
            anyhow::bail!(
                "HANDLER_TIMEOUT must be between 1 and {} seconds",
                MAX_HANDLER_TIMEOUT.as_secs()
            );
        }

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let revocation_scan_batch = std::env::var("REVOCATION_SCAN_BATCH")
            .unwrap_or_else(|_| DEFAULT_SCAN_BATCH.to_string())
            .parse()
            .unwrap_or(DEFAULT_SCAN_BATCH);

        Ok(ServerConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            handler_timeout: Duration::from_secs(handler_timeout),
            bind_addr,
            revocation_scan_batch,
        })
    }
}
