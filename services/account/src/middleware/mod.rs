//! HTTP middleware

pub mod auth;
pub mod timeout;

pub use auth::{AuthUser, auth_middleware};
pub use timeout::{TimeoutConfig, timeout_middleware};
