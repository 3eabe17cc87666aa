//! Account service
//!
//! Signup, signin and session management for user accounts. Sessions are
//! pairs of signed tokens: a short-lived RSA-signed access token carrying the
//! user, and a long-lived HMAC-signed refresh token whose liveness is recorded
//! in a revocation store. Every request runs under a timeout guard that
//! answers exactly once, even if the handler stalls or panics.

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod revocation;
pub mod routes;
pub mod token;
pub mod users;
pub mod validation;

pub use routes::{AppState, create_router};
