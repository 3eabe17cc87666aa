//! Access/refresh token subsystem

pub mod codec;
pub mod config;
pub mod service;

pub use codec::TokenError;
pub use config::TokenConfig;
pub use service::{TokenLifecycle, TokenService};
