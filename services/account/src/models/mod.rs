//! Account service models

pub mod token;
pub mod user;

pub use token::{AccessToken, RefreshToken, TokenPair};
pub use user::{User, UserDetails};
