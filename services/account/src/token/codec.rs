//! Signing and verification of access and refresh tokens
//!
//! Access tokens are RS256 JWTs carrying a snapshot of the user, so any
//! service holding the public key can authenticate a caller. Refresh tokens
//! are HS256 JWTs carrying only the user id and a random token id; they are
//! only ever verified by this service.
//!
//! Every function here is stateless. Verification uses zero leeway and treats
//! a token whose `exp` equals the current second as expired.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::User;

/// Errors raised while signing or verifying tokens
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's expiry is not in the future
    #[error("token expired")]
    Expired,

    /// The signature does not match the key
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The token could not be decoded into the expected claims
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The refresh token identifier is not a UUID
    #[error("token identifier is not a valid UUID: {0}")]
    InvalidIdentifier(String),

    /// The lifetime does not fit in the `exp` claim
    #[error("token lifetime of {0} seconds is out of range")]
    InvalidLifetime(u64),

    /// Encoding the token failed
    #[error("failed to sign token: {0}")]
    Signing(#[source] JwtError),

    /// A key could not be parsed
    #[error("invalid key material: {0}")]
    Key(#[source] JwtError),
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user: User,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub uid: Uuid,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed refresh token
#[derive(Debug, Clone)]
pub struct SignedRefreshToken {
    pub token: String,
    pub id: Uuid,
    /// Lifetime from issuance to `exp`
    pub expires_in: Duration,
}

/// Identity extracted from a verified refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshClaimsView {
    pub user_id: Uuid,
    pub token_id: Uuid,
}

fn validation(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation
}

/// `exp` claim for a token issued at `now` that lives `ttl_seconds`
fn expires_at(now: i64, ttl_seconds: u64) -> Result<i64, TokenError> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or(TokenError::InvalidLifetime(ttl_seconds))
}

fn ensure_not_expired(exp: i64) -> Result<(), TokenError> {
    if exp <= Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Parse the RSA key pair used for access tokens
pub fn rsa_keys(private_pem: &str, public_pem: &str) -> Result<(EncodingKey, DecodingKey), TokenError> {
    let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(TokenError::Key)?;
    let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(TokenError::Key)?;
    Ok((encoding, decoding))
}

/// Sign an access token embedding `user` (without its password)
pub fn sign_access_token(
    user: &User,
    key: &EncodingKey,
    ttl_seconds: u64,
) -> Result<String, TokenError> {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        user: user.without_password(),
        iat: now,
        exp: expires_at(now, ttl_seconds)?,
    };

    encode(&Header::new(Algorithm::RS256), &claims, key).map_err(TokenError::Signing)
}

/// Verify an access token and return the embedded user snapshot
pub fn verify_access_token(token: &str, key: &DecodingKey) -> Result<User, TokenError> {
    let data = decode::<AccessClaims>(token, key, &validation(Algorithm::RS256))?;
    ensure_not_expired(data.claims.exp)?;
    Ok(data.claims.user)
}

/// Sign a refresh token for `user_id` under a fresh random identifier
pub fn sign_refresh_token(
    user_id: Uuid,
    secret: &[u8],
    ttl_seconds: u64,
) -> Result<SignedRefreshToken, TokenError> {
    let now = Utc::now().timestamp();
    let id = Uuid::new_v4();
    let claims = RefreshClaims {
        uid: user_id,
        jti: id.to_string(),
        iat: now,
        exp: expires_at(now, ttl_seconds)?,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(TokenError::Signing)?;

    Ok(SignedRefreshToken {
        token,
        id,
        expires_in: Duration::from_secs(ttl_seconds),
    })
}

/// Verify a refresh token and return its user and token identifiers
pub fn verify_refresh_token(token: &str, secret: &[u8]) -> Result<RefreshClaimsView, TokenError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation(Algorithm::HS256),
    )?;
    ensure_not_expired(data.claims.exp)?;

    let token_id = Uuid::parse_str(&data.claims.jti)
        .map_err(|_| TokenError::InvalidIdentifier(data.claims.jti.clone()))?;

    Ok(RefreshClaimsView {
        user_id: data.claims.uid,
        token_id,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PRIVATE_PEM: &str = include_str!("../../rsa/rsa_private_test.pem");
    pub(crate) const PUBLIC_PEM: &str = include_str!("../../rsa/rsa_public_test.pem");
    const SECRET: &[u8] = b"verysecretsecret";

    fn alice() -> User {
        User {
            uid: Uuid::new_v4(),
            login: "alice".to_string(),
            password: "$argon2id$hash".to_string(),
            name: Some("Alice".to_string()),
            email: Some("alice@example.com".to_string()),
            website: Some("https://alice.dev".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn test_access_token_round_trip_strips_password() {
        let (encoding, decoding) = rsa_keys(PRIVATE_PEM, PUBLIC_PEM).unwrap();
        let user = alice();

        let token = sign_access_token(&user, &encoding, 900).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let snapshot = verify_access_token(&token, &decoding).unwrap();
        assert_eq!(snapshot.uid, user.uid);
        assert_eq!(snapshot.login, user.login);
        assert_eq!(snapshot.email, user.email);
        assert_eq!(snapshot.website, user.website);
        assert!(snapshot.password.is_empty());
    }

    #[test]
    fn test_access_token_expiring_now_is_rejected() {
        let (encoding, decoding) = rsa_keys(PRIVATE_PEM, PUBLIC_PEM).unwrap();
        let token = sign_access_token(&alice(), &encoding, 0).unwrap();

        let err = verify_access_token(&token, &decoding).unwrap_err();
        assert!(matches!(err, TokenError::Expired), "got {err:?}");
    }

    #[test]
    fn test_access_token_rejects_tampering() {
        let (encoding, decoding) = rsa_keys(PRIVATE_PEM, PUBLIC_PEM).unwrap();
        let token = sign_access_token(&alice(), &encoding, 900).unwrap();

        let other = sign_access_token(&alice(), &encoding, 900).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        parts[1] = other_parts[1];
        let forged = parts.join(".");

        let err = verify_access_token(&forged, &decoding).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature), "got {err:?}");

        let err = verify_access_token("not-a-token", &decoding).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)), "got {err:?}");
    }

    #[test]
    fn test_access_token_is_not_accepted_as_refresh_token() {
        let (encoding, _) = rsa_keys(PRIVATE_PEM, PUBLIC_PEM).unwrap();
        let token = sign_access_token(&alice(), &encoding, 900).unwrap();

        assert!(verify_refresh_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let user_id = Uuid::new_v4();
        let signed = sign_refresh_token(user_id, SECRET, 3600).unwrap();
        assert_eq!(signed.expires_in, Duration::from_secs(3600));

        let view = verify_refresh_token(&signed.token, SECRET).unwrap();
        assert_eq!(view.user_id, user_id);
        assert_eq!(view.token_id, signed.id);
    }

    #[test]
    fn test_refresh_tokens_get_fresh_identifiers() {
        let user_id = Uuid::new_v4();
        let first = sign_refresh_token(user_id, SECRET, 3600).unwrap();
        let second = sign_refresh_token(user_id, SECRET, 3600).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_refresh_token_failures() {
        let signed = sign_refresh_token(Uuid::new_v4(), SECRET, 3600).unwrap();
        let err = verify_refresh_token(&signed.token, b"another-secret").unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature), "got {err:?}");

        let expired = sign_refresh_token(Uuid::new_v4(), SECRET, 0).unwrap();
        let err = verify_refresh_token(&expired.token, SECRET).unwrap_err();
        assert!(matches!(err, TokenError::Expired), "got {err:?}");
    }

    #[test]
    fn test_out_of_range_lifetime_is_rejected() {
        let (encoding, _) = rsa_keys(PRIVATE_PEM, PUBLIC_PEM).unwrap();

        let err = sign_access_token(&alice(), &encoding, u64::MAX).unwrap_err();
        assert!(
            matches!(err, TokenError::InvalidLifetime(ttl) if ttl == u64::MAX),
            "got {err:?}"
        );

        let err = sign_refresh_token(Uuid::new_v4(), SECRET, u64::MAX).unwrap_err();
        assert!(matches!(err, TokenError::InvalidLifetime(_)), "got {err:?}");

        let err = sign_refresh_token(Uuid::new_v4(), SECRET, i64::MAX as u64).unwrap_err();
        assert!(matches!(err, TokenError::InvalidLifetime(_)), "got {err:?}");
    }

    #[test]
    fn test_refresh_token_with_bad_identifier() {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            uid: Uuid::new_v4(),
            jti: "a_previous_tokenID".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = verify_refresh_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, TokenError::InvalidIdentifier(_)), "got {err:?}");
    }
}
