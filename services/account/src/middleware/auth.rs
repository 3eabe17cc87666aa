//! Bearer-token authentication for protected routes

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::{debug, error};

use crate::{
    error::{AppError, AppResult},
    models::User,
    routes::AppState,
};

/// The user an authenticated request was made by
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Require `Authorization: Bearer <access token>` and attach the caller
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| {
            debug!("Missing or malformed Authorization header");
            AppError::Authentication(
                "Must provide Authorization header with format `Bearer {token}`".to_string(),
            )
        })?;

    let user = state.tokens.validate_access_token(bearer.token())?;

    req.extensions_mut().insert(AuthUser(user));

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only reachable on a route without the auth layer
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            error!("AuthUser requested on a route without authentication");
            AppError::Internal
        })
    }
}
