//! Account service routes

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::ServerConfig,
    context::RequestContext,
    error::{AppError, AppResult},
    middleware::{AuthUser, TimeoutConfig, auth_middleware, timeout_middleware},
    models::UserDetails,
    token::TokenLifecycle,
    users::UserService,
    validation::{validate_credentials, validate_details},
};

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub tokens: Arc<dyn TokenLifecycle>,
}

/// Request for signup and signin
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub login: String,
    pub password: String,
}

/// Request for token rotation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensRequest {
    pub refresh_token: String,
}

/// Create the router for the account service
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/signout", post(signout))
        .route("/details", put(update_details))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/tokens", post(tokens))
        .merge(protected)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(
            TimeoutConfig::new(config.handler_timeout),
            timeout_middleware,
        ));

    let router = if config.base_url.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&config.base_url, api)
    };

    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found("path", uri.path())
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}

fn bind<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "account-service"
    }))
}

/// Register a new user and issue their first token pair
async fn signup(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = bind(payload)?;
    validate_credentials(&request.login, &request.password)?;

    let user = state.users.signup(&request.login, &request.password).await?;
    let tokens = state.tokens.issue_pair(&ctx, &user, None).await?;

    Ok((StatusCode::CREATED, Json(json!({ "tokens": tokens }))))
}

/// Authenticate a user and issue a token pair
async fn signin(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = bind(payload)?;
    validate_credentials(&request.login, &request.password)?;

    let user = state.users.signin(&request.login, &request.password).await?;
    let tokens = state.tokens.issue_pair(&ctx, &user, None).await?;

    info!("User {} signed in", user.uid);
    Ok(Json(json!({ "tokens": tokens })))
}

/// Exchange a refresh token for a new pair, revoking the presented one
async fn tokens(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<TokensRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = bind(payload)?;

    let refresh_token = state
        .tokens
        .validate_refresh_token(&ctx, &request.refresh_token)
        .await?;
    let user = state.users.get_user(refresh_token.user_id).await?;
    let tokens = state
        .tokens
        .issue_pair(&ctx, &user, Some(refresh_token.id))
        .await?;

    Ok(Json(json!({ "tokens": tokens })))
}

/// Current user's profile
async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<impl IntoResponse> {
    let user = state.users.get_user(user.uid).await?;
    Ok(Json(json!({ "user": user })))
}

/// Revoke every refresh token of the current user
async fn signout(
    State(state): State<AppState>,
    ctx: RequestContext,
    AuthUser(user): AuthUser,
) -> AppResult<impl IntoResponse> {
    state.tokens.signout(&ctx, user.uid).await?;
    Ok(Json(json!({ "message": "user signed out successfully!" })))
}

/// Update the current user's profile fields
async fn update_details(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<UserDetails>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let details = bind(payload)?;
    validate_details(&details)?;

    let user = state.users.update_details(user.uid, &details).await?;
    Ok(Json(json!({ "user": user })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repositories::MemoryUserRepository,
        revocation::MemoryRevocationStore,
        token::{
            TokenConfig, TokenService,
            codec::tests::{PRIVATE_PEM, PUBLIC_PEM},
        },
    };
    use axum::{
        body::Body,
        http::{Request, header},
        response::Response,
    };
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        store: MemoryRevocationStore,
    }

    fn test_app() -> TestApp {
        let store = MemoryRevocationStore::new();
        let tokens = TokenService::new(
            TokenConfig {
                private_key: PRIVATE_PEM.to_string(),
                public_key: PUBLIC_PEM.to_string(),
                refresh_secret: "test-refresh-secret".to_string(),
                access_token_expiry: 900,
                refresh_token_expiry: 3600,
            },
            Arc::new(store.clone()),
        )
        .unwrap();

        let state = AppState {
            users: UserService::new(Arc::new(MemoryUserRepository::new())),
            tokens: Arc::new(tokens),
        };
        let config = ServerConfig {
            base_url: "/api/account".to_string(),
            handler_timeout: Duration::from_secs(5),
            bind_addr: "127.0.0.1:0".to_string(),
            revocation_scan_batch: 10,
        };

        TestApp {
            router: create_router(state, &config),
            store,
        }
    }

    async fn send(
        app: &TestApp,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/api/account{}", path));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response: Response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn signup_alice(app: &TestApp) -> (String, String) {
        let (status, body) = send(
            app,
            "POST",
            "/signup",
            None,
            Some(json!({"login": "alice", "password": "alicepassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        (
            body["tokens"]["accessToken"].as_str().unwrap().to_string(),
            body["tokens"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_unrouted_requests_get_json_errors() {
        let app = test_app();

        let (status, body) = send(&app, "DELETE", "/health", None, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"]["type"], "METHOD_NOT_ALLOWED");

        let (status, body) = send(&app, "GET", "/nowhere", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "NOT_FOUND");

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/elsewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_signup_then_me() {
        let app = test_app();
        let (access, _) = signup_alice(&app).await;

        let (status, body) = send(&app, "GET", "/me", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["login"], "alice");
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_signup_duplicate_login_conflicts() {
        let app = test_app();
        signup_alice(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({"login": "alice", "password": "otherpassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["type"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_invalid_payloads_are_bad_requests() {
        let app = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({"login": "al", "password": "alicepassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "BAD_REQUEST");

        let (status, _) = send(&app, "POST", "/signin", None, Some(json!({"login": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signin_rejects_wrong_password() {
        let app = test_app();
        signup_alice(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            "/signin",
            None,
            Some(json!({"login": "alice", "password": "alicepassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/signin",
            None,
            Some(json!({"login": "alice", "password": "wrongpassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "AUTHORIZATION");
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer_token() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "AUTHENTICATION");

        let (status, body) = send(&app, "GET", "/me", Some("not.a.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "AUTHORIZATION");
    }

    #[tokio::test]
    async fn test_token_rotation_revokes_presented_token() {
        let app = test_app();
        let (_, refresh) = signup_alice(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/tokens",
            None,
            Some(json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rotated = body["tokens"]["refreshToken"].as_str().unwrap().to_string();
        assert_ne!(rotated, refresh);

        let (status, _) = send(
            &app,
            "POST",
            "/tokens",
            None,
            Some(json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            "POST",
            "/tokens",
            None,
            Some(json!({"refreshToken": rotated})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signout_revokes_all_refresh_tokens() {
        let app = test_app();
        let (access, refresh) = signup_alice(&app).await;
        send(
            &app,
            "POST",
            "/signin",
            None,
            Some(json!({"login": "alice", "password": "alicepassword"})),
        )
        .await;

        let (status, body) = send(&app, "POST", "/signout", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "user signed out successfully!");

        let (status, _) = send(
            &app,
            "POST",
            "/tokens",
            None,
            Some(json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "POST", "/signout", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_details() {
        let app = test_app();
        let (access, _) = signup_alice(&app).await;

        let (status, body) = send(
            &app,
            "PUT",
            "/details",
            Some(&access),
            Some(json!({"name": "Alice", "email": "alice@example.com", "website": "https://alice.dev"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Alice");
        assert_eq!(body["user"]["website"], "https://alice.dev");

        let (status, _) = send(
            &app,
            "PUT",
            "/details",
            Some(&access),
            Some(json!({"email": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_write_failure_is_internal() {
        let app = test_app();
        app.store.fail_writes(true).await;

        let (status, body) = send(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({"login": "alice", "password": "alicepassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }
}
