//! HTTP surface: password endpoints and the OAuth2 handshake

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
        Request, StatusCode,
    },
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use authgate_auth::{config::PasswordConfig, AuthConfig, AuthService};
use authgate_db::MemoryIdentityStore;
use authgate_server::config::{OAuth2ClientConfig, OAuth2Settings};
use authgate_server::oauth2::ClientRegistration;
use authgate_server::{create_test_router, ApiError, ApiResult, AppState, OAuth2Flow, ProviderClient};

/// Answers with a canned user-info document per authorization code
struct FakeProvider {
    users: HashMap<String, Value>,
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn fetch_user_info(
        &self,
        _registration: &ClientRegistration,
        code: &str,
        _redirect_uri: &str,
    ) -> ApiResult<Value> {
        self.users
            .get(code)
            .cloned()
            .ok_or_else(|| ApiError::Provider(format!("unknown code {}", code)))
    }
}

fn app() -> Router {
    let mut auth_config = AuthConfig::default();
    auth_config.jwt.secret = STANDARD.encode([9u8; 48]);
    auth_config.password = PasswordConfig {
        memory_cost: 4096,
        time_cost: 1,
        ..Default::default()
    };
    let auth = AuthService::new(Arc::new(MemoryIdentityStore::new()), auth_config).unwrap();

    let mut settings = OAuth2Settings::default();
    for provider in ["github", "google"] {
        settings.clients.insert(
            provider.to_string(),
            OAuth2ClientConfig {
                client_id: format!("{}-client", provider),
                client_secret: "shh".to_string(),
                ..Default::default()
            },
        );
    }

    let users = HashMap::from([
        (
            "octocat-code".to_string(),
            json!({ "id": 583231, "login": "octocat", "email": "octocat@example.com",
                    "avatar_url": "https://avatars.example.com/u/583231" }),
        ),
        (
            "alice-github-code".to_string(),
            json!({ "id": 42, "login": "alice", "email": "alice@example.com" }),
        ),
        (
            "no-email-code".to_string(),
            json!({ "id": 7, "login": "ghost", "email": null }),
        ),
    ]);

    let oauth2 = OAuth2Flow::new(
        &settings,
        "http://auth.test",
        Arc::new(FakeProvider { users }),
    )
    .unwrap();

    create_test_router(Arc::new(AppState::new(Arc::new(auth), Arc::new(oauth2), None)))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get_me(router: &Router, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method("GET").uri("/api/auth/me");
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    send(router, request.body(Body::empty()).unwrap()).await
}

/// Status and `Location` of a GET that should redirect
async fn follow(router: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let location = response
        .headers()
        .get(LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    (response.status(), location)
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
    })
}

/// Run the handshake for `provider` up to the callback; returns the front-end redirect
async fn provider_login(router: &Router, provider: &str, code: &str) -> String {
    let (status, location) = follow(router, &format!("/oauth2/authorization/{}", provider)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let state = query_param(&location, "state").unwrap();

    let (status, location) = follow(
        router,
        &format!("/login/oauth2/code/{}?code={}&state={}", provider, code, state),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    location
}

async fn signup(router: &Router, username: &str, email: &str) -> StatusCode {
    post_json(
        router,
        "/api/auth/signup",
        json!({ "username": username, "email": email, "password": "correct horse" }),
    )
    .await
    .0
}

#[tokio::test]
async fn test_signup_signin_and_profile() {
    let router = app();

    let (status, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({ "username": "alice", "email": "alice@example.com", "password": "correct horse" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");

    let (status, body) = post_json(
        &router,
        "/api/auth/signin",
        json!({ "usernameOrEmail": "alice@example.com", "password": "correct horse" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["username"], "alice");
    let expires_in = body["expires_in"].as_i64().unwrap();
    assert!((24 * 3600 - 5..=24 * 3600).contains(&expires_in));
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = get_me(&router, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["provider"], "local");
    assert!(body.get("credential_hash").is_none());
}

#[tokio::test]
async fn test_profile_requires_token() {
    let router = app();

    let (status, body) = get_me(&router, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) = get_me(&router, Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn test_stale_token_does_not_block_signin() {
    let router = app();
    assert_eq!(signup(&router, "bob", "bob@example.com").await, StatusCode::CREATED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/signin")
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, "Bearer expired.or.garbage")
        .body(Body::from(
            json!({ "username": "bob", "password": "correct horse" }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signin_failures_do_not_reveal_accounts() {
    let router = app();
    assert_eq!(signup(&router, "carol", "carol@example.com").await, StatusCode::CREATED);

    let (status, wrong_password) = post_json(
        &router,
        "/api/auth/signin",
        json!({ "username": "carol", "password": "battery staple" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown) = post_json(
        &router,
        "/api/auth/signin",
        json!({ "username": "nobody", "password": "battery staple" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown);
}

#[tokio::test]
async fn test_signup_conflicts_and_validation() {
    let router = app();
    assert_eq!(signup(&router, "dave", "dave@example.com").await, StatusCode::CREATED);

    let (status, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({ "username": "dave", "email": "other@example.com", "password": "correct horse" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USERNAME_TAKEN");

    let (status, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({ "username": "david", "email": "dave@example.com", "password": "correct horse" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "EMAIL_ALREADY_EXISTS");

    let (status, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({ "username": "erin", "email": "not-an-email", "password": "correct horse" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, body) = post_json(
        &router,
        "/api/auth/signup",
        json!({ "username": "erin", "email": "erin@example.com", "password": "short" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WEAK_PASSWORD");
}

#[tokio::test]
async fn test_authorize_redirects_to_provider() {
    let router = app();

    let (status, location) = follow(&router, "/oauth2/authorization/github").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    assert_eq!(query_param(&location, "client_id").unwrap(), "github-client");
    assert_eq!(
        query_param(&location, "redirect_uri").unwrap(),
        "http://auth.test/login/oauth2/code/github"
    );
    assert!(query_param(&location, "state").unwrap().len() >= 43);

    let (status, _) = follow(&router, "/oauth2/authorization/myspace").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_login_redirects_with_token() {
    let router = app();

    let location = provider_login(&router, "github", "octocat-code").await;
    assert!(location.starts_with("http://localhost:3000/oauth2/redirect?"));
    assert_eq!(query_param(&location, "email").unwrap(), "octocat@example.com");
    assert_eq!(query_param(&location, "name").unwrap(), "octocat");

    let token = query_param(&location, "token").unwrap();
    let (status, body) = get_me(&router, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "octocat");
    assert_eq!(body["provider"], "github");
    assert_eq!(body["avatar_url"], "https://avatars.example.com/u/583231");

    // Second login lands on the same account
    let again = provider_login(&router, "github", "octocat-code").await;
    let token = query_param(&again, "token").unwrap();
    let (_, second) = get_me(&router, Some(&token)).await;
    assert_eq!(second["id"], body["id"]);
}

#[tokio::test]
async fn test_provider_login_for_local_email_is_refused() {
    let router = app();
    assert_eq!(signup(&router, "alice", "alice@example.com").await, StatusCode::CREATED);

    let location = provider_login(&router, "github", "alice-github-code").await;
    assert!(location.starts_with("http://localhost:3000/login?"));
    assert_eq!(
        query_param(&location, "error").unwrap(),
        "Looks like you're signed up with local account. Please use your local account to login."
    );
    assert!(query_param(&location, "token").is_none());
}

#[tokio::test]
async fn test_provider_without_email_is_refused() {
    let router = app();

    let location = provider_login(&router, "github", "no-email-code").await;
    assert_eq!(
        query_param(&location, "error").unwrap(),
        "Email not found from identity provider"
    );
}

#[tokio::test]
async fn test_callback_rejects_unknown_or_reused_state() {
    let router = app();

    let (status, location) =
        follow(&router, "/login/oauth2/code/github?code=octocat-code&state=forged").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        query_param(&location, "error").unwrap(),
        "Invalid or expired login attempt"
    );

    let (_, authorize) = follow(&router, "/oauth2/authorization/github").await;
    let state = query_param(&authorize, "state").unwrap();
    let callback = format!("/login/oauth2/code/github?code=octocat-code&state={}", state);

    let (_, first) = follow(&router, &callback).await;
    assert!(query_param(&first, "token").is_some());

    let (_, replay) = follow(&router, &callback).await;
    assert!(query_param(&replay, "token").is_none());
    assert!(query_param(&replay, "error").is_some());
}

#[tokio::test]
async fn test_callback_reports_provider_denial() {
    let router = app();

    let (_, authorize) = follow(&router, "/oauth2/authorization/google").await;
    let state = query_param(&authorize, "state").unwrap();

    let (_, location) = follow(
        &router,
        &format!(
            "/login/oauth2/code/google?error=access_denied&error_description=User%20cancelled&state={}",
            state
        ),
    )
    .await;
    assert_eq!(query_param(&location, "error").unwrap(), "User cancelled");
}

#[tokio::test]
async fn test_callback_hides_provider_failures() {
    let router = app();

    let location = provider_login(&router, "github", "expired-code").await;
    assert_eq!(
        query_param(&location, "error").unwrap(),
        "Identity provider error"
    );
}

#[tokio::test]
async fn test_health_and_readiness() {
    let router = app();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "memory");
}
