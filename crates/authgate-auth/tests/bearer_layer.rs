//! Bearer middleware and extractors on a bare router

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use authgate_auth::{
    config::PasswordConfig, AuthConfig, AuthService, OptionalUser, ProviderAttributes, RequireAuth,
};
use authgate_db::{AuthProvider, IdentityStore, MemoryIdentityStore};

fn test_service() -> (AuthService, Arc<MemoryIdentityStore>) {
    let store = Arc::new(MemoryIdentityStore::new());
    let mut config = AuthConfig::default();
    config.jwt.secret = STANDARD.encode([5u8; 48]);
    config.password = PasswordConfig {
        memory_cost: 4096,
        time_cost: 1,
        ..Default::default()
    };
    (AuthService::new(store.clone(), config).unwrap(), store)
}

fn router(service: &AuthService) -> Router {
    Router::new()
        .route(
            "/me",
            get(|RequireAuth(account): RequireAuth| async move {
                Json(json!({ "username": account.username }))
            }),
        )
        .route(
            "/maybe",
            get(|OptionalUser(account): OptionalUser| async move {
                Json(json!({ "signed_in": account.is_some() }))
            }),
        )
        .layer(service.layer())
}

async fn get_json(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!(null));

    (status, json)
}

async fn provider_token(service: &AuthService) -> String {
    let principal = service
        .bridge()
        .login_provider(
            &AuthProvider::new("github"),
            "123",
            &ProviderAttributes::new("octo@example.com"),
        )
        .await
        .unwrap();
    principal.token().to_string()
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let (service, _) = test_service();
    let token = provider_token(&service).await;
    let router = router(&service);

    let (status, body) = get_json(&router, "/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "octo");
}

#[tokio::test]
async fn test_missing_token_rejected_only_where_required() {
    let (service, _) = test_service();
    let router = router(&service);

    let (status, body) = get_json(&router, "/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) = get_json(&router, "/maybe", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signed_in"], false);
}

#[tokio::test]
async fn test_bad_tokens_rejected() {
    let (service, _) = test_service();
    let router = router(&service);

    let (status, body) = get_json(&router, "/maybe", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");

    let stale = service
        .codec()
        .issue(uuid::Uuid::new_v4(), Utc::now() - Duration::days(30))
        .unwrap();
    let (status, body) = get_json(&router, "/me", Some(&stale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_disabled_account_token_forbidden() {
    let (service, store) = test_service();
    let token = provider_token(&service).await;

    let mut account = store.find_by_email("octo@example.com").await.unwrap().unwrap();
    account.enabled = false;
    store.save(&account).await.unwrap();

    let (status, body) = get_json(&router(&service), "/me", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCOUNT_DISABLED");
}
