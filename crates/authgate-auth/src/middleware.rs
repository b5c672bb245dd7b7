//! Bearer authentication for Axum
//!
//! [`BearerAuthLayer`] resolves an `Authorization: Bearer` header to an
//! [`Account`] and stores it in the request extensions. Requests without a
//! bearer token pass through untouched; handlers decide whether
//! authentication is required by using [`RequireAuth`] or [`OptionalUser`].

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use authgate_db::Account;

use crate::bridge::AuthSessionBridge;
use crate::error::{AuthError, ErrorResponse};

/// Bearer authentication layer
#[derive(Clone)]
pub struct BearerAuthLayer {
    bridge: Arc<AuthSessionBridge>,
}

impl BearerAuthLayer {
    pub fn new(bridge: Arc<AuthSessionBridge>) -> Self {
        Self { bridge }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthMiddleware {
            inner,
            bridge: self.bridge.clone(),
        }
    }
}

/// Bearer authentication middleware service
#[derive(Clone)]
pub struct BearerAuthMiddleware<S> {
    inner: S,
    bridge: Arc<AuthSessionBridge>,
}

impl<S> Service<Request> for BearerAuthMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let bridge = self.bridge.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let token = match extract_bearer_token(req.headers()) {
                Ok(Some(token)) => token,
                // No credentials - the handler decides if auth is required
                Ok(None) => return inner.call(req).await,
                Err(e) => return Ok(auth_error_response(e)),
            };

            match bridge.authenticate_bearer(&token).await {
                Ok(account) => {
                    let (mut parts, body) = req.into_parts();
                    parts.extensions.insert(account);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(e) => {
                    debug!(error_code = e.error_code(), "Bearer token rejected");
                    Ok(auth_error_response(e))
                }
            }
        })
    }
}

/// Token from an `Authorization: Bearer` header, if any
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::TokenInvalid)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(AuthError::TokenInvalid),
        // Other schemes are not ours to judge
        None => Ok(None),
    }
}

/// Create error response for authentication errors
pub fn auth_error_response(error: AuthError) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = ErrorResponse::from(&error);

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&response).unwrap_or_default()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

// =============================================================================
// Axum Extractors
// =============================================================================

/// Extractor for the authenticated account (optional)
pub struct OptionalUser(pub Option<Account>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(parts.extensions.get::<Account>().cloned()))
    }
}

/// Extractor for the authenticated account
/// Returns 401 if not authenticated
pub struct RequireAuth(pub Account);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Account>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| auth_error_response(AuthError::Unauthenticated))
    }
}
