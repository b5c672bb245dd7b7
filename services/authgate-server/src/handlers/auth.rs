//! Password Authentication Handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;

use authgate_auth::{
    AccountProfile, MessageResponse, RequireAuth, SigninRequest, SignupRequest, TokenResponse,
};

use super::record_login;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /api/auth/signin`
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SigninRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let principal = match state
        .auth
        .bridge()
        .login_local(&request.username, &request.password)
        .await
    {
        Ok(principal) => principal,
        Err(failed) => {
            record_login("local", "failure");
            return Err(failed.into());
        }
    };

    record_login("local", "success");
    let expires_at = state.auth.codec().expires_at(principal.token())?;
    let expires_in = (expires_at - Utc::now()).num_seconds().max(0);

    Ok(Json(TokenResponse::new(&principal, expires_in)))
}

/// `POST /api/auth/signup`
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    request.validate().map_err(ApiError::BadRequest)?;

    let account = state
        .auth
        .resolver()
        .register_local(&request.username, &request.email, &request.password)
        .await?;

    tracing::info!(account_id = %account.id, username = %account.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// `GET /api/auth/me`
pub async fn me(RequireAuth(account): RequireAuth) -> Json<AccountProfile> {
    Json(AccountProfile::from(&account))
}
