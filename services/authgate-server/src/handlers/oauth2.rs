//! OAuth2 Login Handlers
//!
//! The callback never answers with an error body: whatever happens, the
//! browser is sent back to the front end, with a token on success or an
//! `error` query parameter otherwise.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use std::sync::Arc;

use authgate_auth::Principal;
use authgate_db::AuthProvider;

use super::record_login;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query string of the provider callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET /oauth2/authorization/:provider`
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> ApiResult<Redirect> {
    let url = state.oauth2.begin(&AuthProvider::new(provider))?;
    Ok(Redirect::to(&url))
}

/// `GET /login/oauth2/code/:provider`
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let provider = AuthProvider::new(provider);

    match complete_login(&state, &provider, params).await {
        Ok(principal) => {
            record_login("oauth2", "success");
            Redirect::to(&state.oauth2.success_redirect(&principal))
        }
        Err(err) => {
            record_login("oauth2", "failure");
            tracing::warn!(%provider, error = %err, "OAuth2 login failed");
            Redirect::to(&state.oauth2.failure_redirect(&err.client_message()))
        }
    }
}

async fn complete_login(
    state: &AppState,
    provider: &AuthProvider,
    params: CallbackParams,
) -> ApiResult<Principal> {
    let handshake = params
        .state
        .ok_or_else(|| ApiError::BadRequest("Missing state parameter".to_string()))?;
    state.oauth2.take_state(provider, &handshake)?;

    if let Some(error) = params.error {
        return Err(ApiError::BadRequest(
            params.error_description.unwrap_or(error),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("Missing authorization code".to_string()))?;

    let (subject_id, attributes) = state.oauth2.fetch_identity(provider, &code).await?;

    Ok(state
        .auth
        .bridge()
        .login_provider(provider, &subject_id, &attributes)
        .await?)
}
