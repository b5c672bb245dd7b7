//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use authgate_auth::{AuthError, AuthenticationFailed, ErrorResponse};

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Identity provider answered with an error or an unusable payload
    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl ApiError {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(err) => {
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show to a browser user
    pub fn client_message(&self) -> String {
        match self {
            Self::Auth(err) => err.client_message(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Provider(_) => "Identity provider error".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(err) => err.error_code(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

impl From<AuthenticationFailed> for ApiError {
    fn from(failed: AuthenticationFailed) -> Self {
        Self::Auth(failed.reason)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}
