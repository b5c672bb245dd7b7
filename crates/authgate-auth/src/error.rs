//! Authentication error types
//!
//! Every failure the core can produce is a distinct variant so callers can
//! log and respond differently. Errors are designed to be:
//! - Informative for logging/debugging
//! - Safe for external exposure (no store internals, credentials or tokens)
//! - Convertible to HTTP status codes

use authgate_db::{AuthProvider, DbError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    // =========================================================================
    // Token Errors
    // =========================================================================
    /// Bad signature, malformed payload or subject
    #[error("Invalid token")]
    TokenInvalid,

    /// Token `exp` has passed
    #[error("Token has expired")]
    TokenExpired,

    /// Token signed with a scheme this codec does not accept
    #[error("Unsupported token")]
    TokenUnsupported,

    /// No bearer token on a request that needs one
    #[error("Authentication required")]
    Unauthenticated,

    // =========================================================================
    // Local Credential Errors
    // =========================================================================
    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Credential mismatch")]
    CredentialMismatch,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Email is already in use")]
    EmailAlreadyExists,

    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    // =========================================================================
    // Provider Identity Errors
    // =========================================================================
    /// Provider did not supply a usable email address
    #[error("Email not found from identity provider")]
    ProviderEmailMissing,

    /// Email already belongs to an account created through another provider
    #[error("Account for this email is linked to {existing}, not {attempted}")]
    ProviderMismatch {
        existing: AuthProvider,
        attempted: AuthProvider,
    },

    /// Username derived from the provider email belongs to another account
    #[error("Username {0} is already taken")]
    UsernameCollision(String),

    #[error("Unknown identity provider: {0}")]
    UnknownProvider(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Identity store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Password hashing failed")]
    PasswordHashingFailed,

    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not be exposed to clients)
    #[error("Internal error")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::WeakPassword(_) | Self::ProviderEmailMissing | Self::UnknownProvider(_) => 400,

            // 401 Unauthorized
            Self::TokenInvalid
            | Self::TokenExpired
            | Self::TokenUnsupported
            | Self::Unauthenticated
            | Self::AccountNotFound
            | Self::CredentialMismatch => 401,

            // 403 Forbidden
            Self::AccountDisabled => 403,

            // 409 Conflict
            Self::UsernameTaken
            | Self::EmailAlreadyExists
            | Self::ProviderMismatch { .. }
            | Self::UsernameCollision(_) => 409,

            // 503 Service Unavailable
            Self::StoreUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::PasswordHashingFailed | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// Get an error code for the client (safe to expose)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenUnsupported => "TOKEN_UNSUPPORTED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            // Not found and mismatch share a code so logins can't probe for accounts
            Self::AccountNotFound | Self::CredentialMismatch => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::ProviderEmailMissing => "PROVIDER_EMAIL_MISSING",
            Self::ProviderMismatch { .. } => "PROVIDER_MISMATCH",
            Self::UsernameCollision(_) => "USERNAME_COLLISION",
            Self::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::PasswordHashingFailed | Self::Config(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Get safe message for client (doesn't leak internal details)
    pub fn client_message(&self) -> String {
        match self {
            Self::AccountNotFound | Self::CredentialMismatch => {
                "Invalid username or password".to_string()
            }
            Self::ProviderMismatch { existing, .. } => format!(
                "Looks like you're signed up with {existing} account. Please use your {existing} account to login."
            ),
            Self::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::PasswordHashingFailed | Self::Config(_) | Self::Internal(_) => {
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Failure of a bridge login, carrying the resolver's reason unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Authentication failed: {reason}")]
pub struct AuthenticationFailed {
    #[source]
    pub reason: AuthError,
}

impl From<AuthError> for AuthenticationFailed {
    fn from(reason: AuthError) -> Self {
        Self { reason }
    }
}

/// Error response for API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub code: String,
    /// Error message (human-readable)
    pub message: String,
}

impl From<&AuthError> for ErrorResponse {
    fn from(error: &AuthError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.client_message(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidAlgorithm => Self::TokenUnsupported,
            _ => Self::TokenInvalid,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
