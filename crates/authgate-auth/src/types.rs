//! Request and response types shared with the web layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use authgate_db::{Account, AuthProvider};

use crate::principal::Principal;

// =============================================================================
// Requests
// =============================================================================

/// Password login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigninRequest {
    /// Username or email
    #[serde(alias = "usernameOrEmail", alias = "username_or_email")]
    pub username: String,
    pub password: String,
}

/// Password signup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Shape checks done before touching the store
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("Username must not be blank".to_string());
        }
        if self.username.trim().len() > 50 {
            return Err("Username must be at most 50 characters".to_string());
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err("Email must be a valid address".to_string()),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Bearer token issued by a login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl TokenResponse {
    pub fn new(principal: &Principal, expires_in: i64) -> Self {
        let account = principal.account();
        Self {
            access_token: principal.token().to_string(),
            token_type: "Bearer".to_string(),
            expires_in,
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
        }
    }
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub provider: AuthProvider,
    pub avatar_url: Option<String>,
    pub roles: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            provider: account.provider.clone(),
            avatar_url: account.avatar_url.clone(),
            roles: account.roles.clone(),
            created_at: account.created_at,
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
