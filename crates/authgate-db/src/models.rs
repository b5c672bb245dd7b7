//! Account model - mapped from the `accounts` table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Permission tag every new account starts with
pub const DEFAULT_ROLE: &str = "USER";

// ============================================================================
// Provider Tag
// ============================================================================

/// Identity source that created an account.
///
/// `local` marks password signups; anything else names an external
/// provider registration (`google`, `github`, ...). Tags are compared in
/// their normalized lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthProvider(String);

impl AuthProvider {
    pub const LOCAL_TAG: &'static str = "local";

    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_ascii_lowercase())
    }

    pub fn local() -> Self {
        Self(Self::LOCAL_TAG.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL_TAG
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AuthProvider {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

// ============================================================================
// Account
// ============================================================================

/// Durable identity record, password-based or provider-linked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: Option<String>,
    pub provider: AuthProvider,
    pub provider_subject_id: Option<String>,
    pub avatar_url: Option<String>,
    pub enabled: bool,
    pub roles: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// New enabled account with a fresh id and the default role
    pub fn new(username: impl Into<String>, email: impl Into<String>, provider: AuthProvider) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            credential_hash: None,
            provider,
            provider_subject_id: None,
            avatar_url: None,
            enabled: true,
            roles: BTreeSet::from([DEFAULT_ROLE.to_string()]),
            created_at: now,
            updated_at: now,
        }
    }

    /// Password signup
    pub fn local(
        username: impl Into<String>,
        email: impl Into<String>,
        credential_hash: impl Into<String>,
    ) -> Self {
        let mut account = Self::new(username, email, AuthProvider::local());
        account.credential_hash = Some(credential_hash.into());
        account
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
