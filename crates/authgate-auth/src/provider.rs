//! Identity provider attributes
//!
//! Each provider returns user info in its own shape. [`ProviderAttributes`]
//! is the normalized view the resolver works with; the raw payload is kept
//! as the principal's attribute bag.

use serde_json::{Map, Value};

use authgate_db::AuthProvider;

use crate::error::{AuthError, AuthResult};

/// Normalized attributes of an externally verified identity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderAttributes {
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Provider payload as received
    pub raw: Map<String, Value>,
}

impl ProviderAttributes {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    /// Map a provider user-info document to `(subject_id, attributes)`
    pub fn from_user_info(provider: &AuthProvider, info: &Value) -> AuthResult<(String, Self)> {
        let raw = info.as_object().cloned().unwrap_or_default();

        let (subject, email, name, avatar_url) = match provider.as_str() {
            "google" => (
                string_field(info, "sub"),
                string_field(info, "email"),
                string_field(info, "name"),
                string_field(info, "picture"),
            ),
            "github" => (
                string_field(info, "id"),
                string_field(info, "email"),
                string_field(info, "name").or_else(|| string_field(info, "login")),
                string_field(info, "avatar_url"),
            ),
            "facebook" => (
                string_field(info, "id"),
                string_field(info, "email"),
                string_field(info, "name"),
                info.pointer("/picture/data/url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            other => return Err(AuthError::UnknownProvider(other.to_string())),
        };

        let subject = subject.ok_or_else(|| {
            AuthError::Internal(format!("{} user info carries no subject id", provider))
        })?;

        Ok((
            subject,
            Self {
                email,
                name,
                avatar_url,
                raw,
            },
        ))
    }

    /// Attribute bag handed to the principal: the raw payload with the
    /// normalized fields laid over it
    pub fn to_bag(&self) -> Map<String, Value> {
        let mut bag = self.raw.clone();
        for (key, value) in [
            ("email", &self.email),
            ("name", &self.name),
            ("avatar_url", &self.avatar_url),
        ] {
            if let Some(value) = value {
                bag.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        bag
    }
}

/// Non-empty string field; numeric ids (GitHub, Facebook) are stringified
fn string_field(info: &Value, key: &str) -> Option<String> {
    match info.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
