//! Authenticated identities

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use uuid::Uuid;

use authgate_db::Account;

/// Attribute bag key under which the issued token is published
pub const TOKEN_ATTRIBUTE: &str = "token";

/// Anything that stands for an authenticated account
pub trait AuthenticatedSubject {
    fn id(&self) -> Uuid;

    fn username(&self) -> &str;

    fn roles(&self) -> &BTreeSet<String>;

    fn enabled(&self) -> bool;

    fn has_role(&self, role: &str) -> bool {
        self.roles().contains(role)
    }
}

impl AuthenticatedSubject for Account {
    fn id(&self) -> Uuid {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Per-request result of a successful login: the account, its provider
/// attributes and the bearer token issued for it. Never persisted.
#[derive(Debug, Clone)]
pub struct Principal {
    account: Account,
    token: String,
    attributes: Map<String, Value>,
}

impl Principal {
    pub fn new(account: Account, token: String, attributes: Map<String, Value>) -> Self {
        Self {
            account,
            token,
            attributes,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_parts(self) -> (Account, String) {
        (self.account, self.token)
    }

    /// `(token, email, name)` for the front-end redirect. `name` falls back
    /// to the username when the provider supplied none.
    pub fn redirect_fields(&self) -> (String, String, String) {
        let name = self
            .attributes
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.account.username.as_str());

        (
            self.token.clone(),
            self.account.email.clone(),
            name.to_string(),
        )
    }
}

impl AuthenticatedSubject for Principal {
    fn id(&self) -> Uuid {
        self.account.id
    }

    fn username(&self) -> &str {
        &self.account.username
    }

    fn roles(&self) -> &BTreeSet<String> {
        &self.account.roles
    }

    fn enabled(&self) -> bool {
        self.account.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_db::{AuthProvider, DEFAULT_ROLE};
    use serde_json::json;

    fn github_account() -> Account {
        Account::new("a", "a@x.com", AuthProvider::new("github"))
    }

    #[test]
    fn test_redirect_fields_use_provider_name() {
        let mut attributes = Map::new();
        attributes.insert("name".to_string(), json!("Ann"));
        let principal = Principal::new(github_account(), "tok".to_string(), attributes);

        assert_eq!(
            principal.redirect_fields(),
            ("tok".to_string(), "a@x.com".to_string(), "Ann".to_string())
        );
    }

    #[test]
    fn test_redirect_name_falls_back_to_username() {
        let mut attributes = Map::new();
        attributes.insert("name".to_string(), Value::Null);
        let principal = Principal::new(github_account(), "tok".to_string(), attributes);

        assert_eq!(principal.redirect_fields().2, "a");
    }

    #[test]
    fn test_subject_view() {
        let account = github_account();
        let id = account.id;
        let principal = Principal::new(account, "tok".to_string(), Map::new());

        assert_eq!(AuthenticatedSubject::id(&principal), id);
        assert_eq!(AuthenticatedSubject::username(&principal), "a");
        assert!(AuthenticatedSubject::has_role(&principal, DEFAULT_ROLE));
        assert!(AuthenticatedSubject::enabled(&principal));

        let (account, token) = principal.into_parts();
        assert_eq!(account.id, id);
        assert_eq!(token, "tok");
    }
}
