//! Identity resolution
//!
//! Decides whether a login attempt maps to an account:
//!
//! - local credentials are checked against the stored hash
//! - a provider identity is linked to the account with the same email,
//!   provided that account was created by the same provider; otherwise a
//!   new account is created
//!
//! An email already owned by another provider is always rejected. Accounts
//! are never merged or re-linked.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use authgate_db::{Account, AuthProvider, DbError, IdentityStore, UniqueKey};

use crate::config::ProviderConfig;
use crate::error::{AuthError, AuthResult};
use crate::password::CredentialVerifier;
use crate::provider::ProviderAttributes;

/// Links logins to accounts in an [`IdentityStore`]
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    verifier: CredentialVerifier,
    providers: ProviderConfig,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        verifier: CredentialVerifier,
        providers: ProviderConfig,
    ) -> Self {
        Self {
            store,
            verifier,
            providers,
        }
    }

    /// Password login by username or email
    pub async fn authenticate_local(&self, login: &str, plaintext: &str) -> AuthResult<Account> {
        let login = login.trim();

        let account = match self.store.find_by_username(login).await? {
            Some(account) => account,
            None => self
                .store
                .find_by_email(&normalize_email(login))
                .await?
                .ok_or(AuthError::AccountNotFound)?,
        };

        if !account.enabled {
            debug!(account_id = %account.id, "Login rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        let matched = account
            .credential_hash
            .as_deref()
            .map(|hash| self.verifier.matches(plaintext, hash))
            .unwrap_or(false);

        if !matched {
            debug!(account_id = %account.id, "Login rejected: credential mismatch");
            return Err(AuthError::CredentialMismatch);
        }

        Ok(account)
    }

    /// Resolve an identity already verified by `provider` to an account
    pub async fn resolve_provider(
        &self,
        provider: &AuthProvider,
        subject_id: &str,
        attributes: &ProviderAttributes,
    ) -> AuthResult<Account> {
        if !self.providers.is_recognized(provider) {
            return Err(AuthError::UnknownProvider(provider.to_string()));
        }

        let email = attributes
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or(AuthError::ProviderEmailMissing)?;
        let email = email.as_str();
        let username = email_local_part(email).ok_or(AuthError::ProviderEmailMissing)?;

        // A lost insert race is settled by resolving once more against the winner's row
        for attempt in 0..2 {
            if let Some(existing) = self.store.find_by_email(email).await? {
                return self.refresh_link(existing, provider, attributes).await;
            }

            match self
                .create_provider_account(provider, subject_id, email, username, attributes)
                .await
            {
                Ok(account) => return Ok(account),
                Err(CreateError::EmailRace) if attempt == 0 => {
                    debug!(%provider, "Lost account creation race, resolving again");
                }
                Err(CreateError::EmailRace) => {
                    return Err(AuthError::StoreUnavailable(
                        "account vanished during resolution".to_string(),
                    ))
                }
                Err(CreateError::Auth(e)) => return Err(e),
            }
        }

        Err(AuthError::Internal("identity resolution did not settle".to_string()))
    }

    /// Password signup
    pub async fn register_local(
        &self,
        username: &str,
        email: &str,
        plaintext: &str,
    ) -> AuthResult<Account> {
        let username = username.trim();
        let email = normalize_email(email);
        let email = email.as_str();

        if self.store.exists_by_username(username).await? {
            return Err(AuthError::UsernameTaken);
        }
        if self.store.exists_by_email(email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }
        self.verifier.validate_password_policy(plaintext)?;

        let hash = self.verifier.hash(plaintext)?;
        let account = Account::local(username, email, hash);

        let saved = self.store.save(&account).await.map_err(|e| match e {
            DbError::Duplicate {
                key: UniqueKey::Username,
                ..
            } => AuthError::UsernameTaken,
            DbError::Duplicate {
                key: UniqueKey::Email,
                ..
            } => AuthError::EmailAlreadyExists,
            other => other.into(),
        })?;

        info!(account_id = %saved.id, "Local account registered");
        Ok(saved)
    }

    /// Account behind a token subject
    pub async fn load_account(&self, account_id: Uuid) -> AuthResult<Account> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.enabled {
            return Err(AuthError::AccountDisabled);
        }

        Ok(account)
    }

    async fn refresh_link(
        &self,
        mut account: Account,
        provider: &AuthProvider,
        attributes: &ProviderAttributes,
    ) -> AuthResult<Account> {
        if account.provider != *provider {
            warn!(
                account_id = %account.id,
                existing = %account.provider,
                attempted = %provider,
                "Provider login rejected: email linked to another provider"
            );
            return Err(AuthError::ProviderMismatch {
                existing: account.provider,
                attempted: provider.clone(),
            });
        }

        if !account.enabled {
            debug!(account_id = %account.id, "Provider login rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        if let Some(avatar_url) = &attributes.avatar_url {
            account.avatar_url = Some(avatar_url.clone());
        }

        let saved = self.store.save(&account).await?;
        debug!(account_id = %saved.id, %provider, "Provider account refreshed");
        Ok(saved)
    }

    async fn create_provider_account(
        &self,
        provider: &AuthProvider,
        subject_id: &str,
        email: &str,
        username: &str,
        attributes: &ProviderAttributes,
    ) -> Result<Account, CreateError> {
        // The username may belong to the winner of a race for this same email
        if let Some(owner) = self.store.find_by_username(username).await.map_err(AuthError::from)? {
            if normalize_email(&owner.email) == email {
                return Err(CreateError::EmailRace);
            }
            return Err(AuthError::UsernameCollision(username.to_string()).into());
        }

        let mut account = Account::new(username, email, provider.clone());
        account.provider_subject_id = Some(subject_id.to_string());
        account.avatar_url = attributes.avatar_url.clone();
        account.credential_hash = Some(self.verifier.random_credential());

        match self.store.save(&account).await {
            Ok(saved) => {
                info!(account_id = %saved.id, %provider, "Provider account created");
                Ok(saved)
            }
            Err(DbError::Duplicate {
                key: UniqueKey::Email,
                ..
            }) => Err(CreateError::EmailRace),
            Err(DbError::Duplicate {
                key: UniqueKey::Username,
                ..
            }) => match self.store.find_by_email(email).await.map_err(AuthError::from)? {
                Some(_) => Err(CreateError::EmailRace),
                None => Err(AuthError::UsernameCollision(username.to_string()).into()),
            },
            Err(e) => Err(AuthError::from(e).into()),
        }
    }
}

enum CreateError {
    /// Another request inserted the same email first
    EmailRace,
    Auth(AuthError),
}

impl From<AuthError> for CreateError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

/// Canonical form used to store and match emails
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Part of an email before the first `@`; `None` when empty
pub fn email_local_part(email: &str) -> Option<&str> {
    let local = match email.find('@') {
        Some(at) => &email[..at],
        None => email,
    };
    (!local.is_empty()).then_some(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("a@x.com"), Some("a"));
        assert_eq!(email_local_part("first.last@x.com"), Some("first.last"));
        assert_eq!(email_local_part("@x.com"), None);
        assert_eq!(email_local_part("noat"), Some("noat"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_email("a@x.com"), "a@x.com");
    }
}
